//! Unified error taxonomy.
//!
//! Every vendor error, transport failure and local validation failure is
//! normalised into an [`S3Error`] carrying one [`ErrorKind`]. Each kind has a
//! stable integer code grouped by [`ErrorFamily`]; local failures live in a
//! disjoint range so callers can tell "never left the client" apart from
//! "server rejected".

use std::fmt;

use http::StatusCode;

/// Coarse grouping of [`ErrorKind`] codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorFamily {
    /// 1000-1999: bucket-level failures.
    Bucket,
    /// 2000-2999: object-level failures, including preconditions.
    Object,
    /// 3000-3999: multipart upload failures.
    Multipart,
    /// 4000-4999: authorization and request validation failures.
    Request,
    /// 5000-5999: server, transport and response decoding failures.
    Server,
    /// 9000-9999: failures raised before any network call.
    Local,
}

/// The unified error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // -----------------------------------------------------------------------
    // Bucket
    // -----------------------------------------------------------------------
    /// The bucket name is already taken (by anyone, including the caller).
    BucketAlreadyExists,
    /// The bucket does not exist.
    BucketNotFound,
    /// The bucket still holds objects or uploads.
    BucketNotEmpty,
    /// Object lock is not enabled on the bucket.
    BucketLockNotEnabled,
    /// The bucket has no public access block configuration.
    NoPublicAccessBlock,
    /// The bucket has no policy.
    NoBucketPolicy,
    /// The bucket or object has no tag set.
    NoTagSet,

    // -----------------------------------------------------------------------
    // Object
    // -----------------------------------------------------------------------
    /// The key or version does not exist.
    ObjectNotFound,
    /// The addressed version is a delete marker.
    VersionIsDeleteMarker,
    /// A precondition header evaluated false.
    PreconditionFailed,
    /// A read precondition reported the object unchanged.
    NotModified,
    /// The bucket has object lock enabled but no lock configuration, or the
    /// version has no retention / legal hold.
    NoObjectLockConfiguration,
    /// The requested byte range cannot be satisfied.
    InvalidRange,

    // -----------------------------------------------------------------------
    // Multipart
    // -----------------------------------------------------------------------
    /// The upload id does not exist (completed, aborted or never created).
    UploadNotFound,
    /// A non-last part is smaller than the minimum part size.
    EntityTooSmall,
    /// A completed part was never uploaded or its ETag does not match.
    InvalidPart,
    /// Completion listed parts out of ascending part-number order.
    InvalidPartOrder,

    // -----------------------------------------------------------------------
    // Request
    // -----------------------------------------------------------------------
    /// Access denied, including object-lock denials.
    AccessDenied,
    /// The server rejected an argument.
    InvalidArgument,
    /// The request signature did not verify.
    SignatureDoesNotMatch,
    /// The presigned URL or request timestamp has expired.
    RequestExpired,

    // -----------------------------------------------------------------------
    // Server
    // -----------------------------------------------------------------------
    /// Generic fallback for unrecognised or absent vendor codes.
    ServerError,
    /// The transport failed to deliver the request or read the response.
    Transport,
    /// A 2xx response could not be decoded.
    MalformedResponse,

    // -----------------------------------------------------------------------
    // Local
    // -----------------------------------------------------------------------
    /// The file to upload does not exist.
    InputFileNotFound,
    /// The download target already exists and overwrite was not requested.
    OutputFileExists,
    /// A local read or write failed.
    LocalIo,
    /// Options failed validation before any request was issued.
    InvalidInput,
}

impl ErrorKind {
    /// Stable integer code for this kind.
    #[must_use]
    pub fn code(self) -> u16 {
        match self {
            Self::BucketAlreadyExists => 1001,
            Self::BucketNotFound => 1002,
            Self::BucketNotEmpty => 1003,
            Self::BucketLockNotEnabled => 1004,
            Self::NoPublicAccessBlock => 1005,
            Self::NoBucketPolicy => 1006,
            Self::NoTagSet => 1007,
            Self::ObjectNotFound => 2001,
            Self::VersionIsDeleteMarker => 2002,
            Self::PreconditionFailed => 2003,
            Self::NotModified => 2004,
            Self::NoObjectLockConfiguration => 2005,
            Self::InvalidRange => 2006,
            Self::UploadNotFound => 3001,
            Self::EntityTooSmall => 3002,
            Self::InvalidPart => 3003,
            Self::InvalidPartOrder => 3004,
            Self::AccessDenied => 4001,
            Self::InvalidArgument => 4002,
            Self::SignatureDoesNotMatch => 4003,
            Self::RequestExpired => 4004,
            Self::ServerError => 5000,
            Self::Transport => 5001,
            Self::MalformedResponse => 5002,
            Self::InputFileNotFound => 9001,
            Self::OutputFileExists => 9002,
            Self::LocalIo => 9003,
            Self::InvalidInput => 9004,
        }
    }

    /// The family this kind belongs to.
    #[must_use]
    pub fn family(self) -> ErrorFamily {
        match self.code() / 1000 {
            1 => ErrorFamily::Bucket,
            2 => ErrorFamily::Object,
            3 => ErrorFamily::Multipart,
            4 => ErrorFamily::Request,
            9 => ErrorFamily::Local,
            _ => ErrorFamily::Server,
        }
    }

    /// Whether the failure was raised before any request left the client.
    #[must_use]
    pub fn is_local(self) -> bool {
        self.family() == ErrorFamily::Local
    }

    /// Canonical S3 error code string for this kind.
    ///
    /// Several vendor codes fold into one kind (for example `NoSuchKey` and
    /// `NoSuchVersion`); this returns the most common one.
    #[must_use]
    pub fn vendor_code(self) -> &'static str {
        match self {
            Self::BucketAlreadyExists => "BucketAlreadyExists",
            Self::BucketNotFound => "NoSuchBucket",
            Self::BucketNotEmpty => "BucketNotEmpty",
            Self::BucketLockNotEnabled => "InvalidRequest",
            Self::NoPublicAccessBlock => "NoSuchPublicAccessBlockConfiguration",
            Self::NoBucketPolicy => "NoSuchBucketPolicy",
            Self::NoTagSet => "NoSuchTagSet",
            Self::ObjectNotFound => "NoSuchKey",
            Self::VersionIsDeleteMarker => "MethodNotAllowed",
            Self::PreconditionFailed => "PreconditionFailed",
            Self::NotModified => "NotModified",
            Self::NoObjectLockConfiguration => "ObjectLockConfigurationNotFoundError",
            Self::InvalidRange => "InvalidRange",
            Self::UploadNotFound => "NoSuchUpload",
            Self::EntityTooSmall => "EntityTooSmall",
            Self::InvalidPart => "InvalidPart",
            Self::InvalidPartOrder => "InvalidPartOrder",
            Self::AccessDenied => "AccessDenied",
            Self::InvalidArgument => "InvalidArgument",
            Self::SignatureDoesNotMatch => "SignatureDoesNotMatch",
            Self::RequestExpired => "AccessDenied",
            Self::ServerError | Self::Transport | Self::MalformedResponse => "InternalError",
            Self::InputFileNotFound => "InputFileNotFound",
            Self::OutputFileExists => "OutputFileExists",
            Self::LocalIo => "LocalIo",
            Self::InvalidInput => "InvalidInput",
        }
    }

    /// The HTTP status a server uses for this kind.
    #[must_use]
    pub fn default_status(self) -> StatusCode {
        match self {
            Self::NotModified => StatusCode::NOT_MODIFIED,
            Self::BucketLockNotEnabled
            | Self::EntityTooSmall
            | Self::InvalidPart
            | Self::InvalidPartOrder
            | Self::InvalidArgument
            | Self::InvalidInput => StatusCode::BAD_REQUEST,
            Self::AccessDenied | Self::SignatureDoesNotMatch | Self::RequestExpired => {
                StatusCode::FORBIDDEN
            }
            Self::BucketNotFound
            | Self::NoPublicAccessBlock
            | Self::NoBucketPolicy
            | Self::NoTagSet
            | Self::ObjectNotFound
            | Self::NoObjectLockConfiguration
            | Self::UploadNotFound
            | Self::InputFileNotFound => StatusCode::NOT_FOUND,
            Self::VersionIsDeleteMarker => StatusCode::METHOD_NOT_ALLOWED,
            Self::BucketAlreadyExists | Self::BucketNotEmpty | Self::OutputFileExists => {
                StatusCode::CONFLICT
            }
            Self::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
            Self::InvalidRange => StatusCode::RANGE_NOT_SATISFIABLE,
            Self::ServerError | Self::Transport | Self::MalformedResponse | Self::LocalIo => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// A default human-readable message.
    #[must_use]
    pub fn default_message(self) -> &'static str {
        match self {
            Self::BucketAlreadyExists => "The requested bucket name is not available",
            Self::BucketNotFound => "The specified bucket does not exist",
            Self::BucketNotEmpty => "The bucket you tried to delete is not empty",
            Self::BucketLockNotEnabled => "Bucket is missing Object Lock Configuration",
            Self::NoPublicAccessBlock => "The public access block configuration was not found",
            Self::NoBucketPolicy => "The bucket policy does not exist",
            Self::NoTagSet => "The TagSet does not exist",
            Self::ObjectNotFound => "The specified key does not exist",
            Self::VersionIsDeleteMarker => "The specified method is not allowed against this resource",
            Self::PreconditionFailed => "At least one of the pre-conditions you specified did not hold",
            Self::NotModified => "Not Modified",
            Self::NoObjectLockConfiguration => "Object Lock configuration does not exist",
            Self::InvalidRange => "The requested range is not satisfiable",
            Self::UploadNotFound => "The specified multipart upload does not exist",
            Self::EntityTooSmall => "Your proposed upload is smaller than the minimum allowed object size",
            Self::InvalidPart => "One or more of the specified parts could not be found",
            Self::InvalidPartOrder => "The list of parts was not in ascending order",
            Self::AccessDenied => "Access Denied",
            Self::InvalidArgument => "Invalid Argument",
            Self::SignatureDoesNotMatch => {
                "The request signature we calculated does not match the signature you provided"
            }
            Self::RequestExpired => "Request has expired",
            Self::ServerError => "We encountered an internal error, please try again",
            Self::Transport => "The request could not be delivered",
            Self::MalformedResponse => "The response could not be decoded",
            Self::InputFileNotFound => "The input file does not exist",
            Self::OutputFileExists => "The output file already exists",
            Self::LocalIo => "A local I/O operation failed",
            Self::InvalidInput => "Invalid input",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

/// The parsed body of a vendor XML error response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VendorErrorBody {
    /// The vendor error code, e.g. `NoSuchKey`.
    pub code: String,
    /// The vendor message.
    pub message: String,
    /// The `RequestId` element, if present.
    pub request_id: Option<String>,
    /// The `HostId` element, if present.
    pub host_id: Option<String>,
    /// The `Resource` element, if present.
    pub resource: Option<String>,
}

/// The single error type returned by every unis3 operation.
pub struct S3Error {
    kind: ErrorKind,
    message: String,
    status: Option<StatusCode>,
    body: Option<VendorErrorBody>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

/// Result alias used across unis3.
pub type S3Result<T> = Result<T, S3Error>;

impl fmt::Debug for S3Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Error")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("status", &self.status)
            .field("body", &self.body)
            .field("source", &self.source.as_ref().map(ToString::to_string))
            .finish()
    }
}

impl fmt::Display for S3Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.body {
            Some(body) => write!(f, "S3Error({}, {}): {}", self.kind, body.code, self.message),
            None => write!(f, "S3Error({}): {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for S3Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl S3Error {
    /// Create an error with the kind's default message.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: kind.default_message().to_owned(),
            status: None,
            body: None,
            source: None,
        }
    }

    /// Create an error with a custom message.
    #[must_use]
    pub fn with_message(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::new(kind)
        }
    }

    /// Attach the HTTP status the server answered with.
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Attach the parsed vendor error body.
    #[must_use]
    pub fn with_body(mut self, body: VendorErrorBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Set the source error.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// The unified kind.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status, when the error came from a response.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// The vendor error body, when the server sent one.
    #[must_use]
    pub fn body(&self) -> Option<&VendorErrorBody> {
        self.body.as_ref()
    }

    /// The vendor error code, when the server sent one.
    #[must_use]
    pub fn vendor_code(&self) -> Option<&str> {
        self.body.as_ref().map(|b| b.code.as_str())
    }

    /// Shorthand for [`ErrorKind::is_local`].
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.kind.is_local()
    }

    /// Options failed validation.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::with_message(ErrorKind::InvalidInput, message)
    }

    /// Access was denied.
    #[must_use]
    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::with_message(ErrorKind::AccessDenied, message)
    }

    /// A precondition evaluated false.
    #[must_use]
    pub fn precondition_failed() -> Self {
        Self::new(ErrorKind::PreconditionFailed)
    }

    /// A 2xx response could not be decoded.
    #[must_use]
    pub fn malformed_response(message: impl Into<String>) -> Self {
        Self::with_message(ErrorKind::MalformedResponse, message)
    }
}

impl From<std::io::Error> for S3Error {
    fn from(err: std::io::Error) -> Self {
        Self::with_message(ErrorKind::LocalIo, err.to_string()).with_source(err)
    }
}

/// Create an [`S3Error`] from an [`ErrorKind`] variant name.
///
/// # Examples
///
/// ```
/// use unis3_model::s3_error;
/// use unis3_model::error::ErrorKind;
///
/// let err = s3_error!(ObjectNotFound);
/// assert_eq!(err.kind(), ErrorKind::ObjectNotFound);
///
/// let err = s3_error!(InvalidInput, "part number out of range");
/// assert_eq!(err.message(), "part number out of range");
/// ```
#[macro_export]
macro_rules! s3_error {
    ($kind:ident) => {
        $crate::error::S3Error::new($crate::error::ErrorKind::$kind)
    };
    ($kind:ident, $msg:expr) => {
        $crate::error::S3Error::with_message($crate::error::ErrorKind::$kind, $msg)
    };
}

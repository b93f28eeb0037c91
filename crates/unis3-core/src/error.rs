//! Error translation: HTTP status plus vendor body to [`S3Error`].
//!
//! Vendor codes are mapped first. Bodiless responses (HEAD, `304`) fall
//! back to the status. Anything unrecognised becomes `ServerError`, with the
//! original body kept for diagnostics.

use std::io;

use http::StatusCode;
use unis3_model::{ErrorKind, S3Error, VendorErrorBody};
use unis3_xml::parse_error_body;

/// Longest raw body kept as a message when the body is not XML.
const RAW_MESSAGE_LIMIT: usize = 256;

/// Failures of the transport itself; no response was obtained.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The transport's deadline elapsed.
    #[error("request timed out")]
    Timeout,

    /// The request could not be built or sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Reading or writing a body failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Any other transport failure.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl From<TransportError> for S3Error {
    fn from(err: TransportError) -> Self {
        S3Error::with_message(ErrorKind::Transport, err.to_string()).with_source(err)
    }
}

/// Map a vendor error code to a kind.
///
/// Several codes fold into one kind. Returns `None` for unknown codes.
#[must_use]
pub fn kind_for_code(code: &str) -> Option<ErrorKind> {
    let kind = match code {
        "BucketAlreadyExists" | "BucketAlreadyOwnedByYou" => ErrorKind::BucketAlreadyExists,
        "NoSuchBucket" => ErrorKind::BucketNotFound,
        "BucketNotEmpty" => ErrorKind::BucketNotEmpty,
        "InvalidBucketState" => ErrorKind::BucketLockNotEnabled,
        "NoSuchPublicAccessBlockConfiguration" => ErrorKind::NoPublicAccessBlock,
        "NoSuchBucketPolicy" => ErrorKind::NoBucketPolicy,
        "NoSuchTagSet" | "NoSuchTagSetError" => ErrorKind::NoTagSet,
        "NoSuchKey" | "NoSuchVersion" | "NoSuchObject" => ErrorKind::ObjectNotFound,
        "MethodNotAllowed" => ErrorKind::VersionIsDeleteMarker,
        "PreconditionFailed" => ErrorKind::PreconditionFailed,
        "NotModified" => ErrorKind::NotModified,
        "ObjectLockConfigurationNotFoundError" | "NoSuchObjectLockConfiguration" => {
            ErrorKind::NoObjectLockConfiguration
        }
        "InvalidRange" => ErrorKind::InvalidRange,
        "NoSuchUpload" => ErrorKind::UploadNotFound,
        "EntityTooSmall" => ErrorKind::EntityTooSmall,
        "InvalidPart" => ErrorKind::InvalidPart,
        "InvalidPartOrder" => ErrorKind::InvalidPartOrder,
        "AccessDenied" | "InvalidAccessKeyId" | "AllAccessDisabled" => ErrorKind::AccessDenied,
        "SignatureDoesNotMatch" => ErrorKind::SignatureDoesNotMatch,
        "ExpiredToken" | "RequestExpired" => ErrorKind::RequestExpired,
        "InvalidArgument" | "InvalidRequest" | "InvalidBucketName" | "MalformedXML"
        | "InvalidDigest" | "KeyTooLongError" | "InvalidStorageClass" | "InvalidTag" => {
            ErrorKind::InvalidArgument
        }
        "InternalError" | "ServiceUnavailable" | "SlowDown" => ErrorKind::ServerError,
        _ => return None,
    };
    Some(kind)
}

/// Refine a code-based kind using the message where one vendor code covers
/// several situations.
fn refine(kind: ErrorKind, body: &VendorErrorBody) -> ErrorKind {
    let message = body.message.to_ascii_lowercase();
    match kind {
        ErrorKind::AccessDenied if message.contains("request has expired") => {
            ErrorKind::RequestExpired
        }
        ErrorKind::InvalidArgument
            if body.code == "InvalidRequest" && message.contains("object lock") =>
        {
            ErrorKind::BucketLockNotEnabled
        }
        other => other,
    }
}

/// Map a bodiless status to a kind.
#[must_use]
pub fn kind_for_status(status: StatusCode, not_found: ErrorKind) -> ErrorKind {
    match status {
        StatusCode::NOT_MODIFIED => ErrorKind::NotModified,
        StatusCode::PRECONDITION_FAILED => ErrorKind::PreconditionFailed,
        StatusCode::NOT_FOUND => not_found,
        StatusCode::FORBIDDEN => ErrorKind::AccessDenied,
        StatusCode::METHOD_NOT_ALLOWED => ErrorKind::VersionIsDeleteMarker,
        StatusCode::RANGE_NOT_SATISFIABLE => ErrorKind::InvalidRange,
        _ => ErrorKind::ServerError,
    }
}

/// Translate a non-2xx response into an [`S3Error`].
///
/// `not_found` is the kind a bodiless `404` means for the operation, e.g.
/// `BucketNotFound` for a bucket HEAD.
#[must_use]
pub fn translate(status: StatusCode, body: &[u8], not_found: ErrorKind) -> S3Error {
    let trimmed = body.trim_ascii();
    if trimmed.is_empty() {
        let kind = kind_for_status(status, not_found);
        return S3Error::new(kind).with_status(status);
    }

    match parse_error_body(trimmed) {
        Ok(parsed) => {
            let kind = kind_for_code(&parsed.code)
                .map_or(ErrorKind::ServerError, |kind| refine(kind, &parsed));
            let message = if parsed.message.is_empty() {
                kind.default_message().to_owned()
            } else {
                parsed.message.clone()
            };
            tracing::debug!(
                status = %status,
                code = %parsed.code,
                kind = %kind,
                request_id = ?parsed.request_id,
                "translated vendor error"
            );
            S3Error::with_message(kind, message)
                .with_status(status)
                .with_body(parsed)
        }
        Err(err) => {
            let raw = String::from_utf8_lossy(trimmed);
            let message: String = raw.chars().take(RAW_MESSAGE_LIMIT).collect();
            tracing::debug!(status = %status, error = %err, "unparseable error body");
            S3Error::with_message(kind_for_status(status, not_found), message).with_status(status)
        }
    }
}

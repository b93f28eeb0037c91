//! Error types for SigV4 signing and verification.

use unis3_model::{ErrorKind, S3Error};

/// Errors raised while signing or verifying a request.
///
/// The signing-side variants (`InvalidExpiry`, `InvalidHeaderValue`,
/// `EmptyAccessKey`) only occur on malformed input; the rest come from
/// verification.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The `Authorization` header is missing from the request.
    #[error("Missing Authorization header")]
    MissingAuthHeader,

    /// The `Authorization` header could not be parsed.
    #[error("Invalid Authorization header format")]
    InvalidAuthHeader,

    /// Only AWS4-HMAC-SHA256 is supported.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// A header listed in `SignedHeaders` is missing.
    #[error("Missing required header: {0}")]
    MissingHeader(String),

    /// The `Credential` component is not `AKID/date/region/service/aws4_request`.
    #[error("Invalid credential format")]
    InvalidCredential,

    /// The access key id is unknown to the credential store.
    #[error("Access key not found: {0}")]
    AccessKeyNotFound(String),

    /// The computed signature does not match the provided signature.
    #[error("Signature does not match")]
    SignatureDoesNotMatch,

    /// The presigned URL is past `X-Amz-Date` + `X-Amz-Expires`.
    #[error("Request has expired")]
    RequestExpired,

    /// A presigned query parameter is missing or malformed.
    #[error("Missing required query parameter: {0}")]
    MissingQueryParam(String),

    /// Presign expiry must be between 1 second and 7 days.
    #[error("Invalid presign expiry: {0} seconds (allowed 1..=604800)")]
    InvalidExpiry(u64),

    /// A header value contains a character that cannot be signed.
    #[error("Invalid value for header {0}")]
    InvalidHeaderValue(String),

    /// Signing was attempted with an empty access key id.
    #[error("Access key id is empty")]
    EmptyAccessKey,
}

impl AuthError {
    /// Whether the error stems from malformed signing input rather than a
    /// failed verification.
    #[must_use]
    pub fn is_signing_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidExpiry(_) | Self::InvalidHeaderValue(_) | Self::EmptyAccessKey
        )
    }
}

impl From<AuthError> for S3Error {
    fn from(err: AuthError) -> Self {
        let kind = match &err {
            AuthError::InvalidExpiry(_)
            | AuthError::InvalidHeaderValue(_)
            | AuthError::EmptyAccessKey => ErrorKind::InvalidInput,
            AuthError::SignatureDoesNotMatch => ErrorKind::SignatureDoesNotMatch,
            AuthError::RequestExpired => ErrorKind::RequestExpired,
            _ => ErrorKind::AccessDenied,
        };
        S3Error::with_message(kind, err.to_string()).with_source(err)
    }
}

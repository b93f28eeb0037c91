//! AWS Signature Version 4 for unis3.
//!
//! This crate implements both sides of SigV4:
//!
//! - the signing side used by the client: [`RequestSigner::sign_headers`]
//!   for header-based authentication and [`RequestSigner::presign`] for
//!   presigned URLs;
//! - the verification side used by the in-memory server:
//!   [`verify_sigv4`] and [`verify_presigned`].
//!
//! Both sides share the canonicalization code in [`canonical`], so a request
//! signed here always verifies here.
//!
//! # Usage
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use unis3_auth::{Credentials, RequestSigner, SignableRequest, SigningParams};
//!
//! let credentials = Credentials::new("AKIDEXAMPLE", "secret");
//! let signer = RequestSigner::default();
//! let params = SigningParams {
//!     credentials: &credentials,
//!     region: "us-east-1",
//!     service: "s3",
//!     timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
//! };
//! let headers = vec![("host".to_owned(), "example.com".to_owned())];
//! let request = SignableRequest {
//!     method: "GET",
//!     path: "/bucket/key",
//!     query: &[],
//!     headers: &headers,
//!     payload_hash: unis3_auth::EMPTY_PAYLOAD_SHA256,
//! };
//! let added = signer.sign_headers(&request, &params).unwrap();
//! assert!(added.iter().any(|(name, _)| name == "authorization"));
//! ```
//!
//! # Modules
//!
//! - [`canonical`] - Canonical request construction and URI encoding
//! - [`credentials`] - Credentials and the credential provider trait
//! - [`error`] - Authentication error types
//! - [`presigned`] - Presigned URL verification
//! - [`sigv4`] - Signing, signing-key derivation and header verification

pub mod canonical;
pub mod credentials;
pub mod error;
pub mod presigned;
pub mod sigv4;

pub use canonical::uri_encode;
pub use credentials::{CredentialProvider, Credentials, StaticCredentialProvider};
pub use error::AuthError;
pub use presigned::{verify_presigned, verify_presigned_at};
pub use sigv4::{
    AuthResult, EMPTY_PAYLOAD_SHA256, RequestSigner, SignableRequest, SigningParams,
    UNSIGNED_PAYLOAD, hash_payload, verify_sigv4,
};

//! Unified client for S3-compatible object stores.
//!
//! One [`S3Client`] speaks to AWS S3, Aliyun OSS, Tencent COS, Cloudflare
//! R2 or any generic S3 endpoint such as MinIO. Vendor differences
//! (addressing style, header support, the spelling of the null version id)
//! come from the provider's [`unis3_core::Dialect`]; every failure comes
//! back as a [`unis3_model::S3Error`] whose kind does not depend on the
//! vendor.
//!
//! The client is synchronous and sends requests through an injected
//! [`unis3_core::Transport`]: the in-memory server from `unis3-memory` in
//! tests, or `transport::ReqwestTransport` with the `reqwest` feature.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use unis3_auth::Credentials;
//! use unis3_client::{ClientConfig, CredentialsConfig, S3Client, UploadSource};
//! use unis3_core::Provider;
//! use unis3_memory::MemoryServer;
//! use unis3_model::input::{GetObjectOptions, PutObjectOptions};
//!
//! let server = Arc::new(MemoryServer::new(
//!     Provider::Generic,
//!     &Credentials::new("minio", "minio-secret"),
//! ));
//! let config = ClientConfig::builder()
//!     .provider(Provider::Generic)
//!     .credentials(CredentialsConfig::new("minio", "minio-secret"))
//!     .secure(false)
//!     .build();
//! let client = S3Client::new(config, server)?;
//!
//! client.create_bucket("backups", &Default::default())?;
//! client.put_object(
//!     "backups",
//!     "db/2024-06-01.sql",
//!     UploadSource::from("CREATE TABLE t;"),
//!     &PutObjectOptions::default(),
//! )?;
//! let body = client.get_object_bytes("backups", "db/2024-06-01.sql", &GetObjectOptions::default())?;
//! assert_eq!(&body[..], b"CREATE TABLE t;");
//! # Ok::<(), unis3_model::S3Error>(())
//! ```

mod client;
pub mod config;
mod download;
mod multipart;
mod ops;
mod presign;
mod request;
#[cfg(feature = "reqwest")]
pub mod transport;

pub use client::S3Client;
pub use config::{ClientConfig, CredentialsConfig, DEFAULT_PART_SIZE};
pub use download::GetObjectOutput;
pub use multipart::{MULTIPART_THRESHOLD, UploadSource};

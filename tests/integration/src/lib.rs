//! Behavioural tests for the unis3 client.
//!
//! Every test drives a real `S3Client` through the in-memory server, so
//! signing, routing, XML and error translation are all exercised without a
//! network. Tests tagged `#[ignore]` talk to a live endpoint configured via
//! `UNIS3_*` environment variables:
//!
//! ```text
//! UNIS3_ENDPOINT=http://localhost:9000 AWS_ACCESS_KEY_ID=minioadmin \
//!     AWS_SECRET_ACCESS_KEY=minioadmin cargo test -p unis3-integration -- --ignored
//! ```

use std::sync::{Arc, Once};

use unis3_auth::Credentials;
use unis3_client::{ClientConfig, CredentialsConfig, S3Client};
use unis3_core::Provider;
use unis3_memory::MemoryServer;
use unis3_model::input::CreateBucketOptions;

static INIT: Once = Once::new();

/// Access key of the in-memory server.
pub const ACCESS_KEY: &str = "test";

/// Secret key of the in-memory server.
pub const SECRET_KEY: &str = "test-secret";

/// One mebibyte.
pub const MIB: usize = 1024 * 1024;

/// Initialize tracing (once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Generate a unique bucket name for a test.
#[must_use]
pub fn test_bucket_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string()[..8].to_owned();
    format!("test-{prefix}-{id}")
}

/// A client over a fresh in-memory server speaking `provider`.
#[must_use]
pub fn memory_client(provider: Provider) -> (Arc<MemoryServer>, S3Client) {
    init_tracing();
    let server = Arc::new(MemoryServer::new(
        provider,
        &Credentials::new(ACCESS_KEY, SECRET_KEY),
    ));
    let config = ClientConfig::builder()
        .endpoint("localhost:9000".to_owned())
        .provider(provider)
        .secure(false)
        .credentials(CredentialsConfig::new(ACCESS_KEY, SECRET_KEY))
        .build();
    let client = S3Client::new(config, server.clone())
        .unwrap_or_else(|e| panic!("failed to build client: {e}"));
    (server, client)
}

/// A client for the live endpoint described by the environment.
#[must_use]
pub fn live_client() -> S3Client {
    init_tracing();
    let config = ClientConfig::from_env().unwrap_or_else(|e| panic!("bad environment: {e}"));
    S3Client::connect(config).unwrap_or_else(|e| panic!("failed to build client: {e}"))
}

/// Create a bucket and return its name.
pub fn create_test_bucket(client: &S3Client, prefix: &str) -> String {
    create_bucket_with(client, prefix, &CreateBucketOptions::default())
}

/// Create a bucket with object lock enabled and return its name.
pub fn create_locked_bucket(client: &S3Client, prefix: &str) -> String {
    create_bucket_with(
        client,
        prefix,
        &CreateBucketOptions {
            object_lock_enabled: true,
            ..CreateBucketOptions::default()
        },
    )
}

fn create_bucket_with(client: &S3Client, prefix: &str, options: &CreateBucketOptions) -> String {
    let name = test_bucket_name(prefix);
    client
        .create_bucket(&name, options)
        .unwrap_or_else(|e| panic!("failed to create bucket {name}: {e}"));
    name
}

/// Deterministic test payload of `len` bytes.
#[must_use]
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

mod test_bucket;
mod test_error;
mod test_list;
mod test_live;
mod test_lock;
mod test_multipart;
mod test_object;
mod test_precondition;
mod test_presign;
mod test_versioning;

//! The in-memory server and its [`Transport`] implementation.
//!
//! Every request is authenticated, routed and dispatched synchronously on
//! the caller's thread. Failures become vendor XML error responses, so a
//! client talking to [`MemoryServer`] goes through the same translation as
//! one talking to a real endpoint.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use http::header::{AUTHORIZATION, CONTENT_TYPE, HOST};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use parking_lot::RwLock;
use tracing::{debug, warn};
use unis3_auth::presigned::is_presigned;
use unis3_auth::{
    Credentials, StaticCredentialProvider, UNSIGNED_PAYLOAD, hash_payload, verify_presigned_at,
    verify_sigv4,
};
use unis3_core::transport::{HttpRequest, HttpResponse, Transport};
use unis3_core::{Dialect, Provider, TransportError};
use unis3_model::{ErrorKind, S3Error, S3Result};
use unis3_xml::error_to_xml;

use crate::ops::{RequestContext, wire_kind};
use crate::router::{Operation, S3Router};
use crate::state::MemoryState;

/// The host suffix that selects virtual-hosted addressing by default.
pub const DEFAULT_DOMAIN: &str = "localhost";

/// An S3-compatible server held entirely in memory.
///
/// It speaks the dialect of one [`Provider`]: null version ids, default
/// encryption, parts-count reporting and ignored headers all follow the
/// vendor table.
pub struct MemoryServer {
    pub(crate) state: MemoryState,
    pub(crate) router: S3Router,
    pub(crate) dialect: &'static Dialect,
    pub(crate) credentials: StaticCredentialProvider,
    pub(crate) fail_next_upload_part: AtomicBool,
    clock: RwLock<Option<DateTime<Utc>>>,
    requests: AtomicU64,
}

impl std::fmt::Debug for MemoryServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryServer")
            .field("provider", &self.dialect.provider)
            .field("domain", &self.router.domain)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl MemoryServer {
    /// A server for `provider` that accepts requests signed with
    /// `credentials`.
    #[must_use]
    pub fn new(provider: Provider, credentials: &Credentials) -> Self {
        Self {
            state: MemoryState::default(),
            router: S3Router::new(DEFAULT_DOMAIN),
            dialect: provider.dialect(),
            credentials: StaticCredentialProvider::from(credentials),
            fail_next_upload_part: AtomicBool::new(false),
            clock: RwLock::new(None),
            requests: AtomicU64::new(0),
        }
    }

    /// Use `domain` as the virtual-host suffix.
    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.router = S3Router::new(domain);
        self
    }

    /// The dialect this server speaks.
    #[must_use]
    pub fn dialect(&self) -> &'static Dialect {
        self.dialect
    }

    /// The bucket table.
    #[must_use]
    pub fn state(&self) -> &MemoryState {
        &self.state
    }

    /// The server's current time.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.read().unwrap_or_else(Utc::now)
    }

    /// Freeze the clock at `now`.
    pub fn set_now(&self, now: DateTime<Utc>) {
        *self.clock.write() = Some(now);
    }

    /// Move the clock forward, freezing it if it was following system time.
    pub fn advance(&self, by: Duration) {
        let mut clock = self.clock.write();
        let now = clock.unwrap_or_else(Utc::now);
        *clock = Some(now + by);
    }

    /// Follow system time again.
    pub fn use_system_clock(&self) {
        *self.clock.write() = None;
    }

    /// Fail the next `UploadPart` with an internal error.
    pub fn fail_next_upload_part(&self) {
        self.fail_next_upload_part.store(true, Ordering::SeqCst);
    }

    /// In-progress multipart uploads in `bucket`; zero if it does not exist.
    #[must_use]
    pub fn upload_count(&self, bucket: &str) -> usize {
        self.state
            .bucket(bucket)
            .map_or(0, |b| b.multipart_uploads.len())
    }

    /// Requests received so far.
    #[must_use]
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }

    fn authenticate(&self, request: &HttpRequest, now: DateTime<Utc>) -> S3Result<()> {
        let (mut parts, ()) = http::Request::new(()).into_parts();
        parts.method = request.method.clone();
        parts.uri = request.uri.clone();
        parts.headers = request.headers.clone();

        if is_presigned(parts.uri.query().unwrap_or("")) {
            verify_presigned_at(&parts, &self.credentials, now)?;
            return Ok(());
        }
        if !parts.headers.contains_key(AUTHORIZATION) {
            return Err(S3Error::access_denied("anonymous requests are not allowed"));
        }
        let declared = request
            .header("x-amz-content-sha256")
            .unwrap_or(UNSIGNED_PAYLOAD);
        if declared != UNSIGNED_PAYLOAD && declared != hash_payload(&request.body) {
            return Err(S3Error::with_message(
                ErrorKind::InvalidArgument,
                "the provided x-amz-content-sha256 does not match the payload",
            ));
        }
        verify_sigv4(&parts, declared, &self.credentials)?;
        Ok(())
    }

    fn dispatch(&self, mut request: HttpRequest) -> S3Result<HttpResponse> {
        let now = self.now();
        if !request.headers.contains_key(HOST) {
            if let Some(host) = request
                .uri
                .authority()
                .and_then(|a| HeaderValue::from_str(a.as_str()).ok())
            {
                request.headers.insert(HOST, host);
            }
        }
        self.authenticate(&request, now)?;
        let route = self
            .router
            .resolve(&request.method, &request.uri, &request.headers)?;
        debug!(
            operation = ?route.operation,
            bucket = ?route.bucket,
            key = ?route.key,
            "dispatching request"
        );
        let ctx = RequestContext {
            route,
            headers: request.headers,
            body: request.body,
            now,
            dialect: self.dialect,
        };

        match ctx.route.operation {
            Operation::ListBuckets => self.handle_list_buckets(&ctx),
            Operation::CreateBucket => self.handle_create_bucket(&ctx),
            Operation::DeleteBucket => self.handle_delete_bucket(&ctx),
            Operation::HeadBucket => self.handle_head_bucket(&ctx),
            Operation::GetBucketVersioning => self.handle_get_bucket_versioning(&ctx),
            Operation::PutBucketVersioning => self.handle_put_bucket_versioning(&ctx),
            Operation::GetBucketTagging => self.handle_get_bucket_tagging(&ctx),
            Operation::PutBucketTagging => self.handle_put_bucket_tagging(&ctx),
            Operation::DeleteBucketTagging => self.handle_delete_bucket_tagging(&ctx),
            Operation::GetBucketPolicy => self.handle_get_bucket_policy(&ctx),
            Operation::PutBucketPolicy => self.handle_put_bucket_policy(&ctx),
            Operation::DeleteBucketPolicy => self.handle_delete_bucket_policy(&ctx),
            Operation::GetPublicAccessBlock => self.handle_get_public_access_block(&ctx),
            Operation::PutPublicAccessBlock => self.handle_put_public_access_block(&ctx),
            Operation::DeletePublicAccessBlock => self.handle_delete_public_access_block(&ctx),
            Operation::GetObjectLockConfiguration => {
                self.handle_get_object_lock_configuration(&ctx)
            }
            Operation::PutObjectLockConfiguration => {
                self.handle_put_object_lock_configuration(&ctx)
            }
            Operation::ListObjectsV2 => self.handle_list_objects_v2(&ctx),
            Operation::ListObjectVersions => self.handle_list_object_versions(&ctx),
            Operation::ListMultipartUploads => self.handle_list_multipart_uploads(&ctx),
            Operation::DeleteObjects => self.handle_delete_objects(&ctx),
            Operation::PutObject => self.handle_put_object(&ctx),
            Operation::CopyObject => self.handle_copy_object(&ctx),
            Operation::GetObject => self.handle_get_object(&ctx, false),
            Operation::HeadObject => self.handle_get_object(&ctx, true),
            Operation::DeleteObject => self.handle_delete_object(&ctx),
            Operation::GetObjectTagging => self.handle_get_object_tagging(&ctx),
            Operation::PutObjectTagging => self.handle_put_object_tagging(&ctx),
            Operation::DeleteObjectTagging => self.handle_delete_object_tagging(&ctx),
            Operation::GetObjectRetention => self.handle_get_object_retention(&ctx),
            Operation::PutObjectRetention => self.handle_put_object_retention(&ctx),
            Operation::GetObjectLegalHold => self.handle_get_object_legal_hold(&ctx),
            Operation::PutObjectLegalHold => self.handle_put_object_legal_hold(&ctx),
            Operation::CreateMultipartUpload => self.handle_create_multipart_upload(&ctx),
            Operation::UploadPart => self.handle_upload_part(&ctx),
            Operation::UploadPartCopy => self.handle_upload_part_copy(&ctx),
            Operation::CompleteMultipartUpload => self.handle_complete_multipart_upload(&ctx),
            Operation::AbortMultipartUpload => self.handle_abort_multipart_upload(&ctx),
            Operation::ListParts => self.handle_list_parts(&ctx),
        }
    }
}

/// Render `err` the way a vendor would. HEAD and `304` responses carry no
/// body.
fn error_response(err: &S3Error, resource: &str, head: bool, request_id: &str) -> HttpResponse {
    let kind = wire_kind(err.kind());
    let status = kind.default_status();
    if status.is_server_error() {
        warn!(kind = %kind, message = err.message(), resource, "request failed");
    } else {
        debug!(kind = %kind, message = err.message(), resource, "request rejected");
    }
    if head || status == StatusCode::NOT_MODIFIED {
        return HttpResponse::new(status, HeaderMap::new(), Bytes::new());
    }
    let body = error_to_xml(kind.vendor_code(), err.message(), Some(resource), request_id);
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/xml"));
    HttpResponse::new(status, headers, body)
}

impl Transport for MemoryServer {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let sequence = self.requests.fetch_add(1, Ordering::SeqCst) + 1;
        let request_id = format!("{sequence:016X}");
        let head = request.method == Method::HEAD;
        let resource = request.uri.path().to_owned();

        let mut response = self
            .dispatch(request)
            .unwrap_or_else(|err| error_response(&err, &resource, head, &request_id));
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers.insert("x-amz-request-id", value);
        }
        Ok(response)
    }
}

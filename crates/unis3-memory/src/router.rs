//! Request routing: virtual-host resolution and operation identification.
//!
//! The [`S3Router`] maps a request to an [`Operation`] by examining:
//!
//! - the HTTP method;
//! - whether a bucket is present, from the `Host` header or the first path
//!   segment;
//! - whether an object key is present;
//! - sub-resource query parameters such as `?versioning` or `?uploadId`;
//! - `x-amz-copy-source`, which turns a PUT into a copy.

use http::{HeaderMap, Method, Uri};
use percent_encoding::percent_decode_str;
use unis3_model::{ErrorKind, S3Error, S3Result};

/// Every operation the in-memory server understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Operation {
    ListBuckets,
    CreateBucket,
    DeleteBucket,
    HeadBucket,
    GetBucketVersioning,
    PutBucketVersioning,
    GetBucketTagging,
    PutBucketTagging,
    DeleteBucketTagging,
    GetBucketPolicy,
    PutBucketPolicy,
    DeleteBucketPolicy,
    GetPublicAccessBlock,
    PutPublicAccessBlock,
    DeletePublicAccessBlock,
    GetObjectLockConfiguration,
    PutObjectLockConfiguration,
    ListObjectsV2,
    ListObjectVersions,
    ListMultipartUploads,
    DeleteObjects,
    PutObject,
    CopyObject,
    GetObject,
    HeadObject,
    DeleteObject,
    GetObjectTagging,
    PutObjectTagging,
    DeleteObjectTagging,
    GetObjectRetention,
    PutObjectRetention,
    GetObjectLegalHold,
    PutObjectLegalHold,
    CreateMultipartUpload,
    UploadPart,
    UploadPartCopy,
    CompleteMultipartUpload,
    AbortMultipartUpload,
    ListParts,
}

/// Configuration for request routing.
#[derive(Debug, Clone)]
pub struct S3Router {
    /// The base domain for virtual-hosted requests, e.g. `localhost`.
    pub domain: String,
}

/// The result of routing a request.
#[derive(Debug, Clone)]
pub struct RoutingContext {
    /// The resolved bucket name, if any.
    pub bucket: Option<String>,
    /// The resolved object key, if any.
    pub key: Option<String>,
    /// The identified operation.
    pub operation: Operation,
    /// Decoded query parameters in request order.
    pub query_params: Vec<(String, String)>,
}

impl RoutingContext {
    /// The value of query parameter `name`, if present.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        query_value(&self.query_params, name)
    }

    /// The bucket, or `InvalidArgument` if the route has none.
    pub fn bucket(&self) -> S3Result<&str> {
        self.bucket
            .as_deref()
            .ok_or_else(|| S3Error::with_message(ErrorKind::InvalidArgument, "missing bucket"))
    }

    /// The object key, or `InvalidArgument` if the route has none.
    pub fn key(&self) -> S3Result<&str> {
        self.key
            .as_deref()
            .ok_or_else(|| S3Error::with_message(ErrorKind::InvalidArgument, "missing key"))
    }
}

impl S3Router {
    /// Create a router for `domain`.
    #[must_use]
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
        }
    }

    /// Resolve a request to a routing context.
    ///
    /// A `Host` of `{bucket}.{domain}` selects virtual-hosted addressing and
    /// the whole path becomes the key; otherwise the first path segment is
    /// the bucket.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for methods or shapes no operation matches.
    pub fn resolve(
        &self,
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
    ) -> S3Result<RoutingContext> {
        let query_params = parse_query_params(uri.query().unwrap_or(""));
        let host = headers
            .get(http::header::HOST)
            .and_then(|v| v.to_str().ok())
            .or_else(|| uri.authority().map(http::uri::Authority::as_str));
        let virtual_bucket = host.and_then(|h| extract_virtual_host_bucket(h, &self.domain));

        let path = uri.path();
        let (bucket, key) = match virtual_bucket {
            Some(bucket) => {
                let raw_key = path.strip_prefix('/').unwrap_or(path);
                let key = (!raw_key.is_empty()).then(|| decode_uri_component(raw_key));
                (Some(bucket), key)
            }
            None => parse_path(path),
        };

        let operation = identify_operation(
            method,
            bucket.is_some(),
            key.is_some(),
            &query_params,
            headers,
        )?;

        Ok(RoutingContext {
            bucket,
            key,
            operation,
            query_params,
        })
    }
}

/// Extract the bucket from a virtual-hosted `Host` value.
///
/// With domain `localhost`, `photos.localhost:9000` yields `photos`.
fn extract_virtual_host_bucket(host: &str, domain: &str) -> Option<String> {
    let host = host.split(':').next().unwrap_or(host);
    let bucket = host.strip_suffix(domain)?.strip_suffix('.')?;
    (!bucket.is_empty()).then(|| bucket.to_owned())
}

/// Split `/{bucket}/{key...}` into its parts.
fn parse_path(path: &str) -> (Option<String>, Option<String>) {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        return (None, None);
    }
    match trimmed.split_once('/') {
        Some((bucket, "")) => (Some(decode_uri_component(bucket)), None),
        Some((bucket, key)) => (
            Some(decode_uri_component(bucket)),
            Some(decode_uri_component(key)),
        ),
        None => (Some(decode_uri_component(trimmed)), None),
    }
}

fn decode_uri_component(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

fn parse_query_params(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (decode_uri_component(k), decode_uri_component(v)),
            None => (decode_uri_component(pair), String::new()),
        })
        .collect()
}

fn query_has_key(params: &[(String, String)], key: &str) -> bool {
    params.iter().any(|(k, _)| k == key)
}

fn query_value<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn identify_operation(
    method: &Method,
    has_bucket: bool,
    has_key: bool,
    params: &[(String, String)],
    headers: &HeaderMap,
) -> S3Result<Operation> {
    match (has_bucket, has_key) {
        (false, false) if *method == Method::GET => Ok(Operation::ListBuckets),
        (true, false) => identify_bucket_operation(method, params),
        (true, true) => identify_object_operation(method, params, headers),
        _ => Err(unsupported(method)),
    }
}

fn unsupported(method: &Method) -> S3Error {
    S3Error::with_message(
        ErrorKind::InvalidArgument,
        format!("unsupported request: {method}"),
    )
}

fn identify_bucket_operation(method: &Method, params: &[(String, String)]) -> S3Result<Operation> {
    let has = |key: &str| query_has_key(params, key);
    let op = match *method {
        Method::GET if has("versioning") => Operation::GetBucketVersioning,
        Method::GET if has("policy") => Operation::GetBucketPolicy,
        Method::GET if has("tagging") => Operation::GetBucketTagging,
        Method::GET if has("publicAccessBlock") => Operation::GetPublicAccessBlock,
        Method::GET if has("object-lock") => Operation::GetObjectLockConfiguration,
        Method::GET if has("uploads") => Operation::ListMultipartUploads,
        Method::GET if has("versions") => Operation::ListObjectVersions,
        // ListObjects v1 is served with v2 semantics.
        Method::GET => Operation::ListObjectsV2,
        Method::PUT if has("versioning") => Operation::PutBucketVersioning,
        Method::PUT if has("policy") => Operation::PutBucketPolicy,
        Method::PUT if has("tagging") => Operation::PutBucketTagging,
        Method::PUT if has("publicAccessBlock") => Operation::PutPublicAccessBlock,
        Method::PUT if has("object-lock") => Operation::PutObjectLockConfiguration,
        Method::PUT => Operation::CreateBucket,
        Method::DELETE if has("policy") => Operation::DeleteBucketPolicy,
        Method::DELETE if has("tagging") => Operation::DeleteBucketTagging,
        Method::DELETE if has("publicAccessBlock") => Operation::DeletePublicAccessBlock,
        Method::DELETE => Operation::DeleteBucket,
        Method::HEAD => Operation::HeadBucket,
        Method::POST if has("delete") => Operation::DeleteObjects,
        _ => return Err(unsupported(method)),
    };
    Ok(op)
}

fn identify_object_operation(
    method: &Method,
    params: &[(String, String)],
    headers: &HeaderMap,
) -> S3Result<Operation> {
    let has = |key: &str| query_has_key(params, key);
    let is_copy = headers.contains_key("x-amz-copy-source");
    let op = match *method {
        Method::GET if has("tagging") => Operation::GetObjectTagging,
        Method::GET if has("retention") => Operation::GetObjectRetention,
        Method::GET if has("legal-hold") => Operation::GetObjectLegalHold,
        Method::GET if has("uploadId") => Operation::ListParts,
        Method::GET => Operation::GetObject,
        Method::HEAD => Operation::HeadObject,
        Method::PUT if has("tagging") => Operation::PutObjectTagging,
        Method::PUT if has("retention") => Operation::PutObjectRetention,
        Method::PUT if has("legal-hold") => Operation::PutObjectLegalHold,
        Method::PUT if has("partNumber") && has("uploadId") => {
            if is_copy {
                Operation::UploadPartCopy
            } else {
                Operation::UploadPart
            }
        }
        Method::PUT if is_copy => Operation::CopyObject,
        Method::PUT => Operation::PutObject,
        Method::DELETE if has("tagging") => Operation::DeleteObjectTagging,
        Method::DELETE if has("uploadId") => Operation::AbortMultipartUpload,
        Method::DELETE => Operation::DeleteObject,
        Method::POST if has("uploads") => Operation::CreateMultipartUpload,
        Method::POST if has("uploadId") => Operation::CompleteMultipartUpload,
        _ => return Err(unsupported(method)),
    };
    Ok(op)
}

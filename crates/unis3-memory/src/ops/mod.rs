//! Operation handlers.
//!
//! Each submodule adds `handle_*` methods to [`crate::MemoryServer`]. The
//! helpers here turn request headers into model values and model values
//! back into response headers.

pub(crate) mod bucket;
pub(crate) mod list;
pub(crate) mod lock;
pub(crate) mod multipart;
pub(crate) mod object;

use anyhow::Context;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use percent_encoding::percent_decode_str;
use unis3_core::Dialect;
use unis3_core::conditions::format_http_date;
use unis3_core::object_lock::{format_retain_until, parse_retain_until};
use unis3_core::transport::HttpResponse;
use unis3_model::types::{
    ObjectMetadata, Retention, RetentionMode, ServerSideEncryption, Tagging, VersioningStatus,
};
use unis3_model::{ErrorKind, S3Error, S3Result};
use unis3_xml::{S3Deserialize, S3Serialize, from_xml, to_xml};

use crate::router::RoutingContext;
use crate::state::{ObjectStore, ObjectVersion, StoredObject};

const USER_METADATA_PREFIX: &str = "x-amz-meta-";

/// A routed request with its headers and body.
#[derive(Debug)]
pub(crate) struct RequestContext {
    pub route: RoutingContext,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub now: DateTime<Utc>,
    pub dialect: &'static Dialect,
}

impl RequestContext {
    /// A request header, as the vendor sees it: headers the dialect does not
    /// support are treated as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        if !self.dialect.supports_header(name) {
            return None;
        }
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.route.param(name)
    }

    pub fn bucket(&self) -> S3Result<&str> {
        self.route.bucket()
    }

    pub fn key(&self) -> S3Result<&str> {
        self.route.key()
    }

    pub fn flag(&self, name: &str) -> bool {
        self.header(name)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    /// The version addressed by `?versionId`: `None` for the latest,
    /// `Some(None)` for the null version.
    pub fn requested_version(&self) -> Option<Option<String>> {
        self.param("versionId")
            .map(|raw| self.dialect.normalize_version_id(Some(raw)))
    }

    /// Parse the XML request body.
    pub fn xml_body<T: S3Deserialize>(&self) -> S3Result<T> {
        from_xml(&self.body).map_err(|e| {
            S3Error::with_message(
                ErrorKind::InvalidArgument,
                format!("the XML you provided was not well-formed: {e}"),
            )
        })
    }

    /// A numeric query parameter.
    pub fn u32_param(&self, name: &str) -> S3Result<Option<u32>> {
        self.param(name)
            .map(|v| {
                v.parse::<u32>().map_err(|_| {
                    S3Error::with_message(ErrorKind::InvalidArgument, format!("invalid {name}: {v}"))
                })
            })
            .transpose()
    }
}

/// Convert an internal response-building failure into a server error.
pub(crate) fn internal(err: &anyhow::Error) -> S3Error {
    S3Error::with_message(ErrorKind::ServerError, format!("{err:#}"))
}

fn header_pair(name: &str, value: &str) -> anyhow::Result<(HeaderName, HeaderValue)> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .with_context(|| format!("invalid header name {name}"))?;
    let header_value =
        HeaderValue::from_str(value).with_context(|| format!("invalid value for header {name}"))?;
    Ok((header_name, header_value))
}

/// Accumulates status and headers before the body is attached.
#[derive(Debug)]
pub(crate) struct Response {
    status: StatusCode,
    headers: HeaderMap,
}

impl Response {
    pub fn ok() -> Self {
        Self::with_status(StatusCode::OK)
    }

    pub fn no_content() -> Self {
        Self::with_status(StatusCode::NO_CONTENT)
    }

    pub fn with_status(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
        }
    }

    pub fn header(mut self, name: &str, value: impl AsRef<str>) -> S3Result<Self> {
        let (name, value) = header_pair(name, value.as_ref()).map_err(|e| internal(&e))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn optional_header(self, name: &str, value: Option<impl AsRef<str>>) -> S3Result<Self> {
        match value {
            Some(v) => self.header(name, v),
            None => Ok(self),
        }
    }

    pub fn empty(self) -> HttpResponse {
        HttpResponse::new(self.status, self.headers, Bytes::new())
    }

    pub fn body(self, body: impl Into<Bytes>) -> HttpResponse {
        HttpResponse::new(self.status, self.headers, body)
    }

    pub fn xml<T: S3Serialize>(self, root: &str, value: &T) -> S3Result<HttpResponse> {
        let body = to_xml(root, value)?;
        Ok(self.header("content-type", "application/xml")?.body(body))
    }
}

/// The `x-amz-version-id` value for a version in a bucket with the given
/// versioning state. Never-versioned buckets report none.
pub(crate) fn version_header(
    version_id: Option<&str>,
    versioning: Option<VersioningStatus>,
    dialect: &Dialect,
) -> Option<String> {
    versioning.map(|_| version_id.unwrap_or(dialect.null_version()).to_owned())
}

/// Headers describing a stored object on GET and HEAD.
pub(crate) fn object_headers(
    mut response: Response,
    object: &StoredObject,
    versioning: Option<VersioningStatus>,
    dialect: &Dialect,
) -> S3Result<Response> {
    let meta = &object.metadata;
    response = response
        .header("etag", &object.etag)?
        .header("last-modified", format_http_date(&object.last_modified))?
        .header("accept-ranges", "bytes")?
        .optional_header("content-type", meta.content_type.as_ref())?
        .optional_header("cache-control", meta.cache_control.as_ref())?
        .optional_header("content-encoding", meta.content_encoding.as_ref())?
        .optional_header("content-language", meta.content_language.as_ref())?
        .optional_header("content-disposition", meta.content_disposition.as_ref())?
        .optional_header("expires", meta.expires.as_ref())?
        .optional_header("x-amz-storage-class", object.storage_class.as_ref())?
        .optional_header(
            "x-amz-version-id",
            version_header(object.version_id.as_deref(), versioning, dialect),
        )?;
    for (name, value) in &meta.user_metadata {
        response = response.header(&format!("{USER_METADATA_PREFIX}{name}"), value)?;
    }
    if let Some(sse) = &object.sse {
        response = response
            .header("x-amz-server-side-encryption", &sse.algorithm)?
            .optional_header(
                "x-amz-server-side-encryption-aws-kms-key-id",
                sse.kms_key_id.as_ref(),
            )?;
    }
    if !object.tags.is_empty() {
        response = response.header("x-amz-tagging-count", object.tags.len().to_string())?;
    }
    if let Some(count) = object.parts_count {
        response = response.header("x-amz-mp-parts-count", count.to_string())?;
    }
    if let Some(retention) = &object.lock.retention {
        response = response
            .header("x-amz-object-lock-mode", retention.mode.as_str())?
            .header(
                "x-amz-object-lock-retain-until-date",
                format_retain_until(&retention.retain_until),
            )?;
    }
    if object.lock.legal_hold {
        response = response.header("x-amz-object-lock-legal-hold", "ON")?;
    }
    Ok(response)
}

/// Object settings carried by a write request's headers.
#[derive(Debug, Default)]
pub(crate) struct WriteSettings {
    pub metadata: ObjectMetadata,
    pub storage_class: Option<String>,
    pub sse: Option<ServerSideEncryption>,
    pub tags: Option<Tagging>,
    pub retention: Option<Retention>,
    pub legal_hold: Option<bool>,
}

impl WriteSettings {
    pub fn from_request(ctx: &RequestContext) -> S3Result<Self> {
        let retention = match (
            ctx.header("x-amz-object-lock-mode"),
            ctx.header("x-amz-object-lock-retain-until-date"),
        ) {
            (Some(mode), Some(until)) => Some(Retention::new(
                mode.parse::<RetentionMode>().map_err(as_invalid_argument)?,
                parse_retain_until(until)?,
            )),
            (None, None) => None,
            _ => {
                return Err(S3Error::with_message(
                    ErrorKind::InvalidArgument,
                    "x-amz-object-lock-mode and x-amz-object-lock-retain-until-date must be given together",
                ));
            }
        };
        let legal_hold = ctx
            .header("x-amz-object-lock-legal-hold")
            .map(parse_legal_hold_status)
            .transpose()?;
        Ok(Self {
            metadata: metadata_from_headers(ctx),
            storage_class: ctx.header("x-amz-storage-class").map(ToOwned::to_owned),
            sse: sse_from_headers(ctx),
            tags: ctx.header("x-amz-tagging").map(parse_tagging_header).transpose()?,
            retention,
            legal_hold,
        })
    }
}

pub(crate) fn metadata_from_headers(ctx: &RequestContext) -> ObjectMetadata {
    let header = |name: &str| ctx.header(name).map(ToOwned::to_owned);
    let user_metadata = ctx
        .headers
        .iter()
        .filter_map(|(name, value)| {
            let suffix = name.as_str().strip_prefix(USER_METADATA_PREFIX)?;
            Some((suffix.to_owned(), value.to_str().ok()?.to_owned()))
        })
        .collect();
    ObjectMetadata {
        cache_control: header("cache-control"),
        content_type: header("content-type"),
        content_encoding: header("content-encoding"),
        content_language: header("content-language"),
        content_disposition: header("content-disposition"),
        expires: header("expires"),
        content_range: None,
        user_metadata,
    }
}

/// Requested encryption, falling back to the vendor default.
pub(crate) fn sse_from_headers(ctx: &RequestContext) -> Option<ServerSideEncryption> {
    match ctx.header("x-amz-server-side-encryption") {
        Some(algorithm) => Some(ServerSideEncryption {
            algorithm: algorithm.to_owned(),
            kms_key_id: ctx
                .header("x-amz-server-side-encryption-aws-kms-key-id")
                .map(ToOwned::to_owned),
        }),
        None if ctx.dialect.sse_by_default => Some(ServerSideEncryption::s3()),
        None => None,
    }
}

/// Parse `x-amz-tagging`: URL-encoded `key=value` pairs joined by `&`.
pub(crate) fn parse_tagging_header(value: &str) -> S3Result<Tagging> {
    let decode = |s: &str| {
        percent_decode_str(&s.replace('+', " "))
            .decode_utf8()
            .map(std::borrow::Cow::into_owned)
            .map_err(|_| S3Error::with_message(ErrorKind::InvalidArgument, "invalid x-amz-tagging"))
    };
    let mut pairs = Vec::new();
    for pair in value.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        pairs.push((decode(key)?, decode(value)?));
    }
    Tagging::new(pairs).map_err(as_invalid_argument)
}

pub(crate) fn parse_legal_hold_status(value: &str) -> S3Result<bool> {
    match value {
        "ON" => Ok(true),
        "OFF" => Ok(false),
        other => Err(S3Error::with_message(
            ErrorKind::InvalidArgument,
            format!("invalid legal hold status: {other}"),
        )),
    }
}

/// Re-tag a client-side validation failure as the vendor's `InvalidArgument`.
pub(crate) fn as_invalid_argument(err: S3Error) -> S3Error {
    if err.kind() == ErrorKind::InvalidInput {
        S3Error::with_message(ErrorKind::InvalidArgument, err.message())
    } else {
        err
    }
}

/// The kind a vendor reports for `kind`; client-side kinds never reach the
/// wire.
pub(crate) fn wire_kind(kind: ErrorKind) -> ErrorKind {
    match kind {
        ErrorKind::InvalidInput => ErrorKind::InvalidArgument,
        k if k.is_local() => ErrorKind::ServerError,
        k => k,
    }
}

/// The object a read addresses: the latest version, or the one named by
/// `version` (`Some(None)` is the null version).
pub(crate) fn select_object<'a>(
    objects: &'a ObjectStore,
    key: &str,
    version: Option<&Option<String>>,
) -> S3Result<&'a StoredObject> {
    let found = match version {
        Some(v) => objects.version(key, v.as_deref()),
        None => objects.latest(key),
    };
    match found {
        Some(ObjectVersion::Object(object)) => Ok(object),
        Some(ObjectVersion::DeleteMarker(_)) if version.is_some() => {
            Err(S3Error::new(ErrorKind::VersionIsDeleteMarker))
        }
        _ => Err(S3Error::new(ErrorKind::ObjectNotFound)),
    }
}

/// Mutable form of [`select_object`].
pub(crate) fn select_object_mut<'a>(
    objects: &'a mut ObjectStore,
    key: &str,
    version: Option<&Option<String>>,
) -> S3Result<&'a mut StoredObject> {
    let Some(version) = version else {
        return objects
            .current_mut(key)
            .ok_or_else(|| S3Error::new(ErrorKind::ObjectNotFound));
    };
    match objects.version_mut(key, version.as_deref()) {
        Some(ObjectVersion::Object(object)) => Ok(object),
        Some(ObjectVersion::DeleteMarker(_)) => Err(S3Error::new(ErrorKind::VersionIsDeleteMarker)),
        None => Err(S3Error::with_message(
            ErrorKind::ObjectNotFound,
            "The specified version does not exist",
        )),
    }
}

/// Resolve a `Range` header against an object of `size` bytes into an
/// inclusive `(start, end)` pair.
pub(crate) fn parse_range(range: &str, size: u64) -> S3Result<(u64, u64)> {
    let invalid = || S3Error::new(ErrorKind::InvalidRange);
    let spec = range.trim().strip_prefix("bytes=").ok_or_else(invalid)?;
    if size == 0 {
        return Err(invalid());
    }
    let (start, end) = spec.split_once('-').ok_or_else(invalid)?;
    if start.is_empty() {
        let n: u64 = end.parse().map_err(|_| invalid())?;
        if n == 0 {
            return Err(invalid());
        }
        return Ok((size.saturating_sub(n), size - 1));
    }
    let start: u64 = start.parse().map_err(|_| invalid())?;
    let end = if end.is_empty() {
        size - 1
    } else {
        end.parse::<u64>().map_err(|_| invalid())?.min(size - 1)
    };
    if start > end || start >= size {
        return Err(invalid());
    }
    Ok((start, end))
}

/// A parsed `x-amz-copy-source`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CopySourceRef {
    pub bucket: String,
    pub key: String,
    /// `None` for the latest version, `Some(None)` for the null version.
    pub version: Option<Option<String>>,
}

/// Parse `x-amz-copy-source`: `[/]bucket/key[?versionId=id]`, key
/// percent-encoded.
pub(crate) fn parse_copy_source(source: &str, dialect: &Dialect) -> S3Result<CopySourceRef> {
    let invalid = |message: &str| S3Error::with_message(ErrorKind::InvalidArgument, message);
    let source = source.strip_prefix('/').unwrap_or(source);
    let (path, version) = match source.split_once('?') {
        Some((path, query)) => {
            let raw = query
                .split('&')
                .find_map(|param| param.strip_prefix("versionId="));
            (path, raw.map(|v| dialect.normalize_version_id(Some(v))))
        }
        None => (source, None),
    };
    let (bucket, key) = path
        .split_once('/')
        .ok_or_else(|| invalid("copy source must be bucket/key"))?;
    if bucket.is_empty() || key.is_empty() {
        return Err(invalid("copy source bucket and key must not be empty"));
    }
    let key = percent_decode_str(key)
        .decode_utf8()
        .map_err(|_| invalid("copy source key is not valid UTF-8"))?
        .into_owned();
    Ok(CopySourceRef {
        bucket: bucket.to_owned(),
        key,
        version,
    })
}

/// Continuation tokens are the base64 of the last returned key.
pub(crate) fn encode_continuation_token(key: &str) -> String {
    BASE64.encode(key.as_bytes())
}

pub(crate) fn decode_continuation_token(token: &str) -> S3Result<String> {
    let invalid =
        || S3Error::with_message(ErrorKind::InvalidArgument, "the continuation token is not valid");
    let bytes = BASE64.decode(token).map_err(|_| invalid())?;
    String::from_utf8(bytes).map_err(|_| invalid())
}

//! Request assembly and response decoding shared by every operation.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use http::Method;
use md5::{Digest, Md5};
use tracing::warn;
use unis3_core::Dialect;
use unis3_core::conditions::{self, ConditionSite, format_http_date, parse_http_date};
use unis3_core::object_lock::{format_retain_until, parse_retain_until};
use unis3_core::transport::HttpResponse;
use unis3_model::types::{
    ConditionSpec, ObjectLockProperties, ObjectMetadata, Retention, RetentionMode, S3Object,
    ServerSideEncryption,
};
use unis3_model::{ErrorKind, S3Error, S3Result};
use unis3_xml::{S3Deserialize, S3Serialize, from_xml, to_xml};

pub(crate) const USER_METADATA_PREFIX: &str = "x-amz-meta-";

/// One request before addressing and signing.
#[derive(Debug)]
pub(crate) struct S3Request<'a> {
    pub method: Method,
    pub bucket: Option<&'a str>,
    pub key: Option<&'a str>,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    /// What a bodiless `404` means for this operation.
    pub not_found: ErrorKind,
    dialect: &'static Dialect,
}

impl<'a> S3Request<'a> {
    pub fn new(method: Method, dialect: &'static Dialect) -> Self {
        Self {
            method,
            bucket: None,
            key: None,
            query: Vec::new(),
            headers: Vec::new(),
            body: Bytes::new(),
            not_found: ErrorKind::ObjectNotFound,
            dialect,
        }
    }

    pub fn bucket(mut self, bucket: &'a str) -> Self {
        self.bucket = Some(bucket);
        self.not_found = ErrorKind::BucketNotFound;
        self
    }

    pub fn key(mut self, key: &'a str) -> Self {
        self.key = Some(key);
        self.not_found = ErrorKind::ObjectNotFound;
        self
    }

    pub fn not_found(mut self, kind: ErrorKind) -> Self {
        self.not_found = kind;
        self
    }

    pub fn query(mut self, name: &str, value: impl Into<String>) -> Self {
        self.query.push((name.to_owned(), value.into()));
        self
    }

    /// A sub-resource marker such as `?versioning`.
    pub fn flag(self, name: &str) -> Self {
        self.query(name, "")
    }

    pub fn optional_query(self, name: &str, value: Option<impl ToString>) -> Self {
        match value {
            Some(v) => self.query(name, v.to_string()),
            None => self,
        }
    }

    /// `?versionId=`, spelling the null version the way the vendor does.
    pub fn version_query(self, version_id: Option<&str>) -> Self {
        let dialect = self.dialect;
        self.optional_query("versionId", version_id.map(|v| wire_version_id(v, dialect)))
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_owned(), value.into()));
        self
    }

    pub fn optional_header(self, name: &str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(v) => self.header(name, v),
            None => self,
        }
    }

    /// An optional header the vendor may not support; unsupported ones are
    /// dropped with a warning. Only for headers whose loss leaves the stored
    /// object as the caller asked, see [`S3Request::required_header`].
    pub fn vendor_header(self, name: &str, value: impl Into<String>) -> Self {
        if self.dialect.supports_header(name) {
            self.header(name, value)
        } else {
            warn!(
                header = name,
                provider = %self.dialect.provider,
                "dropping header the provider does not support"
            );
            self
        }
    }

    /// A header carrying something the caller requires of the stored object,
    /// such as a lock or a tag set. A vendor that cannot carry it fails the
    /// request locally.
    pub fn required_header(
        self,
        name: &str,
        value: impl Into<String>,
        what: &str,
    ) -> S3Result<Self> {
        if self.dialect.supports_header(name) {
            Ok(self.header(name, value))
        } else {
            Err(S3Error::invalid_input(format!(
                "{} does not support {what} ({name})",
                self.dialect.provider
            )))
        }
    }

    pub fn conditions(mut self, spec: &ConditionSpec, site: ConditionSite) -> S3Result<Self> {
        for (name, value) in conditions::compile(spec, site)? {
            self.headers.push((name.to_owned(), value));
        }
        Ok(self)
    }

    pub fn bypass_governance(self, bypass: bool) -> Self {
        if bypass {
            self.vendor_header("x-amz-bypass-governance-retention", "true")
        } else {
            self
        }
    }

    pub fn sse(self, sse: Option<&ServerSideEncryption>) -> Self {
        match sse {
            Some(sse) => self
                .header("x-amz-server-side-encryption", &sse.algorithm)
                .optional_header(
                    "x-amz-server-side-encryption-aws-kms-key-id",
                    sse.kms_key_id.clone(),
                ),
            None => self,
        }
    }

    pub fn lock(self, retention: Option<&Retention>, legal_hold: Option<bool>) -> S3Result<Self> {
        let mut request = self;
        if let Some(retention) = retention {
            request = request
                .required_header("x-amz-object-lock-mode", retention.mode.as_str(), "object lock")?
                .required_header(
                    "x-amz-object-lock-retain-until-date",
                    format_retain_until(&retention.retain_until),
                    "object lock",
                )?;
        }
        if let Some(hold) = legal_hold {
            request = request.required_header(
                "x-amz-object-lock-legal-hold",
                if hold { "ON" } else { "OFF" },
                "legal hold",
            )?;
        }
        Ok(request)
    }

    /// `x-amz-meta-*` headers. Values travel as raw header text, so they
    /// must be printable ASCII.
    pub fn user_metadata(self, metadata: &BTreeMap<String, String>) -> S3Result<Self> {
        metadata.iter().try_fold(self, |request, (name, value)| {
            if !value.bytes().all(|b| b == b'\t' || (b' '..=b'~').contains(&b)) {
                return Err(S3Error::invalid_input(format!(
                    "user metadata value for {name:?} must be printable ASCII"
                )));
            }
            Ok(request.header(&format!("{USER_METADATA_PREFIX}{name}"), value))
        })
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Attach `Content-MD5` for the current body.
    pub fn content_md5(self) -> Self {
        let digest = BASE64.encode(Md5::digest(&self.body));
        self.header("content-md5", digest)
    }

    /// Serialize `value` as the XML body under `root`.
    pub fn xml_body<T: S3Serialize>(self, root: &str, value: &T) -> S3Result<Self> {
        let body = to_xml(root, value)?;
        Ok(self
            .header("content-type", "application/xml")
            .body(body)
            .content_md5())
    }
}

/// The wire spelling of a caller-supplied version id. `"null"` becomes the
/// vendor's null representation.
pub(crate) fn wire_version_id(version_id: &str, dialect: &Dialect) -> String {
    if version_id == "null" {
        dialect.null_version().to_owned()
    } else {
        version_id.to_owned()
    }
}

/// A version id as reported to callers: the vendor's null representation
/// becomes `None`.
pub(crate) fn reported_version_id(raw: Option<&str>, dialect: &Dialect) -> Option<String> {
    dialect.normalize_version_id(raw)
}

/// A listed version id. Listings always name a version, so the null version
/// is reported as `"null"` whatever the vendor's spelling.
pub(crate) fn listed_version_id(raw: &str, dialect: &Dialect) -> String {
    dialect
        .normalize_version_id(Some(raw))
        .unwrap_or_else(|| "null".to_owned())
}

pub(crate) fn header(response: &HttpResponse, name: &str) -> Option<String> {
    response.header(name).map(ToOwned::to_owned)
}

/// Read and parse an XML response body.
pub(crate) fn read_xml<T: S3Deserialize>(response: HttpResponse) -> S3Result<T> {
    let body = response.into_bytes()?;
    Ok(from_xml(&body)?)
}

fn parse_u64(value: &str, name: &str) -> S3Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| S3Error::malformed_response(format!("invalid {name}: {value}")))
}

/// Total object size from `Content-Range: bytes a-b/total`.
fn total_from_content_range(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

/// Build the object description carried by GET and HEAD response headers.
pub(crate) fn object_from_headers(
    key: &str,
    response: &HttpResponse,
    dialect: &Dialect,
) -> S3Result<S3Object> {
    let content_range = header(response, "content-range");
    let size = match (
        content_range.as_deref().and_then(total_from_content_range),
        response.header("content-length"),
    ) {
        (Some(total), _) => total,
        (None, Some(length)) => parse_u64(length, "Content-Length")?,
        (None, None) => 0,
    };
    let last_modified = response
        .header("last-modified")
        .and_then(parse_http_date)
        .ok_or_else(|| S3Error::malformed_response("missing or invalid Last-Modified"))?;
    let user_metadata = response
        .headers
        .iter()
        .filter_map(|(name, value)| {
            let suffix = name.as_str().strip_prefix(USER_METADATA_PREFIX)?;
            Some((suffix.to_owned(), value.to_str().ok()?.to_owned()))
        })
        .collect();
    let metadata = ObjectMetadata {
        cache_control: header(response, "cache-control"),
        content_type: header(response, "content-type"),
        content_encoding: header(response, "content-encoding"),
        content_language: header(response, "content-language"),
        content_disposition: header(response, "content-disposition"),
        expires: header(response, "expires"),
        content_range,
        user_metadata,
    };

    let sse = response
        .header("x-amz-server-side-encryption")
        .map(|algorithm| ServerSideEncryption {
            algorithm: algorithm.to_owned(),
            kms_key_id: header(response, "x-amz-server-side-encryption-aws-kms-key-id"),
        });
    let count = |name: &str| -> S3Result<Option<u32>> {
        response
            .header(name)
            .map(|v| {
                v.trim()
                    .parse()
                    .map_err(|_| S3Error::malformed_response(format!("invalid {name}: {v}")))
            })
            .transpose()
    };
    let parts_count = if dialect.reports_parts_count {
        count("x-amz-mp-parts-count")?
    } else {
        None
    };

    Ok(S3Object {
        key: key.to_owned(),
        version_id: reported_version_id(response.header("x-amz-version-id"), dialect),
        size,
        etag: header(response, "etag").unwrap_or_default(),
        last_modified,
        storage_class: header(response, "x-amz-storage-class"),
        metadata: (!metadata.is_empty()).then_some(metadata),
        tag_count: count("x-amz-tagging-count")?,
        parts_count,
        sse,
        lock: lock_from_headers(response)?,
    })
}

fn lock_from_headers(response: &HttpResponse) -> S3Result<Option<ObjectLockProperties>> {
    let retention = match (
        response.header("x-amz-object-lock-mode"),
        response.header("x-amz-object-lock-retain-until-date"),
    ) {
        (Some(mode), Some(until)) => Some(Retention::new(
            mode.parse::<RetentionMode>()
                .map_err(|e| S3Error::malformed_response(e.message().to_owned()))?,
            parse_retain_until(until)?,
        )),
        _ => None,
    };
    let legal_hold = response.header("x-amz-object-lock-legal-hold") == Some("ON");
    if retention.is_none() && !legal_hold {
        return Ok(None);
    }
    Ok(Some(ObjectLockProperties {
        retention,
        legal_hold,
    }))
}

/// Format `Expires` for a write.
pub(crate) fn expires_header(expires: &chrono::DateTime<chrono::Utc>) -> String {
    format_http_date(expires)
}

//! Shared value types: buckets, objects, versions, parts, uploads, tags and
//! object-lock settings.
//!
//! All timestamps are `DateTime<Utc>`. Nothing here depends on the process
//! time zone.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{S3Error, S3Result};

/// Smallest allowed size of a non-last multipart part (5 MiB).
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Largest part number S3 accepts.
pub const MAX_PART_NUMBER: u32 = 10_000;

/// Maximum number of tags on an object.
pub const MAX_OBJECT_TAGS: usize = 10;

/// Maximum number of tags on a bucket.
pub const MAX_BUCKET_TAGS: usize = 50;

// ---------------------------------------------------------------------------
// Buckets
// ---------------------------------------------------------------------------

/// A bucket as reported by `ListBuckets`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    /// Bucket name.
    pub name: String,
    /// When the bucket was created.
    pub creation_date: DateTime<Utc>,
    /// The region, when the server reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// Bucket versioning status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersioningStatus {
    /// New writes receive unique version ids.
    Enabled,
    /// New writes overwrite the `null` version.
    Suspended,
}

impl VersioningStatus {
    /// Wire representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Enabled => "Enabled",
            Self::Suspended => "Suspended",
        }
    }
}

impl FromStr for VersioningStatus {
    type Err = S3Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Enabled" => Ok(Self::Enabled),
            "Suspended" => Ok(Self::Suspended),
            other => Err(S3Error::invalid_input(format!(
                "unknown versioning status: {other}"
            ))),
        }
    }
}

/// Public access block settings of a bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct PublicAccessBlockConfiguration {
    /// Reject requests that carry public ACLs.
    pub block_public_acls: bool,
    /// Ignore public ACLs on the bucket and its objects.
    pub ignore_public_acls: bool,
    /// Reject bucket policies that grant public access.
    pub block_public_policy: bool,
    /// Restrict access to buckets with public policies.
    pub restrict_public_buckets: bool,
}

// ---------------------------------------------------------------------------
// Objects
// ---------------------------------------------------------------------------

/// HTTP-level metadata of an object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    /// `Cache-Control`.
    pub cache_control: Option<String>,
    /// `Content-Type`.
    pub content_type: Option<String>,
    /// `Content-Encoding`.
    pub content_encoding: Option<String>,
    /// `Content-Language`.
    pub content_language: Option<String>,
    /// `Content-Disposition`.
    pub content_disposition: Option<String>,
    /// `Expires`, as sent by the server.
    pub expires: Option<String>,
    /// `Content-Range`, only on partial reads.
    pub content_range: Option<String>,
    /// User metadata (`x-amz-meta-*`), keys lower-cased without the prefix.
    #[serde(default)]
    pub user_metadata: BTreeMap<String, String>,
}

impl ObjectMetadata {
    /// Whether no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Server-side encryption descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSideEncryption {
    /// `AES256` or `aws:kms`.
    pub algorithm: String,
    /// KMS key id for `aws:kms`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kms_key_id: Option<String>,
}

impl ServerSideEncryption {
    /// SSE-S3 (`AES256`).
    #[must_use]
    pub fn s3() -> Self {
        Self {
            algorithm: "AES256".to_owned(),
            kms_key_id: None,
        }
    }

    /// SSE-KMS with an optional key id.
    #[must_use]
    pub fn kms(key_id: Option<String>) -> Self {
        Self {
            algorithm: "aws:kms".to_owned(),
            kms_key_id: key_id,
        }
    }
}

/// An object, as produced by list, get, download and stat operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Object {
    /// Object key.
    pub key: String,
    /// Version id, when the server reported one.
    pub version_id: Option<String>,
    /// Size in bytes (of the returned range for partial reads).
    pub size: u64,
    /// Entity tag, quoted as sent by the server.
    pub etag: String,
    /// Last modification time.
    pub last_modified: DateTime<Utc>,
    /// Storage class, e.g. `STANDARD`.
    pub storage_class: Option<String>,
    /// HTTP metadata, present on get/stat results.
    pub metadata: Option<ObjectMetadata>,
    /// Number of tags (`x-amz-tagging-count`).
    pub tag_count: Option<u32>,
    /// Number of parts for multipart objects, where the provider reports it.
    pub parts_count: Option<u32>,
    /// Server-side encryption, when reported.
    pub sse: Option<ServerSideEncryption>,
    /// Object-lock properties, when reported.
    pub lock: Option<ObjectLockProperties>,
}

/// One entry of a version listing: an object version or a delete marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3ObjectVersion {
    /// Object key.
    pub key: String,
    /// Version id as the provider represents it.
    pub version_id: String,
    /// Whether this is the newest entry for the key.
    pub is_latest: bool,
    /// Size in bytes; zero for delete markers.
    pub size: u64,
    /// Last modification time.
    pub last_modified: DateTime<Utc>,
    /// Entity tag; absent for delete markers.
    pub etag: Option<String>,
    /// Storage class; absent for delete markers.
    pub storage_class: Option<String>,
    /// Whether this entry is a delete marker.
    pub delete_marker: bool,
}

/// Strips surrounding quotes from an ETag.
///
/// ```
/// use unis3_model::types::normalize_etag;
/// assert_eq!(normalize_etag("\"abc\""), "abc");
/// assert_eq!(normalize_etag("W/\"abc\""), "abc");
/// assert_eq!(normalize_etag("abc"), "abc");
/// ```
#[must_use]
pub fn normalize_etag(etag: &str) -> &str {
    let etag = etag.trim();
    let etag = etag.strip_prefix("W/").unwrap_or(etag);
    etag.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(etag)
}

// ---------------------------------------------------------------------------
// Ranges and directives
// ---------------------------------------------------------------------------

/// An inclusive byte range for `Range` and `x-amz-copy-source-range`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    start: u64,
    end: Option<u64>,
}

impl ByteRange {
    /// A closed range `start..=end`.
    pub fn new(start: u64, end: u64) -> S3Result<Self> {
        if end < start {
            return Err(S3Error::invalid_input(format!(
                "byte range end {end} is before start {start}"
            )));
        }
        Ok(Self {
            start,
            end: Some(end),
        })
    }

    /// An open range from `start` to the end of the object.
    #[must_use]
    pub fn from_offset(start: u64) -> Self {
        Self { start, end: None }
    }

    /// First byte offset.
    #[must_use]
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Last byte offset, if closed.
    #[must_use]
    pub fn end(&self) -> Option<u64> {
        self.end
    }

    /// Number of bytes covered, if closed.
    #[must_use]
    pub fn len(&self) -> Option<u64> {
        self.end.map(|end| end - self.start + 1)
    }

    /// Header value, e.g. `bytes=0-99`.
    #[must_use]
    pub fn header_value(&self) -> String {
        match self.end {
            Some(end) => format!("bytes={}-{end}", self.start),
            None => format!("bytes={}-", self.start),
        }
    }
}

/// `x-amz-metadata-directive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataDirective {
    /// Keep the source metadata.
    Copy,
    /// Use the metadata from the request.
    Replace,
}

/// `x-amz-tagging-directive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaggingDirective {
    /// Keep the source tags.
    Copy,
    /// Use the tags from the request.
    Replace,
}

macro_rules! directive_str {
    ($ty:ty) => {
        impl $ty {
            /// Wire representation.
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    Self::Copy => "COPY",
                    Self::Replace => "REPLACE",
                }
            }
        }

        impl FromStr for $ty {
            type Err = S3Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_ascii_uppercase().as_str() {
                    "COPY" => Ok(Self::Copy),
                    "REPLACE" => Ok(Self::Replace),
                    other => Err(S3Error::invalid_input(format!("unknown directive: {other}"))),
                }
            }
        }
    };
}

directive_str!(MetadataDirective);
directive_str!(TaggingDirective);

// ---------------------------------------------------------------------------
// Multipart
// ---------------------------------------------------------------------------

/// A validated part number in `1..=10000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartNumber(u32);

impl PartNumber {
    /// Validate and wrap a part number.
    pub fn new(number: u32) -> S3Result<Self> {
        if number == 0 || number > MAX_PART_NUMBER {
            return Err(S3Error::invalid_input(format!(
                "part number {number} is outside 1..={MAX_PART_NUMBER}"
            )));
        }
        Ok(Self(number))
    }

    /// The raw number.
    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PartNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A part as listed by `ListParts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Part {
    /// 1-based part number.
    pub part_number: u32,
    /// Entity tag of the part.
    pub etag: String,
    /// Size in bytes.
    pub size: Option<u64>,
    /// Upload time.
    pub last_modified: Option<DateTime<Utc>>,
}

/// A (part number, ETag) pair submitted on completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedPart {
    /// 1-based part number.
    pub part_number: u32,
    /// Entity tag returned by `UploadPart` / `UploadPartCopy`.
    pub etag: String,
}

impl From<S3Part> for CompletedPart {
    fn from(part: S3Part) -> Self {
        Self {
            part_number: part.part_number,
            etag: part.etag,
        }
    }
}

/// An in-progress multipart upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3MultipartUpload {
    /// Object key the upload will create.
    pub key: String,
    /// Server-assigned upload id.
    pub upload_id: String,
    /// When the upload was created.
    pub initiated: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Object lock
// ---------------------------------------------------------------------------

/// Object-lock retention strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RetentionMode {
    /// Bypassable by callers holding the bypass permission.
    Governance,
    /// Not bypassable by anyone.
    Compliance,
}

impl RetentionMode {
    /// Wire representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Governance => "GOVERNANCE",
            Self::Compliance => "COMPLIANCE",
        }
    }
}

impl fmt::Display for RetentionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetentionMode {
    type Err = S3Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GOVERNANCE" => Ok(Self::Governance),
            "COMPLIANCE" => Ok(Self::Compliance),
            other => Err(S3Error::invalid_input(format!(
                "unknown retention mode: {other}"
            ))),
        }
    }
}

/// A retention assignment on one object version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Retention {
    /// Retention mode.
    pub mode: RetentionMode,
    /// Instant until which the version is protected.
    pub retain_until: DateTime<Utc>,
}

impl Retention {
    /// Create a retention assignment.
    #[must_use]
    pub fn new(mode: RetentionMode, retain_until: DateTime<Utc>) -> Self {
        Self { mode, retain_until }
    }

    /// Whether the retention still protects the version at `now`.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.retain_until > now
    }
}

/// Per-version lock state: optional retention plus an independent legal hold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectLockProperties {
    /// Retention assignment, if any.
    pub retention: Option<Retention>,
    /// Whether a legal hold is in effect.
    pub legal_hold: bool,
}

/// Bucket-level default retention: a period in days XOR years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DefaultRetention {
    /// Period in days.
    Days {
        /// Mode applied to new versions.
        mode: RetentionMode,
        /// Number of days, at least 1.
        days: u32,
    },
    /// Period in years.
    Years {
        /// Mode applied to new versions.
        mode: RetentionMode,
        /// Number of years, at least 1.
        years: u32,
    },
}

impl DefaultRetention {
    /// A default retention period in days.
    pub fn days(mode: RetentionMode, days: u32) -> S3Result<Self> {
        if days == 0 {
            return Err(S3Error::invalid_input("default retention days must be positive"));
        }
        Ok(Self::Days { mode, days })
    }

    /// A default retention period in years.
    pub fn years(mode: RetentionMode, years: u32) -> S3Result<Self> {
        if years == 0 {
            return Err(S3Error::invalid_input("default retention years must be positive"));
        }
        Ok(Self::Years { mode, years })
    }

    /// Build from the optional `Days`/`Years` pair found on the wire.
    pub fn from_parts(
        mode: RetentionMode,
        days: Option<u32>,
        years: Option<u32>,
    ) -> S3Result<Self> {
        match (days, years) {
            (Some(d), None) => Self::days(mode, d),
            (None, Some(y)) => Self::years(mode, y),
            (Some(_), Some(_)) => Err(S3Error::invalid_input(
                "default retention takes days or years, not both",
            )),
            (None, None) => Err(S3Error::invalid_input(
                "default retention needs days or years",
            )),
        }
    }

    /// The retention mode.
    #[must_use]
    pub fn mode(&self) -> RetentionMode {
        match self {
            Self::Days { mode, .. } | Self::Years { mode, .. } => *mode,
        }
    }

    /// The retain-until instant for a version written at `now`.
    ///
    /// Years are added as calendar months, clamped at month ends.
    pub fn retain_until(&self, now: DateTime<Utc>) -> S3Result<DateTime<Utc>> {
        let until = match self {
            Self::Days { days, .. } => now.checked_add_signed(Duration::days(i64::from(*days))),
            Self::Years { years, .. } => years
                .checked_mul(12)
                .and_then(|months| now.checked_add_months(Months::new(months))),
        };
        until.ok_or_else(|| S3Error::invalid_input("default retention period overflows"))
    }
}

/// Bucket-level object-lock configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectLockConfiguration {
    /// Whether object lock is enabled.
    pub enabled: bool,
    /// Default retention for new versions.
    pub default_retention: Option<DefaultRetention>,
}

impl ObjectLockConfiguration {
    /// Enabled, with no default retention.
    #[must_use]
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            default_retention: None,
        }
    }

    /// Enabled, with a default retention rule.
    #[must_use]
    pub fn with_default(rule: DefaultRetention) -> Self {
        Self {
            enabled: true,
            default_retention: Some(rule),
        }
    }
}

// ---------------------------------------------------------------------------
// Conditions
// ---------------------------------------------------------------------------

/// The ETag-based part of a [`ConditionSpec`]; at most one applies per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EtagCondition {
    /// `If-Match: <etag>`.
    IfMatch(String),
    /// `If-None-Match: <etag>`.
    IfNoneMatch(String),
    /// `If-None-Match: *`, write-only.
    IfNotExists,
    /// `If-Match: *`, write-only.
    MatchAny,
}

/// Preconditions attached to a read, write, copy or delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionSpec {
    /// ETag condition.
    pub etag: Option<EtagCondition>,
    /// `If-Modified-Since`.
    pub if_modified_since: Option<DateTime<Utc>>,
    /// `If-Unmodified-Since`.
    pub if_unmodified_since: Option<DateTime<Utc>>,
}

impl ConditionSpec {
    /// No conditions.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Only `If-Match`.
    #[must_use]
    pub fn if_match(etag: impl Into<String>) -> Self {
        Self {
            etag: Some(EtagCondition::IfMatch(etag.into())),
            ..Self::default()
        }
    }

    /// Only `If-None-Match`.
    #[must_use]
    pub fn if_none_match(etag: impl Into<String>) -> Self {
        Self {
            etag: Some(EtagCondition::IfNoneMatch(etag.into())),
            ..Self::default()
        }
    }

    /// Only `If-None-Match: *`.
    #[must_use]
    pub fn if_not_exists() -> Self {
        Self {
            etag: Some(EtagCondition::IfNotExists),
            ..Self::default()
        }
    }

    /// Only `If-Match: *`.
    #[must_use]
    pub fn match_any() -> Self {
        Self {
            etag: Some(EtagCondition::MatchAny),
            ..Self::default()
        }
    }

    /// Whether no condition is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.etag.is_none() && self.if_modified_since.is_none() && self.if_unmodified_since.is_none()
    }
}

// ---------------------------------------------------------------------------
// Tagging
// ---------------------------------------------------------------------------

/// A single tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    /// Tag key, 1 to 128 characters.
    pub key: String,
    /// Tag value, up to 256 characters.
    pub value: String,
}

/// A validated tag set with unique keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tagging {
    tags: Vec<Tag>,
}

impl Tagging {
    /// Validate and build a tag set of at most [`MAX_BUCKET_TAGS`] tags.
    pub fn new<K, V>(tags: impl IntoIterator<Item = (K, V)>) -> S3Result<Self>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut out: Vec<Tag> = Vec::new();
        for (key, value) in tags {
            let tag = Tag {
                key: key.into(),
                value: value.into(),
            };
            if tag.key.is_empty() || tag.key.chars().count() > 128 {
                return Err(S3Error::invalid_input(format!(
                    "tag key '{}' must be 1 to 128 characters",
                    tag.key
                )));
            }
            if tag.value.chars().count() > 256 {
                return Err(S3Error::invalid_input(format!(
                    "tag value for '{}' exceeds 256 characters",
                    tag.key
                )));
            }
            if out.iter().any(|t| t.key == tag.key) {
                return Err(S3Error::invalid_input(format!("duplicate tag key '{}'", tag.key)));
            }
            out.push(tag);
        }
        if out.len() > MAX_BUCKET_TAGS {
            return Err(S3Error::invalid_input(format!(
                "at most {MAX_BUCKET_TAGS} tags are allowed"
            )));
        }
        Ok(Self { tags: out })
    }

    /// The tags in insertion order.
    #[must_use]
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Number of tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Look up a tag value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }

    /// Encode as the `x-amz-tagging` header value.
    #[must_use]
    pub fn to_header_value(&self) -> String {
        self.tags
            .iter()
            .map(|t| format!("{}={}", encode_tag_component(&t.key), encode_tag_component(&t.value)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

fn encode_tag_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
            out.push(char::from(b));
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

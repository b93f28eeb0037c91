//! Per-operation option structs.
//!
//! Every struct enumerates the fields the operation understands and has a
//! `Default`. Field-level invariants are checked by `validate`, which the
//! client runs before issuing any request.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::error::{S3Error, S3Result};
use crate::types::{
    ByteRange, ConditionSpec, MetadataDirective, Retention, ServerSideEncryption, Tagging,
    TaggingDirective, MAX_OBJECT_TAGS,
};

/// Largest page size a list call may request.
pub const MAX_PAGE_SIZE: u32 = 1000;

fn validate_page_size(name: &str, value: Option<u32>) -> S3Result<()> {
    match value {
        Some(0) => Err(S3Error::invalid_input(format!("{name} must be positive"))),
        Some(v) if v > MAX_PAGE_SIZE => Err(S3Error::invalid_input(format!(
            "{name} must not exceed {MAX_PAGE_SIZE}"
        ))),
        _ => Ok(()),
    }
}

fn validate_user_metadata(metadata: &BTreeMap<String, String>) -> S3Result<()> {
    for key in metadata.keys() {
        if key.is_empty()
            || !key
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
        {
            return Err(S3Error::invalid_input(format!(
                "user metadata key '{key}' is not a valid header token"
            )));
        }
    }
    Ok(())
}

fn validate_object_tags(tags: Option<&Tagging>) -> S3Result<()> {
    if tags.is_some_and(|t| t.len() > MAX_OBJECT_TAGS) {
        return Err(S3Error::invalid_input(format!(
            "objects carry at most {MAX_OBJECT_TAGS} tags"
        )));
    }
    Ok(())
}

fn validate_retention(retention: Option<&Retention>, now: DateTime<Utc>) -> S3Result<()> {
    if retention.is_some_and(|r| r.retain_until <= now) {
        return Err(S3Error::invalid_input(
            "retain-until date must be in the future",
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Buckets
// ---------------------------------------------------------------------------

/// Options for `CreateBucket`.
#[derive(Debug, Clone, Default)]
pub struct CreateBucketOptions {
    /// Location constraint; defaults to the client region.
    pub region: Option<String>,
    /// Enable object lock (implies versioning).
    pub object_lock_enabled: bool,
}

/// Options for `ListBuckets`.
#[derive(Debug, Clone, Default)]
pub struct ListBucketsOptions {
    /// Only buckets whose name starts with this prefix.
    pub prefix: Option<String>,
    /// Page size.
    pub max_buckets: Option<u32>,
    /// Cursor from the previous page.
    pub continuation_token: Option<String>,
}

impl ListBucketsOptions {
    /// Check field invariants.
    pub fn validate(&self) -> S3Result<()> {
        validate_page_size("max-buckets", self.max_buckets)
    }
}

// ---------------------------------------------------------------------------
// Objects
// ---------------------------------------------------------------------------

/// Options for `PutObject` and the automatic multipart flow.
#[derive(Debug, Clone, Default)]
pub struct PutObjectOptions {
    /// `Content-Type`.
    pub content_type: Option<String>,
    /// `Cache-Control`.
    pub cache_control: Option<String>,
    /// `Content-Disposition`.
    pub content_disposition: Option<String>,
    /// `Content-Encoding`.
    pub content_encoding: Option<String>,
    /// `Content-Language`.
    pub content_language: Option<String>,
    /// `Expires`.
    pub expires: Option<DateTime<Utc>>,
    /// User metadata, sent as `x-amz-meta-<key>`.
    pub user_metadata: BTreeMap<String, String>,
    /// Tags, sent as `x-amz-tagging`.
    pub tags: Option<Tagging>,
    /// `x-amz-storage-class`.
    pub storage_class: Option<String>,
    /// Server-side encryption.
    pub sse: Option<ServerSideEncryption>,
    /// Initial retention.
    pub retention: Option<Retention>,
    /// Initial legal hold.
    pub legal_hold: Option<bool>,
    /// Write preconditions.
    pub conditions: ConditionSpec,
}

impl PutObjectOptions {
    /// Check field invariants against `now`.
    pub fn validate(&self, now: DateTime<Utc>) -> S3Result<()> {
        validate_user_metadata(&self.user_metadata)?;
        validate_object_tags(self.tags.as_ref())?;
        validate_retention(self.retention.as_ref(), now)
    }
}

/// Options for `GetObject`, `HeadObject` and downloads.
#[derive(Debug, Clone, Default)]
pub struct GetObjectOptions {
    /// A specific version.
    pub version_id: Option<String>,
    /// Partial read.
    pub range: Option<ByteRange>,
    /// Read preconditions.
    pub conditions: ConditionSpec,
}

/// Options for `DeleteObject`.
#[derive(Debug, Clone, Default)]
pub struct DeleteObjectOptions {
    /// Delete this version permanently instead of adding a delete marker.
    pub version_id: Option<String>,
    /// `x-amz-bypass-governance-retention: true`.
    pub bypass_governance: bool,
    /// Delete preconditions (`If-Match` only).
    pub conditions: ConditionSpec,
}

/// One entry of a batch delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectIdentifier {
    /// Object key.
    pub key: String,
    /// Version to delete.
    pub version_id: Option<String>,
    /// Delete only if the current ETag matches.
    pub etag: Option<String>,
}

impl ObjectIdentifier {
    /// Identify the current version of a key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            version_id: None,
            etag: None,
        }
    }

    /// Identify a specific version.
    #[must_use]
    pub fn version(key: impl Into<String>, version_id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            version_id: Some(version_id.into()),
            etag: None,
        }
    }

    /// Identify a key, deleting only if its ETag matches.
    #[must_use]
    pub fn with_etag(key: impl Into<String>, etag: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            version_id: None,
            etag: Some(etag.into()),
        }
    }
}

/// Options for `DeleteObjects`.
#[derive(Debug, Clone, Default)]
pub struct DeleteObjectsOptions {
    /// Only report errors.
    pub quiet: bool,
    /// `x-amz-bypass-governance-retention: true`.
    pub bypass_governance: bool,
}

/// Request body of `DeleteObjects`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteRequest {
    /// Entries to delete.
    pub objects: Vec<ObjectIdentifier>,
    /// Only report errors.
    pub quiet: bool,
}

/// The source of a copy.
#[derive(Debug, Clone)]
pub struct CopySource {
    /// Source bucket.
    pub bucket: String,
    /// Source key.
    pub key: String,
    /// Source version.
    pub version_id: Option<String>,
    /// Byte range; only valid for part copies.
    pub range: Option<ByteRange>,
    /// `x-amz-copy-source-if-*` preconditions.
    pub conditions: ConditionSpec,
}

impl CopySource {
    /// The current version of `bucket/key`.
    #[must_use]
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            version_id: None,
            range: None,
            conditions: ConditionSpec::default(),
        }
    }
}

/// Options for `CopyObject`.
#[derive(Debug, Clone, Default)]
pub struct CopyObjectOptions {
    /// Metadata handling; `REPLACE` takes the fields below.
    pub metadata_directive: Option<MetadataDirective>,
    /// `Content-Type` for `REPLACE`.
    pub content_type: Option<String>,
    /// User metadata for `REPLACE`.
    pub user_metadata: BTreeMap<String, String>,
    /// Tag handling; `REPLACE` takes `tags`.
    pub tagging_directive: Option<TaggingDirective>,
    /// Tags for `REPLACE`.
    pub tags: Option<Tagging>,
    /// `x-amz-storage-class`.
    pub storage_class: Option<String>,
    /// Server-side encryption of the target.
    pub sse: Option<ServerSideEncryption>,
    /// Retention of the target.
    pub retention: Option<Retention>,
    /// Legal hold of the target.
    pub legal_hold: Option<bool>,
    /// Target (write) preconditions.
    pub conditions: ConditionSpec,
}

impl CopyObjectOptions {
    /// Check field invariants against `now`.
    pub fn validate(&self, now: DateTime<Utc>) -> S3Result<()> {
        validate_user_metadata(&self.user_metadata)?;
        validate_object_tags(self.tags.as_ref())?;
        validate_retention(self.retention.as_ref(), now)?;
        let replacing_metadata = self.metadata_directive == Some(MetadataDirective::Replace);
        if !replacing_metadata && (self.content_type.is_some() || !self.user_metadata.is_empty()) {
            return Err(S3Error::invalid_input(
                "metadata fields require the REPLACE metadata directive",
            ));
        }
        if self.tags.is_some() && self.tagging_directive != Some(TaggingDirective::Replace) {
            return Err(S3Error::invalid_input(
                "tags require the REPLACE tagging directive",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// Options for `ListObjectsV2`.
#[derive(Debug, Clone, Default)]
pub struct ListObjectsOptions {
    /// Key prefix.
    pub prefix: Option<String>,
    /// Grouping delimiter.
    pub delimiter: Option<String>,
    /// Start listing after this key.
    pub start_after: Option<String>,
    /// Page size.
    pub max_keys: Option<u32>,
    /// Cursor from the previous page.
    pub continuation_token: Option<String>,
}

impl ListObjectsOptions {
    /// Check field invariants.
    pub fn validate(&self) -> S3Result<()> {
        validate_page_size("max-keys", self.max_keys)
    }
}

/// Options for `ListObjectVersions`.
#[derive(Debug, Clone, Default)]
pub struct ListVersionsOptions {
    /// Key prefix.
    pub prefix: Option<String>,
    /// Grouping delimiter.
    pub delimiter: Option<String>,
    /// Page size.
    pub max_keys: Option<u32>,
    /// Key half of the cursor.
    pub key_marker: Option<String>,
    /// Version half of the cursor.
    pub version_id_marker: Option<String>,
}

impl ListVersionsOptions {
    /// Check field invariants.
    pub fn validate(&self) -> S3Result<()> {
        validate_page_size("max-keys", self.max_keys)?;
        if self.version_id_marker.is_some() && self.key_marker.is_none() {
            return Err(S3Error::invalid_input(
                "version-id-marker requires key-marker",
            ));
        }
        Ok(())
    }
}

/// Options for `ListMultipartUploads`.
#[derive(Debug, Clone, Default)]
pub struct ListUploadsOptions {
    /// Key prefix.
    pub prefix: Option<String>,
    /// Grouping delimiter.
    pub delimiter: Option<String>,
    /// Page size.
    pub max_uploads: Option<u32>,
    /// Key half of the cursor.
    pub key_marker: Option<String>,
    /// Upload-id half of the cursor.
    pub upload_id_marker: Option<String>,
}

impl ListUploadsOptions {
    /// Check field invariants.
    pub fn validate(&self) -> S3Result<()> {
        validate_page_size("max-uploads", self.max_uploads)?;
        if self.upload_id_marker.is_some() && self.key_marker.is_none() {
            return Err(S3Error::invalid_input(
                "upload-id-marker requires key-marker",
            ));
        }
        Ok(())
    }
}

/// Options for `ListParts`.
#[derive(Debug, Clone, Default)]
pub struct ListPartsOptions {
    /// Page size.
    pub max_parts: Option<u32>,
    /// List parts after this number.
    pub part_number_marker: Option<u32>,
}

impl ListPartsOptions {
    /// Check field invariants.
    pub fn validate(&self) -> S3Result<()> {
        validate_page_size("max-parts", self.max_parts)
    }
}

//! Per-operation results and the list-result shapes exchanged on the wire.

use chrono::{DateTime, Utc};

use crate::types::{Bucket, S3MultipartUpload, S3Object, S3ObjectVersion, S3Part};

/// Result of `PutObject` (single PUT or automatic multipart).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObjectOutput {
    /// ETag of the new object.
    pub etag: String,
    /// Version id, on versioned buckets.
    pub version_id: Option<String>,
    /// Number of parts when the upload went multipart.
    pub parts: Option<u32>,
}

/// Result of `CopyObject`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyObjectOutput {
    /// ETag of the new object.
    pub etag: String,
    /// Last-modified of the new object.
    pub last_modified: DateTime<Utc>,
    /// Version id of the new object.
    pub version_id: Option<String>,
    /// Version id of the source that was copied.
    pub copy_source_version_id: Option<String>,
}

/// Result of `UploadPartCopy`, and the `CopyObjectResult` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyPartResult {
    /// ETag of the copied data.
    pub etag: String,
    /// Last-modified of the copied data.
    pub last_modified: DateTime<Utc>,
}

/// Result of `DeleteObject`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteObjectOutput {
    /// Whether a delete marker was created or removed.
    pub delete_marker: bool,
    /// Version id of the delete marker or removed version.
    pub version_id: Option<String>,
}

/// A successful entry of a batch delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletedObject {
    /// Object key.
    pub key: String,
    /// Version that was removed.
    pub version_id: Option<String>,
    /// Whether a delete marker was involved.
    pub delete_marker: bool,
    /// Version id of the created delete marker.
    pub delete_marker_version_id: Option<String>,
}

/// A failed entry of a batch delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteError {
    /// Object key.
    pub key: String,
    /// Version that could not be removed.
    pub version_id: Option<String>,
    /// Vendor error code.
    pub code: String,
    /// Vendor message.
    pub message: String,
}

/// Result of `DeleteObjects`; partial failure is reported here, not raised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteObjectsBatchResult {
    /// Entries that were deleted.
    pub deleted: Vec<DeletedObject>,
    /// Entries that failed.
    pub errors: Vec<DeleteError>,
}

impl DeleteObjectsBatchResult {
    /// True when no entry failed.
    #[must_use]
    pub fn successful(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Result of `CreateMultipartUpload`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateMultipartUploadOutput {
    /// Bucket name.
    pub bucket: String,
    /// Object key.
    pub key: String,
    /// Server-assigned upload id.
    pub upload_id: String,
}

/// Result of `CompleteMultipartUpload`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompleteMultipartUploadOutput {
    /// Location URL.
    pub location: Option<String>,
    /// Bucket name.
    pub bucket: String,
    /// Object key.
    pub key: String,
    /// Composite ETag.
    pub etag: String,
    /// Version id, on versioned buckets.
    pub version_id: Option<String>,
}

/// `ListAllMyBucketsResult`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListBucketsOutput {
    /// Buckets on this page.
    pub buckets: Vec<Bucket>,
    /// Prefix echoed by the server.
    pub prefix: Option<String>,
    /// Cursor for the next page; absent on the last page.
    pub continuation_token: Option<String>,
}

/// `ListBucketResult` (ListObjectsV2).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListObjectsV2Output {
    /// Bucket name.
    pub name: String,
    /// Prefix echoed by the server.
    pub prefix: Option<String>,
    /// Delimiter echoed by the server.
    pub delimiter: Option<String>,
    /// Start-after echoed by the server.
    pub start_after: Option<String>,
    /// Page size echoed by the server.
    pub max_keys: u32,
    /// Number of keys and prefixes on this page.
    pub key_count: u32,
    /// Whether more pages follow.
    pub is_truncated: bool,
    /// Token this page was fetched with.
    pub continuation_token: Option<String>,
    /// Token for the next page.
    pub next_continuation_token: Option<String>,
    /// Objects on this page.
    pub contents: Vec<S3Object>,
    /// Grouped prefixes on this page.
    pub common_prefixes: Vec<String>,
}

/// `ListVersionsResult`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListObjectVersionsOutput {
    /// Bucket name.
    pub name: String,
    /// Prefix echoed by the server.
    pub prefix: Option<String>,
    /// Delimiter echoed by the server.
    pub delimiter: Option<String>,
    /// Page size echoed by the server.
    pub max_keys: u32,
    /// Whether more pages follow.
    pub is_truncated: bool,
    /// Key marker this page was fetched with.
    pub key_marker: Option<String>,
    /// Version marker this page was fetched with.
    pub version_id_marker: Option<String>,
    /// Key half of the next cursor.
    pub next_key_marker: Option<String>,
    /// Version half of the next cursor.
    pub next_version_id_marker: Option<String>,
    /// Versions and delete markers in server order.
    pub versions: Vec<S3ObjectVersion>,
    /// Grouped prefixes on this page.
    pub common_prefixes: Vec<String>,
}

/// `ListMultipartUploadsResult`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListMultipartUploadsOutput {
    /// Bucket name.
    pub bucket: String,
    /// Prefix echoed by the server.
    pub prefix: Option<String>,
    /// Delimiter echoed by the server.
    pub delimiter: Option<String>,
    /// Page size echoed by the server.
    pub max_uploads: u32,
    /// Whether more pages follow.
    pub is_truncated: bool,
    /// Key marker this page was fetched with.
    pub key_marker: Option<String>,
    /// Upload-id marker this page was fetched with.
    pub upload_id_marker: Option<String>,
    /// Key half of the next cursor.
    pub next_key_marker: Option<String>,
    /// Upload-id half of the next cursor.
    pub next_upload_id_marker: Option<String>,
    /// Uploads in server order.
    pub uploads: Vec<S3MultipartUpload>,
    /// Grouped prefixes on this page.
    pub common_prefixes: Vec<String>,
}

/// `ListPartsResult`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPartsOutput {
    /// Bucket name.
    pub bucket: String,
    /// Object key.
    pub key: String,
    /// Upload id.
    pub upload_id: String,
    /// Page size echoed by the server.
    pub max_parts: u32,
    /// Whether more pages follow.
    pub is_truncated: bool,
    /// Marker this page was fetched with.
    pub part_number_marker: Option<u32>,
    /// Marker for the next page.
    pub next_part_number_marker: Option<u32>,
    /// Parts in ascending part-number order.
    pub parts: Vec<S3Part>,
}

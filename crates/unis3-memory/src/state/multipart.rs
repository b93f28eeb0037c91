//! In-progress multipart uploads.
//!
//! Each [`MultipartUpload`] captures the settings given at creation time and
//! accumulates [`UploadPart`] entries keyed by part number.

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use unis3_model::types::{
    ObjectMetadata, Retention, S3MultipartUpload, S3Part, ServerSideEncryption, Tagging,
};

/// An uploaded part.
#[derive(Debug, Clone)]
pub struct UploadPart {
    /// 1-based part number.
    pub part_number: u32,
    /// Quoted MD5 ETag of the part.
    pub etag: String,
    /// Part payload.
    pub data: Bytes,
    /// Upload time.
    pub last_modified: DateTime<Utc>,
}

impl UploadPart {
    /// The listing form of this part.
    #[must_use]
    pub fn to_s3_part(&self) -> S3Part {
        S3Part {
            part_number: self.part_number,
            etag: self.etag.clone(),
            size: Some(self.data.len() as u64),
            last_modified: Some(self.last_modified),
        }
    }
}

/// An upload between create and complete/abort.
#[derive(Debug, Clone)]
pub struct MultipartUpload {
    /// Upload id.
    pub upload_id: String,
    /// Target key.
    pub key: String,
    /// Creation time.
    pub initiated: DateTime<Utc>,
    /// Metadata applied to the final object.
    pub metadata: ObjectMetadata,
    /// Storage class of the final object.
    pub storage_class: Option<String>,
    /// Encryption of the final object.
    pub sse: Option<ServerSideEncryption>,
    /// Tags of the final object.
    pub tags: Tagging,
    /// Explicit retention requested at creation.
    pub retention: Option<Retention>,
    /// Legal hold requested at creation.
    pub legal_hold: bool,
    /// Parts received so far.
    pub parts: BTreeMap<u32, UploadPart>,
}

impl MultipartUpload {
    /// The listing form of this upload.
    #[must_use]
    pub fn to_s3_upload(&self) -> S3MultipartUpload {
        S3MultipartUpload {
            key: self.key.clone(),
            upload_id: self.upload_id.clone(),
            initiated: self.initiated,
        }
    }
}

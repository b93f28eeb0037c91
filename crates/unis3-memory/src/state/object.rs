//! Stored object versions and delete markers.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use unis3_core::ObjectState;
use unis3_model::types::{
    ObjectLockProperties, ObjectMetadata, S3Object, S3ObjectVersion, ServerSideEncryption,
    Tagging,
};

/// The stored version id used for the null version.
pub type VersionId = Option<String>;

/// One stored object version with its payload.
#[derive(Debug, Clone)]
pub struct StoredObject {
    /// Object key.
    pub key: String,
    /// Version id; `None` is the null version.
    pub version_id: VersionId,
    /// Payload.
    pub data: Bytes,
    /// Quoted ETag.
    pub etag: String,
    /// Write time.
    pub last_modified: DateTime<Utc>,
    /// Standard and user metadata.
    pub metadata: ObjectMetadata,
    /// Storage class, when one was requested.
    pub storage_class: Option<String>,
    /// Server-side encryption applied at write time.
    pub sse: Option<ServerSideEncryption>,
    /// Object tags.
    pub tags: Tagging,
    /// Retention and legal hold.
    pub lock: ObjectLockProperties,
    /// Number of parts for multipart objects.
    pub parts_count: Option<u32>,
}

impl StoredObject {
    /// Payload size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// The state conditions are evaluated against.
    #[must_use]
    pub fn condition_state(&self) -> ObjectState<'_> {
        ObjectState {
            etag: &self.etag,
            last_modified: self.last_modified,
        }
    }

    /// The listing form of this version.
    #[must_use]
    pub fn to_s3_object(&self) -> S3Object {
        S3Object {
            key: self.key.clone(),
            version_id: self.version_id.clone(),
            size: self.size(),
            etag: self.etag.clone(),
            last_modified: self.last_modified,
            storage_class: Some(
                self.storage_class
                    .clone()
                    .unwrap_or_else(|| "STANDARD".to_owned()),
            ),
            metadata: None,
            tag_count: None,
            parts_count: None,
            sse: None,
            lock: None,
        }
    }
}

/// A delete marker: a version with no payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteMarker {
    /// Object key.
    pub key: String,
    /// Version id; `None` is the null version.
    pub version_id: VersionId,
    /// Deletion time.
    pub last_modified: DateTime<Utc>,
}

/// An entry in a key's version stack.
#[derive(Debug, Clone)]
pub enum ObjectVersion {
    /// A regular version.
    Object(StoredObject),
    /// A delete marker.
    DeleteMarker(DeleteMarker),
}

impl ObjectVersion {
    /// The version id; `None` is the null version.
    #[must_use]
    pub fn version_id(&self) -> Option<&str> {
        match self {
            Self::Object(o) => o.version_id.as_deref(),
            Self::DeleteMarker(m) => m.version_id.as_deref(),
        }
    }

    /// Whether this is a delete marker.
    #[must_use]
    pub fn is_delete_marker(&self) -> bool {
        matches!(self, Self::DeleteMarker(_))
    }

    /// The object, unless this is a delete marker.
    #[must_use]
    pub fn as_object(&self) -> Option<&StoredObject> {
        match self {
            Self::Object(o) => Some(o),
            Self::DeleteMarker(_) => None,
        }
    }

    /// Mutable access to the object, unless this is a delete marker.
    pub fn as_object_mut(&mut self) -> Option<&mut StoredObject> {
        match self {
            Self::Object(o) => Some(o),
            Self::DeleteMarker(_) => None,
        }
    }

    /// The version listing entry, with the null version spelled `null_id`.
    #[must_use]
    pub fn to_s3_version(&self, is_latest: bool, null_id: &str) -> S3ObjectVersion {
        let version_id = self.version_id().unwrap_or(null_id).to_owned();
        match self {
            Self::Object(o) => S3ObjectVersion {
                key: o.key.clone(),
                version_id,
                is_latest,
                size: o.size(),
                last_modified: o.last_modified,
                etag: Some(o.etag.clone()),
                storage_class: Some(
                    o.storage_class
                        .clone()
                        .unwrap_or_else(|| "STANDARD".to_owned()),
                ),
                delete_marker: false,
            },
            Self::DeleteMarker(m) => S3ObjectVersion {
                key: m.key.clone(),
                version_id,
                is_latest,
                size: 0,
                last_modified: m.last_modified,
                etag: None,
                storage_class: None,
                delete_marker: true,
            },
        }
    }
}

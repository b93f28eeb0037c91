//! Per-bucket state.
//!
//! Configuration fields and the object store sit behind
//! `parking_lot::RwLock`; multipart uploads live in a `DashMap` keyed by
//! upload id.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;
use unis3_model::types::{
    ObjectLockConfiguration, PublicAccessBlockConfiguration, Tagging, VersioningStatus,
};

use super::keystore::ObjectStore;
use super::multipart::MultipartUpload;

/// A bucket with all its state.
pub struct MemoryBucket {
    /// Bucket name.
    pub name: String,
    /// Region given at creation.
    pub region: Option<String>,
    /// Creation time.
    pub creation_date: DateTime<Utc>,
    /// Object versions.
    pub objects: RwLock<ObjectStore>,
    /// In-progress multipart uploads, keyed by upload id.
    pub multipart_uploads: DashMap<String, MultipartUpload>,
    /// Versioning status; `None` until first configured.
    pub versioning: RwLock<Option<VersioningStatus>>,
    /// Bucket tags.
    pub tags: RwLock<Option<Tagging>>,
    /// Bucket policy document.
    pub policy: RwLock<Option<String>>,
    /// Public access block.
    pub public_access_block: RwLock<Option<PublicAccessBlockConfiguration>>,
    /// Object lock configuration; `None` unless created with lock enabled.
    pub object_lock: RwLock<Option<ObjectLockConfiguration>>,
}

impl std::fmt::Debug for MemoryBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBucket")
            .field("name", &self.name)
            .field("region", &self.region)
            .field("creation_date", &self.creation_date)
            .field("versioning", &*self.versioning.read())
            .finish_non_exhaustive()
    }
}

impl MemoryBucket {
    /// Create an empty bucket. Object lock implies versioning.
    #[must_use]
    pub fn new(
        name: String,
        region: Option<String>,
        object_lock_enabled: bool,
        now: DateTime<Utc>,
    ) -> Self {
        let (versioning, object_lock) = if object_lock_enabled {
            (
                Some(VersioningStatus::Enabled),
                Some(ObjectLockConfiguration::enabled()),
            )
        } else {
            (None, None)
        };
        Self {
            name,
            region,
            creation_date: now,
            objects: RwLock::new(ObjectStore::default()),
            multipart_uploads: DashMap::new(),
            versioning: RwLock::new(versioning),
            tags: RwLock::new(None),
            policy: RwLock::new(None),
            public_access_block: RwLock::new(None),
            object_lock: RwLock::new(object_lock),
        }
    }

    /// Whether the bucket holds no versions and no in-progress uploads.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty() && self.multipart_uploads.is_empty()
    }

    /// Whether object lock is enabled.
    #[must_use]
    pub fn is_lock_enabled(&self) -> bool {
        self.object_lock.read().is_some_and(|c| c.enabled)
    }

    /// Current versioning status.
    #[must_use]
    pub fn versioning(&self) -> Option<VersioningStatus> {
        *self.versioning.read()
    }

    /// Change the versioning status. Existing versions are kept.
    pub fn set_versioning(&self, status: VersioningStatus) {
        let mut current = self.versioning.write();
        if *current != Some(status) {
            debug!(bucket = %self.name, status = status.as_str(), "versioning changed");
            *current = Some(status);
        }
    }
}

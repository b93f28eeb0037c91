//! Top-level server state: the bucket table.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::info;
use unis3_model::{ErrorKind, S3Error, S3Result};

use super::bucket::MemoryBucket;

/// All buckets, keyed by name.
///
/// Buckets are handed out as `Arc`s; no map guard is held while an
/// operation runs.
#[derive(Default)]
pub struct MemoryState {
    buckets: DashMap<String, Arc<MemoryBucket>>,
}

impl std::fmt::Debug for MemoryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryState")
            .field("bucket_count", &self.buckets.len())
            .finish_non_exhaustive()
    }
}

impl MemoryState {
    /// Create a bucket.
    ///
    /// # Errors
    ///
    /// Returns `BucketAlreadyExists` if the name is taken.
    pub fn create_bucket(
        &self,
        name: &str,
        region: Option<String>,
        object_lock_enabled: bool,
        now: DateTime<Utc>,
    ) -> S3Result<()> {
        match self.buckets.entry(name.to_owned()) {
            Entry::Occupied(_) => Err(S3Error::new(ErrorKind::BucketAlreadyExists)),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(MemoryBucket::new(
                    name.to_owned(),
                    region,
                    object_lock_enabled,
                    now,
                )));
                info!(bucket = %name, object_lock_enabled, "bucket created");
                Ok(())
            }
        }
    }

    /// Delete an empty bucket.
    ///
    /// # Errors
    ///
    /// Returns `BucketNotFound` or `BucketNotEmpty`.
    pub fn delete_bucket(&self, name: &str) -> S3Result<()> {
        let bucket = self.bucket(name)?;
        if !bucket.is_empty() {
            return Err(S3Error::new(ErrorKind::BucketNotEmpty));
        }
        self.buckets.remove(name);
        info!(bucket = %name, "bucket deleted");
        Ok(())
    }

    /// Look up a bucket.
    ///
    /// # Errors
    ///
    /// Returns `BucketNotFound` if it does not exist.
    pub fn bucket(&self, name: &str) -> S3Result<Arc<MemoryBucket>> {
        self.buckets
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| S3Error::new(ErrorKind::BucketNotFound))
    }

    /// All buckets sorted by name.
    #[must_use]
    pub fn list_buckets(&self) -> Vec<Arc<MemoryBucket>> {
        let mut buckets: Vec<_> = self
            .buckets
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        buckets
    }
}

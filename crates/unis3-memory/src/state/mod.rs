//! In-memory server state.
//!
//! - [`MemoryState`]: the bucket table.
//! - [`MemoryBucket`]: per-bucket configuration, objects and uploads.
//! - [`ObjectStore`]: sorted key storage with version stacks.
//! - [`StoredObject`] / [`DeleteMarker`]: stored versions.
//! - [`MultipartUpload`] / [`UploadPart`]: in-progress uploads.
//!
//! All types are `Send + Sync`: `DashMap` guards the bucket and upload
//! tables, `parking_lot::RwLock` guards everything else.

pub(crate) mod bucket;
pub(crate) mod keystore;
pub(crate) mod multipart;
pub(crate) mod object;
pub(crate) mod service;

pub use bucket::MemoryBucket;
pub use keystore::{
    DeleteOutcome, Entry, ObjectPage, ObjectStore, VersionMarker, VersionPage, common_prefix,
    covered_by_marker, generate_version_id, group_entries,
};
pub use multipart::{MultipartUpload, UploadPart};
pub use object::{DeleteMarker, ObjectVersion, StoredObject};
pub use service::MemoryState;

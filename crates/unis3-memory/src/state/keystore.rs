//! Object key storage with versioning support.
//!
//! [`ObjectStore`] keeps every key's versions newest first in a `BTreeMap`,
//! so keys are always sorted for listing. How a write or a version-less
//! delete changes the stack depends on the bucket's versioning state:
//!
//! | State        | Put                          | Delete                       |
//! |--------------|------------------------------|------------------------------|
//! | never set    | replaces the only version    | removes the key              |
//! | `Enabled`    | pushes a new version         | pushes a delete marker       |
//! | `Suspended`  | replaces the null version    | replaces the null version with a marker |

use std::collections::BTreeMap;
use std::ops::Bound;

use chrono::{DateTime, Utc};
use tracing::debug;
use unis3_model::types::VersioningStatus;
use uuid::Uuid;

use super::object::{DeleteMarker, ObjectVersion, StoredObject};

// ---------------------------------------------------------------------------
// Listing helpers
// ---------------------------------------------------------------------------

/// One entry of a delimited listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry<T> {
    /// An item.
    Item(T),
    /// A rolled-up common prefix.
    Prefix(String),
}

/// The prefix `key` rolls up into, if `delimiter` occurs after `prefix`.
#[must_use]
pub fn common_prefix(key: &str, prefix: &str, delimiter: Option<&str>) -> Option<String> {
    let delimiter = delimiter.filter(|d| !d.is_empty())?;
    let rest = key.strip_prefix(prefix)?;
    rest.find(delimiter)
        .map(|pos| format!("{prefix}{}", &rest[..pos + delimiter.len()]))
}

/// Group keyed items into entries, stopping once `limit + 1` entries exist.
///
/// Items must arrive sorted by key. Items whose key does not start with
/// `prefix` are skipped.
pub fn group_entries<'a, T>(
    items: impl IntoIterator<Item = (&'a str, T)>,
    prefix: &str,
    delimiter: Option<&str>,
    limit: usize,
) -> Vec<Entry<T>> {
    let mut out: Vec<Entry<T>> = Vec::new();
    for (key, item) in items {
        if !key.starts_with(prefix) {
            continue;
        }
        match common_prefix(key, prefix, delimiter) {
            Some(cp) => {
                if matches!(out.last(), Some(Entry::Prefix(last)) if *last == cp) {
                    continue;
                }
                out.push(Entry::Prefix(cp));
            }
            None => out.push(Entry::Item(item)),
        }
        if out.len() > limit {
            break;
        }
    }
    out
}

/// Whether `key` lies at or before a resume marker.
///
/// A marker ending in the delimiter is a common prefix returned earlier;
/// every key under it was already covered.
#[must_use]
pub fn covered_by_marker(key: &str, marker: &str, delimiter: Option<&str>) -> bool {
    key <= marker
        || delimiter
            .filter(|d| !d.is_empty() && marker.ends_with(*d))
            .is_some_and(|_| key.starts_with(marker))
}

/// A page of current objects.
#[derive(Debug, Clone, Default)]
pub struct ObjectPage {
    /// Objects in key order.
    pub objects: Vec<StoredObject>,
    /// Common prefixes in key order.
    pub common_prefixes: Vec<String>,
    /// Where the next page starts; `None` on the last page.
    pub next_marker: Option<String>,
}

/// A page of versions.
#[derive(Debug, Clone, Default)]
pub struct VersionPage {
    /// `(version, is_latest)` pairs, keys ascending, versions newest first.
    pub versions: Vec<(ObjectVersion, bool)>,
    /// Common prefixes in key order.
    pub common_prefixes: Vec<String>,
    /// Key to resume after; `None` on the last page.
    pub next_key_marker: Option<String>,
    /// Version to resume after within `next_key_marker`; `None` means the
    /// whole key (or prefix) was covered, `Some(None)` is the null version.
    pub next_version_id_marker: Option<Option<String>>,
}

/// Where a versions listing resumes.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionMarker<'a> {
    /// Key marker.
    pub key: Option<&'a str>,
    /// Version marker within `key`; `Some(None)` is the null version.
    pub version: Option<Option<&'a str>>,
}

// ---------------------------------------------------------------------------
// ObjectStore
// ---------------------------------------------------------------------------

/// Sorted key storage holding each key's versions newest first.
#[derive(Debug, Default)]
pub struct ObjectStore {
    entries: BTreeMap<String, Vec<ObjectVersion>>,
}

/// What a version-less delete did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// Whether a delete marker was created.
    pub delete_marker: bool,
    /// The version id of the marker; `None` is the null version.
    pub version_id: Option<String>,
}

impl ObjectStore {
    /// Whether no key has any version left.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The newest version of `key`, delete markers included.
    #[must_use]
    pub fn latest(&self, key: &str) -> Option<&ObjectVersion> {
        self.entries.get(key).and_then(|versions| versions.first())
    }

    /// The current object for `key`; `None` if absent or deleted.
    #[must_use]
    pub fn current(&self, key: &str) -> Option<&StoredObject> {
        self.latest(key).and_then(ObjectVersion::as_object)
    }

    /// A specific version; `version_id = None` selects the null version.
    #[must_use]
    pub fn version(&self, key: &str, version_id: Option<&str>) -> Option<&ObjectVersion> {
        self.entries
            .get(key)?
            .iter()
            .find(|v| v.version_id() == version_id)
    }

    /// Mutable access to a specific version.
    pub fn version_mut(
        &mut self,
        key: &str,
        version_id: Option<&str>,
    ) -> Option<&mut ObjectVersion> {
        self.entries
            .get_mut(key)?
            .iter_mut()
            .find(|v| v.version_id() == version_id)
    }

    /// Mutable access to the current object.
    pub fn current_mut(&mut self, key: &str) -> Option<&mut StoredObject> {
        self.entries
            .get_mut(key)
            .and_then(|versions| versions.first_mut())
            .and_then(ObjectVersion::as_object_mut)
    }

    /// Store `object` as the newest version and return its version id.
    pub fn put(
        &mut self,
        mut object: StoredObject,
        versioning: Option<VersioningStatus>,
    ) -> Option<String> {
        let key = object.key.clone();
        object.version_id = match versioning {
            Some(VersioningStatus::Enabled) => Some(generate_version_id()),
            _ => None,
        };
        let version_id = object.version_id.clone();
        self.push(key, ObjectVersion::Object(object), versioning);
        version_id
    }

    /// Delete `key` without a version id.
    pub fn delete_current(
        &mut self,
        key: &str,
        versioning: Option<VersioningStatus>,
        now: DateTime<Utc>,
    ) -> DeleteOutcome {
        let version_id = match versioning {
            None => {
                self.entries.remove(key);
                return DeleteOutcome::default();
            }
            Some(VersioningStatus::Enabled) => Some(generate_version_id()),
            Some(VersioningStatus::Suspended) => None,
        };
        let marker = DeleteMarker {
            key: key.to_owned(),
            version_id: version_id.clone(),
            last_modified: now,
        };
        self.push(key.to_owned(), ObjectVersion::DeleteMarker(marker), versioning);
        debug!(key, version_id = ?version_id, "inserted delete marker");
        DeleteOutcome {
            delete_marker: true,
            version_id,
        }
    }

    /// Permanently remove one version.
    pub fn remove_version(&mut self, key: &str, version_id: Option<&str>) -> Option<ObjectVersion> {
        let versions = self.entries.get_mut(key)?;
        let pos = versions.iter().position(|v| v.version_id() == version_id)?;
        let removed = versions.remove(pos);
        if versions.is_empty() {
            self.entries.remove(key);
        }
        Some(removed)
    }

    fn push(&mut self, key: String, version: ObjectVersion, versioning: Option<VersioningStatus>) {
        let versions = self.entries.entry(key).or_default();
        match versioning {
            None => versions.clear(),
            Some(VersioningStatus::Suspended) => versions.retain(|v| v.version_id().is_some()),
            Some(VersioningStatus::Enabled) => {}
        }
        versions.insert(0, version);
    }

    /// List current objects under `prefix` after `after`.
    #[must_use]
    pub fn list_objects(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
        after: Option<&str>,
        max_keys: usize,
    ) -> ObjectPage {
        let range = match after {
            Some(marker) => self
                .entries
                .range::<str, _>((Bound::Excluded(marker), Bound::Unbounded)),
            None => self.entries.range::<str, _>(..),
        };
        let items = range
            .filter(|(key, _)| after.is_none_or(|m| !covered_by_marker(key, m, delimiter)))
            .filter_map(|(key, versions)| {
                versions
                    .first()
                    .and_then(ObjectVersion::as_object)
                    .map(|object| (key.as_str(), object))
            });
        let entries = group_entries(items, prefix, delimiter, max_keys);

        let mut page = ObjectPage::default();
        let truncated = entries.len() > max_keys;
        let mut last = None;
        for entry in entries.into_iter().take(max_keys) {
            match entry {
                Entry::Item(object) => {
                    last = Some(object.key.clone());
                    page.objects.push(object.clone());
                }
                Entry::Prefix(cp) => {
                    last = Some(cp.clone());
                    page.common_prefixes.push(cp);
                }
            }
        }
        if truncated {
            page.next_marker = last;
        }
        page
    }

    /// List all versions under `prefix` after `marker`.
    #[must_use]
    pub fn list_versions(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
        marker: VersionMarker<'_>,
        max_keys: usize,
    ) -> VersionPage {
        let items = self
            .entries
            .iter()
            .filter(|(key, _)| match (marker.key, marker.version) {
                (Some(m), Some(_)) => key.as_str() >= m,
                (Some(m), None) => !covered_by_marker(key, m, delimiter),
                (None, _) => true,
            })
            .flat_map(|(key, versions)| {
                let skip = match (marker.key, marker.version) {
                    (Some(m), Some(version)) if m == key.as_str() => versions
                        .iter()
                        .position(|v| v.version_id() == version)
                        .map_or(versions.len(), |pos| pos + 1),
                    _ => 0,
                };
                versions
                    .iter()
                    .enumerate()
                    .skip(skip)
                    .map(move |(i, v)| (key.as_str(), (v, i == 0)))
            });
        let entries = group_entries(items, prefix, delimiter, max_keys);

        let mut page = VersionPage::default();
        let truncated = entries.len() > max_keys;
        let mut last: Option<(String, Option<Option<String>>)> = None;
        for entry in entries.into_iter().take(max_keys) {
            match entry {
                Entry::Item((version, is_latest)) => {
                    let key = match version {
                        ObjectVersion::Object(o) => o.key.clone(),
                        ObjectVersion::DeleteMarker(m) => m.key.clone(),
                    };
                    last = Some((key, Some(version.version_id().map(ToOwned::to_owned))));
                    page.versions.push((version.clone(), is_latest));
                }
                Entry::Prefix(cp) => {
                    last = Some((cp.clone(), None));
                    page.common_prefixes.push(cp);
                }
            }
        }
        if truncated {
            if let Some((key, version)) = last {
                page.next_key_marker = Some(key);
                page.next_version_id_marker = version;
            }
        }
        page
    }
}

/// A fresh version id.
#[must_use]
pub fn generate_version_id() -> String {
    Uuid::new_v4().simple().to_string()
}

//! Object key storage with versioning support.
//!
//! Provides [`ObjectStore`], an enum dispatching between [`KeyStore`]
//! (un-versioned) and [`VersionedKeyStore`] (versioned). Both use a
//! `BTreeMap` so keys are always sorted and listing can seek straight to a
//! continuation point with a range scan.
//!
//! Each store tracks its [`StoreUsage`] so bucket quotas can be checked
//! without walking the map.

use std::collections::BTreeMap;
use std::ops::Bound;

use super::object::{NULL_VERSION_ID, ObjectVersion, S3DeleteMarker, S3Object};

/// Object count and byte total held by a store.
///
/// Delete markers are not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreUsage {
    /// Stored object versions.
    pub objects: u64,
    /// Sum of their sizes.
    pub bytes: u64,
}

impl StoreUsage {
    fn add(&mut self, size: u64) {
        self.objects += 1;
        self.bytes += size;
    }

    fn remove(&mut self, size: u64) {
        self.objects = self.objects.saturating_sub(1);
        self.bytes = self.bytes.saturating_sub(size);
    }

    fn remove_version(&mut self, version: &ObjectVersion) {
        if let Some(obj) = version.as_object() {
            self.remove(obj.size);
        }
    }
}

/// One page of current objects.
#[derive(Debug, Clone, Default)]
pub struct ListResult {
    /// Objects in key order.
    pub objects: Vec<S3Object>,
    /// Whether more matching keys follow the last one returned.
    pub is_truncated: bool,
}

// ---------------------------------------------------------------------------
// ObjectStore
// ---------------------------------------------------------------------------

/// Top-level object store that dispatches to either an un-versioned or
/// versioned backing store.
#[derive(Debug)]
pub enum ObjectStore {
    /// Bucket has never had versioning enabled.
    Unversioned(KeyStore),
    /// Bucket has (or had) versioning enabled.
    Versioned(VersionedKeyStore),
}

impl Default for ObjectStore {
    fn default() -> Self {
        Self::Unversioned(KeyStore::default())
    }
}

impl ObjectStore {
    /// Insert an object version.
    pub fn put(&mut self, object: S3Object) {
        match self {
            Self::Unversioned(store) => store.put(object),
            Self::Versioned(store) => store.put(object),
        }
    }

    /// Usage released if an entry with `key`/`version_id` were overwritten.
    #[must_use]
    pub fn displaced(&self, key: &str, version_id: &str) -> StoreUsage {
        match self {
            Self::Unversioned(store) => store.displaced(key),
            Self::Versioned(store) => store.displaced(key, version_id),
        }
    }

    /// The current object for `key`, if it is not deleted.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&S3Object> {
        match self {
            Self::Unversioned(store) => store.get(key),
            Self::Versioned(store) => store.get(key),
        }
    }

    /// A specific object version.
    #[must_use]
    pub fn get_version(&self, key: &str, version_id: &str) -> Option<&S3Object> {
        match self {
            Self::Unversioned(store) => (version_id == NULL_VERSION_ID)
                .then(|| store.get(key))
                .flatten(),
            Self::Versioned(store) => store.get_version(key, version_id).and_then(ObjectVersion::as_object),
        }
    }

    /// Whether `version_id` of `key` is a delete marker.
    #[must_use]
    pub fn is_delete_marker(&self, key: &str, version_id: &str) -> bool {
        match self {
            Self::Unversioned(_) => false,
            Self::Versioned(store) => store
                .get_version(key, version_id)
                .is_some_and(ObjectVersion::is_delete_marker),
        }
    }

    /// Remove the current object outright (un-versioned delete).
    pub fn remove(&mut self, key: &str) -> Option<S3Object> {
        match self {
            Self::Unversioned(store) => store.delete(key),
            Self::Versioned(store) => store
                .delete_version(key, NULL_VERSION_ID)
                .and_then(|v| match v {
                    ObjectVersion::Object(obj) => Some(*obj),
                    ObjectVersion::DeleteMarker(_) => None,
                }),
        }
    }

    /// Record a delete marker. An un-versioned store simply drops the key.
    pub fn put_delete_marker(&mut self, marker: S3DeleteMarker) {
        match self {
            Self::Unversioned(store) => {
                store.delete(&marker.key);
            }
            Self::Versioned(store) => store.put_delete_marker(marker),
        }
    }

    /// Remove one specific version.
    pub fn delete_version(&mut self, key: &str, version_id: &str) -> Option<ObjectVersion> {
        match self {
            Self::Unversioned(store) => (version_id == NULL_VERSION_ID)
                .then(|| store.delete(key))
                .flatten()
                .map(|obj| ObjectVersion::Object(Box::new(obj))),
            Self::Versioned(store) => store.delete_version(key, version_id),
        }
    }

    /// Current objects whose key starts with `prefix` and sorts after `after`.
    #[must_use]
    pub fn list_objects(&self, prefix: &str, after: Option<&str>, max_keys: usize) -> ListResult {
        let start = scan_start(prefix, after);
        match self {
            Self::Unversioned(store) => collect_page(
                store
                    .objects
                    .range::<str, _>((start, Bound::Unbounded))
                    .take_while(|(k, _)| k.starts_with(prefix))
                    .map(|(_, obj)| obj),
                max_keys,
            ),
            Self::Versioned(store) => collect_page(
                store
                    .objects
                    .range::<str, _>((start, Bound::Unbounded))
                    .take_while(|(k, _)| k.starts_with(prefix))
                    .filter_map(|(_, versions)| versions.first().and_then(ObjectVersion::as_object)),
                max_keys,
            ),
        }
    }

    /// Object count and bytes.
    #[must_use]
    pub fn usage(&self) -> StoreUsage {
        match self {
            Self::Unversioned(store) => store.usage,
            Self::Versioned(store) => store.usage,
        }
    }

    /// Number of keys with at least one entry.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Unversioned(store) => store.objects.len(),
            Self::Versioned(store) => store.objects.len(),
        }
    }

    /// Whether the store holds nothing, delete markers included.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Switch to versioned storage. Existing objects become the `null` version.
    pub fn transition_to_versioned(&mut self) {
        if let Self::Unversioned(store) = self {
            let old = std::mem::take(store);
            let objects = old
                .objects
                .into_iter()
                .map(|(key, obj)| (key, vec![ObjectVersion::Object(Box::new(obj))]))
                .collect();
            *self = Self::Versioned(VersionedKeyStore {
                objects,
                usage: old.usage,
            });
        }
    }

    /// Whether the store keeps version history.
    #[must_use]
    pub fn is_versioned(&self) -> bool {
        matches!(self, Self::Versioned(_))
    }
}

// ---------------------------------------------------------------------------
// KeyStore
// ---------------------------------------------------------------------------

/// Un-versioned key store. Each key maps to exactly one `S3Object`.
#[derive(Debug, Default)]
pub struct KeyStore {
    objects: BTreeMap<String, S3Object>,
    usage: StoreUsage,
}

impl KeyStore {
    /// Insert or replace the object at its key.
    pub fn put(&mut self, object: S3Object) {
        self.usage.add(object.size);
        if let Some(previous) = self.objects.insert(object.key.clone(), object) {
            self.usage.remove(previous.size);
        }
    }

    fn displaced(&self, key: &str) -> StoreUsage {
        self.objects
            .get(key)
            .map_or_else(StoreUsage::default, |obj| StoreUsage {
                objects: 1,
                bytes: obj.size,
            })
    }

    /// Get the object at `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&S3Object> {
        self.objects.get(key)
    }

    /// Remove and return the object at `key`.
    pub fn delete(&mut self, key: &str) -> Option<S3Object> {
        let removed = self.objects.remove(key);
        if let Some(obj) = &removed {
            self.usage.remove(obj.size);
        }
        removed
    }
}

// ---------------------------------------------------------------------------
// VersionedKeyStore
// ---------------------------------------------------------------------------

/// Versioned key store. Each key maps to its versions, newest first.
#[derive(Debug, Default)]
pub struct VersionedKeyStore {
    objects: BTreeMap<String, Vec<ObjectVersion>>,
    usage: StoreUsage,
}

impl VersionedKeyStore {
    /// Push a new latest version. A `null` version replaces the previous one.
    pub fn put(&mut self, object: S3Object) {
        self.usage.add(object.size);
        let key = object.key.clone();
        self.push(&key, ObjectVersion::Object(Box::new(object)));
    }

    /// Push a delete marker as the latest version.
    pub fn put_delete_marker(&mut self, marker: S3DeleteMarker) {
        let key = marker.key.clone();
        self.push(&key, ObjectVersion::DeleteMarker(marker));
    }

    fn push(&mut self, key: &str, version: ObjectVersion) {
        let versions = self.objects.entry(key.to_owned()).or_default();
        if version.version_id() == NULL_VERSION_ID {
            if let Some(pos) = versions
                .iter()
                .position(|v| v.version_id() == NULL_VERSION_ID)
            {
                let old = versions.remove(pos);
                self.usage.remove_version(&old);
            }
        }
        versions.insert(0, version);
    }

    fn displaced(&self, key: &str, version_id: &str) -> StoreUsage {
        self.get_version(key, version_id)
            .and_then(ObjectVersion::as_object)
            .map_or_else(StoreUsage::default, |obj| StoreUsage {
                objects: 1,
                bytes: obj.size,
            })
    }

    /// The latest version of `key`, unless it is a delete marker.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&S3Object> {
        self.objects
            .get(key)
            .and_then(|versions| versions.first())
            .and_then(ObjectVersion::as_object)
    }

    /// A specific version of `key`.
    #[must_use]
    pub fn get_version(&self, key: &str, version_id: &str) -> Option<&ObjectVersion> {
        self.objects
            .get(key)?
            .iter()
            .find(|v| v.version_id() == version_id)
    }

    /// Remove one version. The key disappears with its last version.
    pub fn delete_version(&mut self, key: &str, version_id: &str) -> Option<ObjectVersion> {
        let versions = self.objects.get_mut(key)?;
        let pos = versions.iter().position(|v| v.version_id() == version_id)?;
        let removed = versions.remove(pos);
        if versions.is_empty() {
            self.objects.remove(key);
        }
        self.usage.remove_version(&removed);
        Some(removed)
    }
}

/// Lower bound for a listing scan: just past `after`, or at `prefix`.
fn scan_start<'a>(prefix: &'a str, after: Option<&'a str>) -> Bound<&'a str> {
    match after {
        Some(a) if a >= prefix => Bound::Excluded(a),
        _ => Bound::Included(prefix),
    }
}

fn collect_page<'a>(objects: impl Iterator<Item = &'a S3Object>, max_keys: usize) -> ListResult {
    let mut result = ListResult::default();
    if max_keys == 0 {
        return result;
    }
    for obj in objects {
        if result.objects.len() == max_keys {
            result.is_truncated = true;
            break;
        }
        result.objects.push(obj.clone());
    }
    result
}

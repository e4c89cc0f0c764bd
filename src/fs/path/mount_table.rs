// SPDX-License-Identifier: MPL-2.0

//! The global mount hash table.
//!
//! The table maps `(parent mount, mountpoint dentry)` pairs to the mounts
//! attached there, so that path lookup can cross a mountpoint without
//! walking the parent's children. Multiple mounts may be stacked on the
//! same pair; the one attached most recently shadows the others.

use hashbrown::HashMap;

use super::{Dentry, DentryKey, Mount};
use crate::prelude::*;

/// The key of one hash bucket: a parent mount plus a dentry inside it.
///
/// The parent is identified by its mount ID rather than by a pointer, so
/// stale entries can never alias a recycled allocation.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub(super) struct MountKey {
    parent_id: u64,
    mountpoint: DentryKey,
}

impl MountKey {
    pub(super) fn new(parent: &Mount, mountpoint: &Dentry) -> Self {
        Self {
            parent_id: parent.id(),
            mountpoint: mountpoint.key(),
        }
    }
}

pub(super) struct MountHashTable {
    buckets: RwLock<HashMap<MountKey, Vec<Arc<Mount>>>>,
}

impl MountHashTable {
    fn new() -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
        }
    }

    /// Records that `mount` is attached at `key`.
    ///
    /// Entries within one bucket keep attach order, so the last entry is
    /// the visible (topmost) mount.
    pub(super) fn insert(&self, key: MountKey, mount: Arc<Mount>) {
        let mut buckets = self.buckets.write();
        buckets.entry(key).or_default().push(mount);
    }

    /// Removes the entry for `mount` at `key`, if any.
    pub(super) fn remove(&self, key: &MountKey, mount: &Mount) -> Option<Arc<Mount>> {
        let mut buckets = self.buckets.write();
        let bucket = buckets.get_mut(key)?;
        let idx = bucket.iter().position(|m| m.id() == mount.id())?;
        let removed = bucket.remove(idx);
        if bucket.is_empty() {
            buckets.remove(key);
        }
        Some(removed)
    }

    /// Looks up the topmost mount attached at `key`.
    pub(super) fn lookup(&self, key: &MountKey) -> Option<Arc<Mount>> {
        let buckets = self.buckets.read();
        buckets.get(key).and_then(|bucket| bucket.last().cloned())
    }

    /// Looks up all mounts stacked at `key`, in attach order.
    pub(super) fn lookup_all(&self, key: &MountKey) -> Vec<Arc<Mount>> {
        let buckets = self.buckets.read();
        buckets.get(key).cloned().unwrap_or_default()
    }
}

static MOUNT_HASH_TABLE: Once<MountHashTable> = Once::new();

pub(super) fn mount_table() -> &'static MountHashTable {
    MOUNT_HASH_TABLE.call_once(MountHashTable::new)
}

/// Looks up the topmost mount attached on `dentry` within `parent`.
pub fn lookup_mnt(parent: &Mount, dentry: &Dentry) -> Option<Arc<Mount>> {
    mount_table().lookup(&MountKey::new(parent, dentry))
}

/// Looks up every mount stacked on `dentry` within `parent`, in attach
/// order (the last one is the visible mount).
pub fn lookup_mnt_all(parent: &Mount, dentry: &Dentry) -> Vec<Arc<Mount>> {
    mount_table().lookup_all(&MountKey::new(parent, dentry))
}

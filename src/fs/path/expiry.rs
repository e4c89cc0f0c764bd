// SPDX-License-Identifier: MPL-2.0

//! Automatic expiry of unused mounts.
//!
//! A mount placed on an [`ExpiryList`] is reaped once it stays unused for
//! two consecutive sweeps. The first sweep sets the expiry mark; any use
//! of the mount (resolving a name inside it) clears it again. A mount
//! whose mark is still set when the next sweep runs is unmounted if
//! nothing else holds it.

use super::Mount;
use crate::prelude::*;

/// A set of mounts that expire when they go unused.
pub struct ExpiryList {
    mounts: Mutex<Vec<Arc<Mount>>>,
}

impl ExpiryList {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            mounts: Mutex::new(Vec::new()),
        })
    }

    /// Places `mount` on this list, making it expirable.
    ///
    /// The mark starts clear, so the mount survives at least one full
    /// sweep interval.
    pub fn add(self: &Arc<Self>, mount: Arc<Mount>) {
        mount.set_expiry_list(self);
        mount.clear_expiry_mark();
        self.mounts.lock().push(mount);
    }

    /// Drops the mount with the given ID from the list, if present.
    pub(super) fn remove(&self, mount_id: u64) {
        self.mounts.lock().retain(|m| m.id() != mount_id);
    }

    /// Checks whether the mount with the given ID is on the list.
    pub fn contains(&self, mount_id: u64) -> bool {
        self.mounts.lock().iter().any(|m| m.id() == mount_id)
    }

    /// Runs one expiry sweep.
    ///
    /// The first phase runs under the list lock alone: it drops mounts
    /// that are already detached, marks the unmarked, and pulls out those
    /// still marked from the previous sweep. The second phase revalidates
    /// each candidate under its namespace tree lock and unmounts it only
    /// if it is still attached and not busy; otherwise it goes back on
    /// the list.
    pub fn mark_mounts_for_expiry(self: &Arc<Self>) {
        let mut candidates = Vec::new();
        {
            let mut mounts = self.mounts.lock();
            mounts.retain(|mount| {
                if !mount.is_attached() {
                    mount.clear_expiry_list();
                    return false;
                }
                if !mount.test_and_set_expiry_mark() {
                    return true;
                }
                mount.clear_expiry_list();
                candidates.push(mount.clone());
                false
            });
        }

        for mount in candidates {
            let Some(ns) = mount.namespace() else {
                mount.clear_expiry_mark();
                continue;
            };
            let _guard = ns.write_guard();
            // One extra reference on the root: the `mount` binding here.
            if mount.is_attached() && !mount.is_busy(1) {
                debug!("expiring unused mount {:?}", mount);
                Mount::umount_tree(&mount);
            } else {
                self.add(mount);
            }
        }
    }
}

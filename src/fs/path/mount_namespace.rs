// SPDX-License-Identifier: MPL-2.0

use super::{Mount, Path};
use crate::{
    context::{CapSet, Context},
    fs::{fs_resolver::FsResolver, utils::FileSystem},
    prelude::*,
};

/// A mount namespace: one independent mount tree.
///
/// Every attached mount belongs to exactly one namespace, recorded by a
/// weak backlink on the mount. Structural changes to the tree are
/// serialized by the per-namespace `tree_lock`, which readers (path
/// lookup, enumeration) take shared and writers (mount, umount, move,
/// pivot) take exclusive.
pub struct MountNamespace {
    root: RwLock<Arc<Mount>>,
    tree_lock: RwLock<()>,
    /// The live path resolvers viewing this namespace, tracked so that
    /// `pivot_root` can re-root every one of them.
    resolvers: Mutex<Vec<Weak<RwLock<FsResolver>>>>,
}

impl MountNamespace {
    /// Creates the initial namespace with `fs` as its root file system.
    pub fn new_init(fs: Arc<dyn FileSystem>, devname: &str) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| {
            let root = Mount::new_root(fs, devname, weak_self.clone());
            Self {
                root: RwLock::new(root),
                tree_lock: RwLock::new(()),
                resolvers: Mutex::new(Vec::new()),
            }
        })
    }

    /// Gets the root mount of this namespace.
    pub fn root(&self) -> Arc<Mount> {
        self.root.read().clone()
    }

    /// Replaces the root mount. Used by `pivot_root`.
    pub(crate) fn set_root(&self, new_root: Arc<Mount>) {
        *self.root.write() = new_root;
    }

    /// Checks whether `mount` belongs to this namespace.
    pub fn owns(self: &Arc<Self>, mount: &Mount) -> bool {
        mount.namespace().is_some_and(|ns| Arc::ptr_eq(&ns, self))
    }

    /// Starts tracking a resolver that views this namespace.
    pub(crate) fn track_resolver(&self, resolver: &Arc<RwLock<FsResolver>>) {
        let mut resolvers = self.resolvers.lock();
        resolvers.retain(|weak| weak.strong_count() > 0);
        resolvers.push(Arc::downgrade(resolver));
    }

    /// Stops tracking a resolver, e.g. when it moves to another namespace.
    pub(crate) fn untrack_resolver(&self, resolver: &Arc<RwLock<FsResolver>>) {
        self.resolvers
            .lock()
            .retain(|weak| weak.as_ptr() != Arc::as_ptr(resolver) && weak.strong_count() > 0);
    }

    /// Gets every live resolver viewing this namespace.
    pub(crate) fn tracked_resolvers(&self) -> Vec<Arc<RwLock<FsResolver>>> {
        self.resolvers
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Takes the tree lock shared, for lookups and enumeration.
    pub fn read_guard(&self) -> RwLockReadGuard<'_, ()> {
        self.tree_lock.read()
    }

    /// Takes the tree lock exclusively, for structural changes.
    pub fn write_guard(&self) -> RwLockWriteGuard<'_, ()> {
        self.tree_lock.write()
    }

    /// Collects every mount in this namespace in pre-order.
    pub fn all_mounts(&self) -> Vec<Arc<Mount>> {
        let _guard = self.read_guard();
        Mount::collect_subtree(&self.root())
    }

    /// Creates a new namespace holding a deep copy of this one's tree.
    ///
    /// The copies share file system instances with the originals, so file
    /// contents stay common while the trees evolve independently. The
    /// calling context's root and working directories are migrated onto
    /// the corresponding mounts of the new tree.
    pub fn clone_new(self: &Arc<Self>, ctx: &Context) -> Result<Arc<MountNamespace>> {
        ctx.credentials().check_cap(CapSet::SYS_ADMIN)?;

        // Freeze the source tree while it is copied.
        let _guard = self.write_guard();
        let old_root = self.root();
        let new_root = old_root.clone_mount_tree(old_root.root_dentry(), true)?;

        let new_ns = Arc::new(Self {
            root: RwLock::new(new_root.clone()),
            tree_lock: RwLock::new(()),
            resolvers: Mutex::new(Vec::new()),
        });
        let weak_ns = Arc::downgrade(&new_ns);

        // Both walks visit isomorphic trees, so positions correspond.
        let old_mounts = Mount::collect_subtree(&old_root);
        let new_mounts = Mount::collect_subtree(&new_root);
        debug_assert_eq!(old_mounts.len(), new_mounts.len());
        for mount in &new_mounts {
            mount.set_namespace(weak_ns.clone());
        }

        let remap = |path: &Path| -> Path {
            old_mounts
                .iter()
                .position(|mount| Arc::ptr_eq(mount, path.mount_node()))
                .map(|idx| Path::new(new_mounts[idx].clone(), path.dentry().clone()))
                .unwrap_or_else(|| path.clone())
        };
        let mut fs_resolver = ctx.fs().write();
        let new_root_path = remap(fs_resolver.root());
        let new_cwd_path = remap(fs_resolver.cwd());
        fs_resolver.set_root(new_root_path);
        fs_resolver.set_cwd(new_cwd_path);
        drop(fs_resolver);
        self.untrack_resolver(ctx.fs());
        new_ns.track_resolver(ctx.fs());
        ctx.set_mnt_ns(new_ns.clone());

        Ok(new_ns)
    }
}

impl Drop for MountNamespace {
    fn drop(&mut self) {
        // Tear the tree down children-first and sever the namespace
        // backlinks, so no mount outlives its namespace half-attached.
        let root = self.root.read().clone();
        Mount::umount_tree(&root);
    }
}

impl Debug for MountNamespace {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("MountNamespace")
            .field("root", &self.root())
            .finish()
    }
}

// SPDX-License-Identifier: MPL-2.0

use core::{
    ops::Bound,
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
};

use super::{
    expiry::ExpiryList,
    mount_namespace::MountNamespace,
    mount_table::{mount_table, MountKey},
    Dentry, DentryKey, Path,
};
use crate::{
    fs::utils::{FileSystem, FsFlags},
    prelude::*,
    security,
};

/// A `Mount` is a node in the mount tree: one file system instance
/// attached at one location.
///
/// The tree is doubly linked. Each mount holds an `Arc` to every child
/// and a `Weak` back to its parent, so dropping a detached subtree frees
/// it without manual reference counting. An attached mount additionally
/// appears in its parent's children map and in the global
/// [mount hash table](super::mount_table), which is how path lookup
/// crosses mountpoints.
pub struct Mount {
    /// A unique, never-reused identifier.
    id: u64,
    /// Root dentry.
    root_dentry: Arc<Dentry>,
    /// The dentry this mount is attached on, `None` while detached.
    mountpoint: RwLock<Option<Arc<Dentry>>>,
    /// The parent mount, `None` while detached.
    parent: RwLock<Option<Weak<Mount>>>,
    /// Child mounts, keyed by mountpoint dentry and child ID.
    children: RwLock<BTreeMap<ChildKey, Arc<Mount>>>,
    /// Per-mount flags such as read-only or noexec.
    flags: RwLock<MntFlags>,
    /// The device name the mount was created with.
    devname: String,
    /// The associated file system.
    fs: Arc<dyn FileSystem>,
    /// The namespace this mount belongs to.
    mnt_ns: RwLock<Weak<MountNamespace>>,
    /// Set by the first expiry sweep, cleared on use.
    expiry_mark: AtomicBool,
    /// Backlink to the expiry list this mount sits on, if any.
    expiry_list: Mutex<Option<Weak<ExpiryList>>>,
    this: Weak<Mount>,
}

static NEXT_MOUNT_ID: AtomicU64 = AtomicU64::new(0);

impl Mount {
    /// Creates a root mount for a namespace.
    pub(super) fn new_root(
        fs: Arc<dyn FileSystem>,
        devname: &str,
        mnt_ns: Weak<MountNamespace>,
    ) -> Arc<Self> {
        Self::new(fs, devname, mnt_ns)
    }

    /// Creates a detached mount with a newly created root dentry.
    ///
    /// The mount holds no parent and no mountpoint until [`attach`] or
    /// [`graft_mount_tree`] places it in a tree.
    ///
    /// [`attach`]: Self::attach
    /// [`graft_mount_tree`]: Self::graft_mount_tree
    pub(super) fn new(
        fs: Arc<dyn FileSystem>,
        devname: &str,
        mnt_ns: Weak<MountNamespace>,
    ) -> Arc<Self> {
        let root_dentry = Dentry::new_root(fs.root_inode());
        Arc::new_cyclic(|weak_self| Self {
            id: NEXT_MOUNT_ID.fetch_add(1, Ordering::Relaxed),
            root_dentry,
            mountpoint: RwLock::new(None),
            parent: RwLock::new(None),
            children: RwLock::new(BTreeMap::new()),
            flags: RwLock::new(MntFlags::empty()),
            devname: String::from(devname),
            fs,
            mnt_ns: RwLock::new(mnt_ns),
            expiry_mark: AtomicBool::new(false),
            expiry_list: Mutex::new(None),
            this: weak_self.clone(),
        })
    }

    /// Clones this mount without its children.
    ///
    /// The clone shares the file system instance and copies the per-mount
    /// flags; `root_dentry` becomes the clone's root, which allows a bind
    /// mount to expose a subtree of the original.
    fn clone_mount(&self, root_dentry: &Arc<Dentry>) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            id: NEXT_MOUNT_ID.fetch_add(1, Ordering::Relaxed),
            root_dentry: root_dentry.clone(),
            mountpoint: RwLock::new(None),
            parent: RwLock::new(None),
            children: RwLock::new(BTreeMap::new()),
            flags: RwLock::new(*self.flags.read()),
            devname: self.devname.clone(),
            fs: self.fs.clone(),
            mnt_ns: RwLock::new(self.mnt_ns.read().clone()),
            expiry_mark: AtomicBool::new(false),
            expiry_list: Mutex::new(None),
            this: weak_self.clone(),
        })
    }

    fn this(&self) -> Arc<Self> {
        self.this.upgrade().unwrap()
    }

    /// Returns the unique ID of this mount.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Gets the root dentry of this mount.
    pub fn root_dentry(&self) -> &Arc<Dentry> {
        &self.root_dentry
    }

    /// Gets the associated file system.
    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// Gets the device name the mount was created with.
    pub fn devname(&self) -> &str {
        &self.devname
    }

    /// Gets the per-mount flags.
    pub fn flags(&self) -> MntFlags {
        *self.flags.read()
    }

    /// Replaces the per-mount flags.
    pub fn set_flags(&self, flags: MntFlags) {
        *self.flags.write() = flags;
    }

    /// Flushes every file system in the subtree rooted here.
    pub fn sync(self: &Arc<Self>) -> Result<()> {
        for mount in Self::collect_subtree(self) {
            mount.fs().sync()?;
        }
        Ok(())
    }

    /// Gets the mountpoint dentry, or `None` if the mount is detached.
    pub fn mountpoint(&self) -> Option<Arc<Dentry>> {
        self.mountpoint.read().clone()
    }

    /// Gets the parent mount, or `None` if the mount is detached.
    pub fn parent(&self) -> Option<Arc<Mount>> {
        self.parent.read().as_ref().and_then(Weak::upgrade)
    }

    /// Checks whether the mount is attached to a parent.
    pub fn is_attached(&self) -> bool {
        self.parent.read().is_some()
    }

    /// Checks whether the mount is the root of its namespace.
    pub fn is_root_of_namespace(&self) -> bool {
        match self.namespace() {
            Some(ns) => Arc::ptr_eq(&ns.root(), &self.this()),
            None => false,
        }
    }

    /// Gets the namespace this mount belongs to, if it is still alive.
    pub fn namespace(&self) -> Option<Arc<MountNamespace>> {
        self.mnt_ns.read().upgrade()
    }

    pub(super) fn set_namespace(&self, mnt_ns: Weak<MountNamespace>) {
        *self.mnt_ns.write() = mnt_ns;
    }

    /// Attaches this mount on `mountpoint` inside `parent`.
    ///
    /// Establishes all four links at once: the parent backlink, the
    /// mountpoint, the entry in the parent's children map, and the entry
    /// in the global hash table.
    pub(crate) fn attach(
        self: &Arc<Self>,
        parent: &Arc<Mount>,
        mountpoint: &Arc<Dentry>,
    ) -> Result<()> {
        {
            let mut self_parent = self.parent.write();
            if self_parent.is_some() {
                return_errno_with_message!(Errno::EBUSY, "the mount is already attached");
            }
            *self_parent = Some(Arc::downgrade(parent));
        }
        *self.mountpoint.write() = Some(mountpoint.clone());

        let child_key = ChildKey::new(mountpoint, self.id);
        parent.children.write().insert(child_key, self.clone());
        mount_table().insert(MountKey::new(parent, mountpoint), self.clone());
        mountpoint.inc_mount_count();
        Ok(())
    }

    /// Detaches this mount from its parent, undoing [`attach`].
    ///
    /// Child mounts stay attached to this mount and disappear from the
    /// namespace together with it. Returns the old parent and mountpoint,
    /// or `None` if the mount was not attached.
    ///
    /// [`attach`]: Self::attach
    pub(crate) fn detach(self: &Arc<Self>) -> Option<(Arc<Mount>, Arc<Dentry>)> {
        self.remove_from_expiry_list();

        let parent = self.parent.write().take()?.upgrade().unwrap();
        let mountpoint = self.mountpoint.write().take().unwrap();

        let child_key = ChildKey::new(&mountpoint, self.id);
        parent.children.write().remove(&child_key);
        mount_table().remove(&MountKey::new(&parent, &mountpoint), self);
        mountpoint.dec_mount_count();
        Some((parent, mountpoint))
    }

    /// Returns the successor of `current` in a pre-order walk of the
    /// subtree rooted at `root`, or `None` when the walk is over.
    ///
    /// The order is deterministic for an unchanged tree: children are
    /// visited in their map order, which sorts by mountpoint and then by
    /// mount ID (attach order for mounts stacked on one dentry).
    pub fn next_mount(current: &Arc<Mount>, root: &Arc<Mount>) -> Option<Arc<Mount>> {
        if let Some(child) = current.children.read().values().next() {
            return Some(child.clone());
        }

        // No children; climb until a following sibling exists.
        let mut node = current.clone();
        loop {
            if Arc::ptr_eq(&node, root) {
                return None;
            }
            let parent = node.parent()?;
            let mountpoint = node.mountpoint()?;
            let key = ChildKey::new(&mountpoint, node.id);
            let next_sibling = parent
                .children
                .read()
                .range((Bound::Excluded(key), Bound::Unbounded))
                .next()
                .map(|(_, mount)| mount.clone());
            if let Some(sibling) = next_sibling {
                return Some(sibling);
            }
            node = parent;
        }
    }

    /// Collects the subtree rooted at `root` in pre-order.
    pub fn collect_subtree(root: &Arc<Mount>) -> Vec<Arc<Mount>> {
        let mut mounts = vec![root.clone()];
        let mut current = root.clone();
        while let Some(next) = Self::next_mount(&current, root) {
            mounts.push(next.clone());
            current = next;
        }
        mounts
    }

    /// Clones the mount tree rooted at `root_dentry` within this mount.
    ///
    /// The clones share file system instances with their originals. If
    /// `recursive` is false only this mount is cloned; otherwise every
    /// mount whose mountpoint lies under `root_dentry` is cloned along
    /// with its descendants. On failure the partially built tree is torn
    /// down before the error is returned.
    pub fn clone_mount_tree(&self, root_dentry: &Arc<Dentry>, recursive: bool) -> Result<Arc<Mount>> {
        let new_root = self.clone_mount(root_dentry);
        if !recursive {
            return Ok(new_root);
        }

        let mut stack = vec![self.this()];
        let mut new_stack = vec![new_root.clone()];
        while let Some(old_mount) = stack.pop() {
            let new_parent = new_stack.pop().unwrap();

            let old_children: Vec<Arc<Mount>> =
                old_mount.children.read().values().cloned().collect();
            for old_child in old_children {
                let mountpoint = old_child.mountpoint().unwrap();
                // At the top level, skip mounts outside the cloned subtree.
                if Arc::ptr_eq(&old_mount, &self.this())
                    && !Arc::ptr_eq(&mountpoint, root_dentry)
                    && !mountpoint.is_descendant_of(root_dentry)
                {
                    continue;
                }

                let new_child = old_child.clone_mount(old_child.root_dentry());
                if let Err(e) = new_child.attach(&new_parent, &mountpoint) {
                    Self::umount_tree(&new_root);
                    return Err(e);
                }
                stack.push(old_child);
                new_stack.push(new_child);
            }
        }
        Ok(new_root)
    }

    /// Detaches the whole subtree rooted at `root` and severs its
    /// namespace links.
    ///
    /// Mounts are detached children-first so that no child ever outlives
    /// its place in the hash table.
    pub(crate) fn umount_tree(root: &Arc<Mount>) {
        let mounts = Self::collect_subtree(root);
        for mount in mounts.iter().rev() {
            mount.detach();
            mount.set_namespace(Weak::new());
        }
    }

    /// Grafts this detached mount tree onto `target`.
    ///
    /// The target must be an existing path in a live namespace; lookup
    /// has already resolved it to the topmost mount stacked there, so a
    /// graft on an existing mountpoint stacks above the previous mount
    /// and shadows it.
    pub(super) fn graft_mount_tree(self: &Arc<Self>, target: &Path) -> Result<()> {
        let target_dentry = target.dentry();
        let target_mount = target.mount_node();

        if target_dentry.fs().flags().contains(FsFlags::NOUSER) {
            return_errno_with_message!(Errno::EINVAL, "the target fs does not allow mounts");
        }
        if target_dentry.type_().is_directory() != self.root_dentry.type_().is_directory() {
            return_errno!(Errno::ENOTDIR);
        }
        if target_dentry.is_dead() {
            return_errno_with_message!(Errno::ENOENT, "the mountpoint was removed");
        }
        security::hooks().check_mount(&self.devname, target)?;
        if target_mount.namespace().is_none() {
            return_errno_with_message!(Errno::ENOENT, "the target mount is no longer reachable");
        }
        // Refuse to stack a file system directly on its own root.
        if Arc::ptr_eq(&self.fs, &target_mount.fs)
            && Arc::ptr_eq(target_dentry, target_mount.root_dentry())
        {
            return_errno_with_message!(Errno::EBUSY, "the mount is already present");
        }

        self.attach(target_mount, target_dentry)
    }

    /// Checks whether any mount in the subtree is held by an outside
    /// reference.
    ///
    /// Every attached mount is referenced by its parent's children map,
    /// by the hash table, and by the walk performed here; a mount under
    /// expiry watch is additionally referenced by its list, which does
    /// not count as a use. `extra_root_refs` accounts for references the
    /// caller knowingly holds on the subtree root. Anything beyond these
    /// makes the subtree busy.
    pub fn is_busy(self: &Arc<Self>, extra_root_refs: usize) -> bool {
        let mounts = Self::collect_subtree(self);
        let actual: usize = mounts.iter().map(Arc::strong_count).sum();
        let expected: usize = extra_root_refs
            + mounts
                .iter()
                .map(|mount| 3 + usize::from(mount.is_expiry_watched()))
                .sum::<usize>();
        actual > expected
    }

    fn is_expiry_watched(&self) -> bool {
        self.expiry_list
            .lock()
            .as_ref()
            .and_then(Weak::upgrade)
            .is_some()
    }

    /// Sets the expiry mark, returning whether it was already set.
    pub(crate) fn test_and_set_expiry_mark(&self) -> bool {
        self.expiry_mark.swap(true, Ordering::AcqRel)
    }

    /// Clears the expiry mark. Called whenever the mount is used.
    pub(super) fn clear_expiry_mark(&self) {
        self.expiry_mark.store(false, Ordering::Release);
    }

    pub(super) fn set_expiry_list(&self, list: &Arc<ExpiryList>) {
        *self.expiry_list.lock() = Some(Arc::downgrade(list));
    }

    pub(super) fn clear_expiry_list(&self) {
        *self.expiry_list.lock() = None;
    }

    /// Drops this mount from the expiry list it sits on, if any.
    fn remove_from_expiry_list(&self) {
        let list = self.expiry_list.lock().take();
        if let Some(list) = list.as_ref().and_then(Weak::upgrade) {
            list.remove(self.id);
        }
        self.clear_expiry_mark();
    }
}

impl Debug for Mount {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("Mount")
            .field("id", &self.id)
            .field("devname", &self.devname)
            .field("fs_type", &self.fs.fs_type())
            .field("flags", &self.flags())
            .finish()
    }
}

/// The key of a child mount within its parent's children map.
///
/// Sorting by mountpoint first groups mounts stacked on the same dentry;
/// the mount ID breaks ties in attach order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ChildKey {
    mountpoint: DentryKey,
    mount_id: u64,
}

impl ChildKey {
    fn new(mountpoint: &Dentry, mount_id: u64) -> Self {
        Self {
            mountpoint: mountpoint.key(),
            mount_id,
        }
    }
}

bitflags! {
    /// Per-mount flags, applied at this mount only.
    ///
    /// They restrict how the files under the mount may be used without
    /// affecting other mounts of the same file system.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MntFlags: u32 {
        const RDONLY     = 1 << 0;
        const NOSUID     = 1 << 1;
        const NODEV      = 1 << 2;
        const NOEXEC     = 1 << 3;
        const NOATIME    = 1 << 4;
        const NODIRATIME = 1 << 5;
    }
}

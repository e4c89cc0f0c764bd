// SPDX-License-Identifier: MPL-2.0

use core::sync::atomic::{AtomicU32, Ordering};

use hashbrown::HashMap;

use crate::{
    fs::utils::{FileSystem, Inode, InodeMode, InodeType},
    prelude::*,
};

/// A `Dentry` names a location inside one file system instance.
///
/// Dentries form the per-FS directory tree that the mount tree is pinned
/// to: every mountpoint is a dentry, and every [`Mount`] owns the root
/// dentry of its file system.
///
/// [`Mount`]: super::Mount
pub struct Dentry {
    inode: Arc<dyn Inode>,
    type_: InodeType,
    name_and_parent: RwLock<Option<(String, Arc<Dentry>)>>,
    children: RwLock<DentryChildren>,
    flags: AtomicU32,
    /// The number of mounts attached directly on this dentry.
    mount_count: AtomicU32,
    this: Weak<Dentry>,
}

impl Dentry {
    /// Creates a new root `Dentry` with the given inode.
    ///
    /// It is created during the construction of a [`Mount`], which holds an
    /// arc reference to this root `Dentry`.
    ///
    /// [`Mount`]: super::Mount
    pub(super) fn new_root(inode: Arc<dyn Inode>) -> Arc<Self> {
        Self::new(inode, DentryOptions::Root)
    }

    fn new(inode: Arc<dyn Inode>, options: DentryOptions) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            type_: inode.type_(),
            inode,
            name_and_parent: match options {
                DentryOptions::Leaf(name_and_parent) => RwLock::new(Some(name_and_parent)),
                _ => RwLock::new(None),
            },
            children: RwLock::new(DentryChildren::new()),
            flags: AtomicU32::new(DentryFlags::empty().bits()),
            mount_count: AtomicU32::new(0),
            this: weak_self.clone(),
        })
    }

    /// Gets the type of the `Dentry`.
    pub fn type_(&self) -> InodeType {
        self.type_
    }

    /// Gets the name of the `Dentry`.
    ///
    /// Returns "/" if it is a root `Dentry`.
    pub fn name(&self) -> String {
        match self.name_and_parent.read().as_ref() {
            Some(name_and_parent) => name_and_parent.0.clone(),
            None => String::from("/"),
        }
    }

    /// Gets the parent `Dentry`.
    ///
    /// Returns None if it is a root `Dentry`.
    pub fn parent(&self) -> Option<Arc<Self>> {
        self.name_and_parent
            .read()
            .as_ref()
            .map(|name_and_parent| name_and_parent.1.clone())
    }

    fn this(&self) -> Arc<Self> {
        self.this.upgrade().unwrap()
    }

    /// Gets the corresponding unique `DentryKey`.
    pub fn key(&self) -> DentryKey {
        DentryKey::new(self)
    }

    /// Gets the inner inode.
    pub fn inode(&self) -> &Arc<dyn Inode> {
        &self.inode
    }

    /// Gets the file system this dentry belongs to.
    pub fn fs(&self) -> Arc<dyn FileSystem> {
        self.inode.fs()
    }

    fn flags(&self) -> DentryFlags {
        let flags = self.flags.load(Ordering::Relaxed);
        DentryFlags::from_bits(flags).unwrap()
    }

    /// Checks if this dentry is a descendant (child, grandchild, or
    /// great-grandchild, etc.) of another dentry.
    pub fn is_descendant_of(&self, ancestor: &Arc<Self>) -> bool {
        let mut parent = self.parent();
        while let Some(p) = parent {
            if Arc::ptr_eq(&p, ancestor) {
                return true;
            }
            parent = p.parent();
        }
        false
    }

    /// Checks whether at least one mount is attached on this dentry.
    pub fn is_mountpoint(&self) -> bool {
        self.flags().contains(DentryFlags::MOUNTED)
    }

    /// Gets the number of mounts attached directly on this dentry.
    pub fn mount_count(&self) -> u32 {
        self.mount_count.load(Ordering::Acquire)
    }

    pub(super) fn inc_mount_count(&self) {
        self.mount_count.fetch_add(1, Ordering::AcqRel);
        self.flags
            .fetch_or(DentryFlags::MOUNTED.bits(), Ordering::Release);
    }

    pub(super) fn dec_mount_count(&self) {
        let old = self.mount_count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(old > 0);
        if old == 1 {
            self.flags
                .fetch_and(!(DentryFlags::MOUNTED.bits()), Ordering::Release);
        }
    }

    /// Checks whether this dentry has been removed from its parent
    /// directory.
    ///
    /// A dead dentry may still be referenced (e.g. by a [`Path`]), but it
    /// can no longer serve as a mount target.
    ///
    /// [`Path`]: super::Path
    pub fn is_dead(&self) -> bool {
        self.flags().contains(DentryFlags::DEAD)
    }

    fn set_dead(&self) {
        self.flags
            .fetch_or(DentryFlags::DEAD.bits(), Ordering::Release);
    }

    /// Creates a child `Dentry` by creating a new inode of the `type_` with
    /// the `mode`.
    pub fn create(&self, name: &str, type_: InodeType, mode: InodeMode) -> Result<Arc<Self>> {
        if self.type_() != InodeType::Dir {
            return_errno!(Errno::ENOTDIR);
        }

        let mut children = self.children.write();
        if children.contains_valid(name) {
            return_errno!(Errno::EEXIST);
        }

        let new_inode = self.inode.create(name, type_, mode)?;
        let name = String::from(name);
        let new_child = Dentry::new(new_inode, DentryOptions::Leaf((name.clone(), self.this())));

        if new_child.is_dentry_cacheable() {
            children.insert(name, new_child.clone());
        }

        Ok(new_child)
    }

    /// Looks up a target `Dentry` from the cache in children.
    pub fn lookup_via_cache(&self, name: &str) -> Result<Option<Arc<Dentry>>> {
        let children = self.children.read();
        children.find(name)
    }

    /// Looks up a target `Dentry` from the file system.
    pub fn lookup_via_fs(&self, name: &str) -> Result<Arc<Dentry>> {
        let mut children = self.children.write();

        let inode = match self.inode.lookup(name) {
            Ok(inode) => inode,
            Err(e) => {
                if e.error() == Errno::ENOENT && self.is_dentry_cacheable() {
                    children.insert_negative(String::from(name));
                }
                return Err(e);
            }
        };
        let name = String::from(name);
        let target = Self::new(inode, DentryOptions::Leaf((name.clone(), self.this())));

        if target.is_dentry_cacheable() {
            children.insert(name, target.clone());
        }

        Ok(target)
    }

    /// Deletes a child `Dentry` by `unlink()` the inner inode.
    pub fn unlink(&self, name: &str) -> Result<()> {
        if self.type_() != InodeType::Dir {
            return_errno!(Errno::ENOTDIR);
        }

        let mut children = self.children.write();
        children.check_mountpoint(name)?;

        self.inode.unlink(name)?;

        children.delete(name);
        Ok(())
    }

    /// Deletes a child directory `Dentry` by `rmdir()` the inner inode.
    pub fn rmdir(&self, name: &str) -> Result<()> {
        if self.type_() != InodeType::Dir {
            return_errno!(Errno::ENOTDIR);
        }

        let mut children = self.children.write();
        children.check_mountpoint(name)?;

        self.inode.rmdir(name)?;

        children.delete(name);
        Ok(())
    }

    fn is_dentry_cacheable(&self) -> bool {
        self.inode.is_dentry_cacheable()
    }
}

impl Debug for Dentry {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("Dentry")
            .field("name", &self.name())
            .field("flags", &self.flags())
            .finish()
    }
}

/// `DentryKey` is the unique identifier for the corresponding `Dentry`.
///
/// For non-root dentries, it uses self's name and parent's pointer to form
/// the key, meanwhile, the root `Dentry` uses "/" and self's pointer to
/// form the key.
#[derive(Debug, Clone, Hash, PartialOrd, Ord, Eq, PartialEq)]
pub struct DentryKey {
    name: String,
    parent_ptr: usize,
}

impl DentryKey {
    /// Forms a `DentryKey` from the corresponding `Dentry`.
    pub fn new(dentry: &Dentry) -> Self {
        let (name, parent) = match dentry.name_and_parent.read().as_ref() {
            Some(name_and_parent) => name_and_parent.clone(),
            None => (String::from("/"), dentry.this()),
        };
        Self {
            name,
            parent_ptr: Arc::as_ptr(&parent) as usize,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy)]
    struct DentryFlags: u32 {
        const MOUNTED = 1 << 0;
        const DEAD = 1 << 1;
    }
}

enum DentryOptions {
    Root,
    Leaf((String, Arc<Dentry>)),
}

/// Manages child dentries, including both valid and negative entries.
///
/// A _negative_ dentry reflects a failed filename lookup, saving potential
/// repeated and costly lookups in the future.
struct DentryChildren {
    dentries: HashMap<String, Option<Arc<Dentry>>>,
}

impl DentryChildren {
    /// Creates an empty dentry cache.
    pub fn new() -> Self {
        Self {
            dentries: HashMap::new(),
        }
    }

    /// Checks if a valid dentry with the given name exists.
    pub fn contains_valid(&self, name: &str) -> bool {
        self.dentries.get(name).is_some_and(|child| child.is_some())
    }

    /// Finds a dentry by name. Returns error for negative entries.
    pub fn find(&self, name: &str) -> Result<Option<Arc<Dentry>>> {
        match self.dentries.get(name) {
            Some(Some(child)) => Ok(Some(child.clone())),
            Some(None) => return_errno_with_message!(Errno::ENOENT, "found a negative dentry"),
            None => Ok(None),
        }
    }

    /// Inserts a valid cacheable dentry.
    pub fn insert(&mut self, name: String, dentry: Arc<Dentry>) {
        let _ = self.dentries.insert(name, Some(dentry));
    }

    /// Inserts a negative dentry.
    pub fn insert_negative(&mut self, name: String) {
        let _ = self.dentries.insert(name, None);
    }

    /// Deletes a dentry by name, marking it dead and turning the cache slot
    /// into a negative entry.
    pub fn delete(&mut self, name: &str) -> Option<Arc<Dentry>> {
        let dentry = self.dentries.get_mut(name).and_then(Option::take);
        if let Some(ref dentry) = dentry {
            dentry.set_dead();
        }
        dentry
    }

    /// Checks whether the dentry is a mount point. Returns an error if it is.
    pub fn check_mountpoint(&self, name: &str) -> Result<()> {
        if let Some(Some(dentry)) = self.dentries.get(name) {
            if dentry.is_mountpoint() {
                return_errno_with_message!(Errno::EBUSY, "dentry is a mountpoint");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::ramfs::RamFS;

    // The inodes hold their FS only weakly, so the helper hands the
    // `RamFS` back to keep it alive for the test's duration.
    fn new_root() -> (Arc<RamFS>, Arc<Dentry>) {
        let fs = RamFS::new();
        let root = Dentry::new_root(fs.root_inode());
        (fs, root)
    }

    #[test]
    fn create_then_lookup_hits_cache() {
        let (_fs, root) = new_root();
        let child = root
            .create("a", InodeType::Dir, InodeMode::from_bits_truncate(0o755))
            .unwrap();
        let found = root.lookup_via_cache("a").unwrap().unwrap();
        assert!(Arc::ptr_eq(&child, &found));
    }

    #[test]
    fn unlink_marks_dentry_dead() {
        let (_fs, root) = new_root();
        let child = root
            .create("f", InodeType::File, InodeMode::from_bits_truncate(0o644))
            .unwrap();
        assert!(!child.is_dead());
        root.unlink("f").unwrap();
        assert!(child.is_dead());
    }

    #[test]
    fn mount_count_toggles_mounted_flag() {
        let (_fs, root) = new_root();
        let child = root
            .create("m", InodeType::Dir, InodeMode::from_bits_truncate(0o755))
            .unwrap();
        assert!(!child.is_mountpoint());
        child.inc_mount_count();
        child.inc_mount_count();
        assert!(child.is_mountpoint());
        assert_eq!(child.mount_count(), 2);
        child.dec_mount_count();
        assert!(child.is_mountpoint());
        child.dec_mount_count();
        assert!(!child.is_mountpoint());
    }
}

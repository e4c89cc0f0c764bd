// SPDX-License-Identifier: MPL-2.0

//! The path layer: dentries, mounts, and namespaces.
//!
//! A [`Path`] names a location as a (mount, dentry) pair. The same dentry
//! can be reached through different mounts (e.g. after a bind mount), so
//! neither half identifies a location alone.

mod dentry;
mod expiry;
mod mount;
mod mount_info;
mod mount_namespace;
mod mount_table;

pub use dentry::{Dentry, DentryKey};
pub use expiry::ExpiryList;
pub use mount::{MntFlags, Mount};
pub use mount_namespace::MountNamespace;
pub use mount_table::{lookup_mnt, lookup_mnt_all};

use crate::{
    fs::utils::{FileSystem, InodeMode, InodeType, NAME_MAX, PATH_MAX},
    prelude::*,
};

/// A location in a mount tree.
#[derive(Clone)]
pub struct Path {
    mount_node: Arc<Mount>,
    dentry: Arc<Dentry>,
}

impl Path {
    pub fn new(mount_node: Arc<Mount>, dentry: Arc<Dentry>) -> Self {
        Self { mount_node, dentry }
    }

    /// Creates a `Path` at the root of the given mount.
    pub fn new_fs_root(mount_node: Arc<Mount>) -> Self {
        let dentry = mount_node.root_dentry().clone();
        Self { mount_node, dentry }
    }

    pub fn mount_node(&self) -> &Arc<Mount> {
        &self.mount_node
    }

    pub fn dentry(&self) -> &Arc<Dentry> {
        &self.dentry
    }

    /// Checks whether this path is the root of its mount.
    ///
    /// A bind mount's root dentry may have a parent in its file system,
    /// so this compares against the mount's recorded root instead of
    /// asking the dentry.
    pub fn is_mount_root(&self) -> bool {
        Arc::ptr_eq(&self.dentry, self.mount_node.root_dentry())
    }

    /// Gets the name of the path as seen from its namespace.
    ///
    /// At a mount root, the visible name is the mountpoint's name in the
    /// parent mount.
    pub fn effective_name(&self) -> String {
        if !self.is_mount_root() {
            return self.dentry.name();
        }

        match (self.mount_node.parent(), self.mount_node.mountpoint()) {
            (Some(parent), Some(mountpoint)) => Path::new(parent, mountpoint).effective_name(),
            _ => self.dentry.name(),
        }
    }

    /// Gets the parent path as seen from its namespace, crossing mount
    /// boundaries. Returns `None` at the namespace root.
    pub fn effective_parent(&self) -> Option<Path> {
        if !self.is_mount_root() {
            let parent_dentry = self.dentry.parent()?;
            return Some(Path::new(self.mount_node.clone(), parent_dentry));
        }

        match (self.mount_node.parent(), self.mount_node.mountpoint()) {
            (Some(parent), Some(mountpoint)) => {
                Path::new(parent, mountpoint).effective_parent()
            }
            _ => None,
        }
    }

    /// Switches to the topmost mount stacked on this path, if any.
    fn top_path(self) -> Path {
        let mut path = self;
        while path.dentry.is_mountpoint() {
            let Some(child_mount) = lookup_mnt(&path.mount_node, &path.dentry) else {
                break;
            };
            path = Path::new_fs_root(child_mount);
        }
        path
    }

    /// Resolves `relative_path` starting from this path.
    ///
    /// Empty components and `.` are skipped; `..` stops at the namespace
    /// root. Whenever a component lands on a mountpoint, resolution
    /// continues in the mount stacked on top of it.
    pub fn lookup(&self, relative_path: &str) -> Result<Path> {
        if relative_path.len() > PATH_MAX {
            return_errno!(Errno::ENAMETOOLONG);
        }

        // The tree must not change shape while it is being walked.
        let ns = self.mount_node.namespace();
        let _guard = ns.as_ref().map(|ns| ns.read_guard());

        let mut path = self.clone();
        for name in relative_path.split('/').filter(|s| !s.is_empty()) {
            if name.len() > NAME_MAX {
                return_errno!(Errno::ENAMETOOLONG);
            }
            if path.dentry.type_() != InodeType::Dir {
                return_errno!(Errno::ENOTDIR);
            }

            match name {
                "." => continue,
                ".." => {
                    if let Some(parent) = path.effective_parent() {
                        path = parent;
                    }
                }
                _ => {
                    // Resolving a name inside a mount counts as using it.
                    path.mount_node.clear_expiry_mark();
                    let next_dentry = match path.dentry.lookup_via_cache(name)? {
                        Some(dentry) => dentry,
                        None => path.dentry.lookup_via_fs(name)?,
                    };
                    path = Path::new(path.mount_node.clone(), next_dentry).top_path();
                }
            }
        }
        Ok(path)
    }

    /// Gets the absolute path string from the namespace root.
    pub fn abs_path(&self) -> String {
        let mut path = self.effective_name();
        let mut dir = self.clone();
        while let Some(parent) = dir.effective_parent() {
            let parent_name = parent.effective_name();
            path = if parent_name == "/" {
                format!("/{}", path)
            } else {
                format!("{}/{}", parent_name, path)
            };
            dir = parent;
        }
        debug_assert!(path.starts_with('/'));
        path
    }

    /// Creates a child of this path by creating a new inode.
    pub fn new_fs_child(&self, name: &str, type_: InodeType, mode: InodeMode) -> Result<Path> {
        let new_dentry = self.dentry.create(name, type_, mode)?;
        Ok(Path::new(self.mount_node.clone(), new_dentry))
    }

    /// Deletes a regular-file child.
    pub fn unlink(&self, name: &str) -> Result<()> {
        self.dentry.unlink(name)
    }

    /// Deletes a directory child.
    pub fn rmdir(&self, name: &str) -> Result<()> {
        self.dentry.rmdir(name)
    }

    /// Mounts `fs` on this path.
    ///
    /// The caller must hold the namespace's tree lock exclusively.
    pub fn mount(&self, fs: Arc<dyn FileSystem>, devname: &str) -> Result<Arc<Mount>> {
        let Some(ns) = self.mount_node.namespace() else {
            return_errno_with_message!(Errno::ENOENT, "the target mount is no longer reachable");
        };
        let mount = Mount::new(fs, devname, Arc::downgrade(&ns));
        mount.graft_mount_tree(self)?;
        Ok(mount)
    }

    /// Bind-mounts this path onto `dst`, optionally with every mount
    /// beneath it.
    ///
    /// The caller must hold the namespace's tree lock exclusively.
    pub fn bind_mount_to(&self, dst: &Path, recursive: bool) -> Result<Arc<Mount>> {
        let new_mount = self.mount_node.clone_mount_tree(&self.dentry, recursive)?;
        if let Err(e) = new_mount.graft_mount_tree(dst) {
            Mount::umount_tree(&new_mount);
            return Err(e);
        }
        Ok(new_mount)
    }

    /// Moves the mount rooted at this path onto `dst`.
    ///
    /// The caller must hold the namespace's tree lock exclusively.
    pub fn move_mount_to(&self, dst: &Path) -> Result<()> {
        let mount = self.mount_node.clone();
        if !self.is_mount_root() {
            return_errno_with_message!(Errno::EINVAL, "can only move a whole mount");
        }
        if !mount.is_attached() {
            return_errno_with_message!(Errno::EINVAL, "cannot move an unattached mount");
        }

        // Moving a mount beneath itself would disconnect the subtree
        // from the rest of the tree while keeping it self-reachable.
        let mut node = Some(dst.mount_node.clone());
        while let Some(current) = node {
            if Arc::ptr_eq(&current, &mount) {
                return_errno_with_message!(Errno::ELOOP, "cannot move a mount beneath itself");
            }
            node = current.parent();
        }

        let (old_parent, old_mountpoint) = mount.detach().unwrap();
        if let Err(e) = mount.graft_mount_tree(dst) {
            // Put it back where it was.
            let _ = mount.attach(&old_parent, &old_mountpoint);
            return Err(e);
        }
        Ok(())
    }
}

impl Debug for Path {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("Path")
            .field("mount_node", &self.mount_node)
            .field("dentry", &self.dentry)
            .finish()
    }
}

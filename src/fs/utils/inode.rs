// SPDX-License-Identifier: MPL-2.0

use super::FileSystem;
use crate::prelude::*;

/// The type of an inode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeType {
    Dir,
    File,
}

impl InodeType {
    pub fn is_directory(&self) -> bool {
        *self == InodeType::Dir
    }
}

bitflags! {
    /// The mode bits of an inode.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct InodeMode: u16 {
        /// Read by owner.
        const S_IRUSR = 0o0400;
        /// Write by owner.
        const S_IWUSR = 0o0200;
        /// Execute/search by owner.
        const S_IXUSR = 0o0100;
        /// Read by group.
        const S_IRGRP = 0o0040;
        /// Write by group.
        const S_IWGRP = 0o0020;
        /// Execute/search by group.
        const S_IXGRP = 0o0010;
        /// Read by others.
        const S_IROTH = 0o0004;
        /// Write by others.
        const S_IWOTH = 0o0002;
        /// Execute/search by others.
        const S_IXOTH = 0o0001;
    }
}

/// The interface the mount layer consumes from an index node.
///
/// Only the operations needed to form and maintain the mount tree are
/// present here; data I/O belongs to other subsystems.
pub trait Inode: Any + Send + Sync {
    /// Gets the inode number.
    fn ino(&self) -> u64;

    /// Gets the type of this inode.
    fn type_(&self) -> InodeType;

    /// Gets the file system this inode belongs to.
    fn fs(&self) -> Arc<dyn FileSystem>;

    /// Looks up a child inode by name.
    fn lookup(&self, _name: &str) -> Result<Arc<dyn Inode>> {
        return_errno!(Errno::ENOTDIR)
    }

    /// Creates a child inode of the given type.
    fn create(&self, _name: &str, _type_: InodeType, _mode: InodeMode) -> Result<Arc<dyn Inode>> {
        return_errno!(Errno::ENOTDIR)
    }

    /// Removes a non-directory child.
    fn unlink(&self, _name: &str) -> Result<()> {
        return_errno!(Errno::ENOTDIR)
    }

    /// Removes a directory child.
    fn rmdir(&self, _name: &str) -> Result<()> {
        return_errno!(Errno::ENOTDIR)
    }

    /// Flushes this inode to the backing store.
    fn sync(&self) -> Result<()> {
        Ok(())
    }

    /// Whether dentries for this inode may be cached.
    fn is_dentry_cacheable(&self) -> bool {
        true
    }
}

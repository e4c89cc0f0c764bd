// SPDX-License-Identifier: MPL-2.0

use super::Inode;
use crate::prelude::*;

/// The super block of a file system instance.
#[derive(Debug, Clone)]
pub struct SuperBlock {
    pub magic: u64,
    pub bsize: usize,
    pub blocks: usize,
    pub bfree: usize,
    pub bavail: usize,
    pub files: usize,
    pub ffree: usize,
    pub fsid: u64,
    pub namelen: usize,
    pub frsize: usize,
    pub flags: u64,
}

impl SuperBlock {
    pub fn new(magic: u64, block_size: usize, name_max_len: usize) -> Self {
        Self {
            magic,
            bsize: block_size,
            blocks: 0,
            bfree: 0,
            bavail: 0,
            files: 0,
            ffree: 0,
            fsid: 0,
            namelen: name_max_len,
            frsize: block_size,
            flags: 0,
        }
    }
}

bitflags! {
    /// Flags for per file system.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FsFlags: u32 {
        /// The file system is mounted read-only.
        const RDONLY        =   1 << 0;
        /// Writes are synced at once.
        const SYNCHRONOUS   =   1 << 4;
        /// Allow mandatory locks on an FS.
        const MANDLOCK      =   1 << 6;
        /// Directory modifications are synchronous.
        const DIRSYNC       =   1 << 7;
        /// Suppress certain messages in kernel log.
        const SILENT        =   1 << 15;
        /// The file system refuses to serve as a mount target.
        const NOUSER        =   1 << 31;
    }
}

/// The interface the mount layer consumes from a mounted file system
/// instance.
///
/// A `FileSystem` may be shared by several [`Mount`]s (bind mounts and
/// namespace clones share the instance rather than copying it); the last
/// [`Mount`] dropping its reference releases the instance.
///
/// [`Mount`]: crate::fs::path::Mount
pub trait FileSystem: Any + Send + Sync {
    /// Flushes all pending metadata and cached data to the backing store.
    fn sync(&self) -> Result<()>;

    /// Gets the root inode, which forms the root dentry of every mount of
    /// this instance.
    fn root_inode(&self) -> Arc<dyn Inode>;

    /// Gets the super block.
    fn sb(&self) -> SuperBlock;

    /// Gets the FS-level flags.
    fn flags(&self) -> FsFlags;

    /// Gets the name of this file system's type, e.g. `"ramfs"`.
    fn fs_type(&self) -> &'static str;

    /// Re-applies FS-level flags during a remount.
    fn remount(&self, flags: FsFlags) -> Result<()> {
        let _ = flags;
        Ok(())
    }

    /// Asks the FS to abort in-flight operations before a forced unmount.
    fn umount_begin(&self) {}
}

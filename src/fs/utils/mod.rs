// SPDX-License-Identifier: MPL-2.0

//! VFS interfaces consumed by the mount layer.

mod fs;
mod inode;

pub use fs::{FileSystem, FsFlags, SuperBlock};
pub use inode::{Inode, InodeMode, InodeType};

/// The maximum length of a file name.
pub const NAME_MAX: usize = 255;
/// The maximum length of a path.
pub const PATH_MAX: usize = 4096;

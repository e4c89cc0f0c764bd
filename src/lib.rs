// SPDX-License-Identifier: MPL-2.0

//! Mount tree and mount namespace management.
//!
//! This crate implements the VFS layer that decides how file system
//! instances are attached to each other and to per-process views of the
//! directory tree: [`Mount`] nodes forming a forest, hash-based mountpoint
//! lookup, namespace cloning for process isolation, bind/move/pivot
//! operations and lazy expiry of idle mounts.
//!
//! The actual file systems are consumed through the narrow
//! [`FileSystem`]/[`Inode`] interfaces in [`fs::utils`]; an in-memory
//! [`RamFS`] is provided as the initial root and for testing.
//!
//! [`Mount`]: crate::fs::path::Mount
//! [`FileSystem`]: crate::fs::utils::FileSystem
//! [`Inode`]: crate::fs::utils::Inode
//! [`RamFS`]: crate::fs::ramfs::RamFS

#![no_std]
#![deny(unsafe_code)]

extern crate alloc;
#[cfg(test)]
extern crate std;

pub mod context;
pub mod error;
pub mod fs;
mod prelude;
pub mod security;
pub mod syscall;

pub use error::{Errno, Error, Result};

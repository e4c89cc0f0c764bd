// SPDX-License-Identifier: MPL-2.0

//! Ramfs-based volatile memory file system.

pub use fs::{RamFS, RamFsType};

mod fs;

const RAMFS_MAGIC: u64 = 0x858458f6;
const BLOCK_SIZE: usize = 4096;
const ROOT_INO: u64 = 1;

// SPDX-License-Identifier: MPL-2.0

//! The mount-related syscall surface.

mod mount;
mod pivot_root;
mod umount;

pub use mount::{sys_mount, MountFlags};
pub use pivot_root::sys_pivot_root;
pub use umount::{sys_umount, UmountFlags};

// SPDX-License-Identifier: MPL-2.0

use crate::{
    context::{CapSet, Context},
    fs::{
        fs_resolver::FsPath,
        path::{MntFlags, Mount},
        utils::FsFlags,
    },
    prelude::*,
    security,
};

/// The `umount2` syscall.
pub fn sys_umount(pathname: &str, flags: u64, ctx: &Context) -> Result<()> {
    debug!("umount: path = {:?}, flags = {:#x}", pathname, flags);

    let flags = UmountFlags::from_bits(flags as u32)
        .ok_or_else(|| Error::with_message(Errno::EINVAL, "invalid umount flags"))?;
    if flags.contains(UmountFlags::MNT_EXPIRE)
        && flags.intersects(UmountFlags::MNT_FORCE | UmountFlags::MNT_DETACH)
    {
        return_errno_with_message!(Errno::EINVAL, "MNT_EXPIRE excludes force and detach");
    }
    ctx.credentials().check_cap(CapSet::SYS_ADMIN)?;

    let path = ctx.fs().read().lookup(&FsPath::new(pathname)?)?;
    let ns = ctx.mnt_ns();
    if !ns.owns(path.mount_node()) {
        return_errno_with_message!(Errno::EINVAL, "the path is outside the caller's namespace");
    }
    if !path.is_mount_root() {
        return_errno_with_message!(Errno::EINVAL, "the path is not a mountpoint");
    }
    let mount = path.mount_node().clone();
    security::hooks().check_umount(&mount, flags)?;

    // The namespace root cannot be unmounted; the nearest equivalent is
    // forcing it read-only.
    if mount.is_root_of_namespace() {
        let _guard = ns.write_guard();
        mount.fs().remount(FsFlags::RDONLY)?;
        mount.set_flags(mount.flags() | MntFlags::RDONLY);
        return Ok(());
    }

    let _guard = ns.write_guard();
    if !mount.is_attached() {
        return_errno_with_message!(Errno::ENOENT, "the mount is already unmounted");
    }

    if flags.contains(UmountFlags::MNT_EXPIRE) && !mount.test_and_set_expiry_mark() {
        // First call only marks; the mount goes away on the second call
        // if nothing used it in between.
        return_errno!(Errno::EAGAIN);
    }

    if !flags.intersects(UmountFlags::MNT_FORCE | UmountFlags::MNT_DETACH) {
        // Two extra references on the root: `path` and the local clone.
        // Expiry-watch references are discounted by the check itself, so
        // a failed umount leaves the watch lists untouched.
        if mount.is_busy(2) {
            return_errno_with_message!(Errno::EBUSY, "the mount is in use");
        }
    }

    if flags.contains(UmountFlags::MNT_FORCE) {
        warn!("forcibly unmounting {:?}", mount);
        mount.fs().umount_begin();
    }
    Mount::umount_tree(&mount);
    Ok(())
}

bitflags! {
    /// Flags to the `umount2` syscall.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct UmountFlags: u32 {
        /// Abort in-flight requests and unmount even if busy.
        const MNT_FORCE       = 1 << 0;
        /// Detach now, clean up once the mount falls idle.
        const MNT_DETACH      = 1 << 1;
        /// Two-call expiry: mark first, unmount if still unused.
        const MNT_EXPIRE      = 1 << 2;
        /// Do not follow a trailing symlink.
        const UMOUNT_NOFOLLOW = 1 << 3;
    }
}

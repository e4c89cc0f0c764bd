// SPDX-License-Identifier: MPL-2.0

use crate::{
    context::{CapSet, Context},
    fs::{
        fs_resolver::FsPath,
        path::{MntFlags, Path},
        registry::{self, FsProperties},
        utils::{FsFlags, InodeType},
    },
    prelude::*,
    security,
};

/// The `mount` syscall.
///
/// Which operation runs is selected by `flags`: remount, bind, move, or
/// a new mount of the FS type named by `fstype`.
pub fn sys_mount(
    devname: &str,
    dirname: &str,
    fstype: Option<&str>,
    flags: u64,
    data: Option<&str>,
    ctx: &Context,
) -> Result<()> {
    debug!(
        "mount: devname = {:?}, dirname = {:?}, fstype = {:?}, flags = {:#x}",
        devname, dirname, fstype, flags
    );

    // Discard the old magic prefix, if any.
    let mut flags = flags;
    if flags & MS_MGC_MSK == MS_MGC_VAL {
        flags &= !MS_MGC_MSK;
    }
    let mount_flags = MountFlags::from_bits_truncate(flags as u32);

    let dst_path = ctx.fs().read().lookup(&FsPath::new(dirname)?)?;
    check_mnt(ctx, &dst_path)?;

    if mount_flags.contains(MountFlags::MS_REMOUNT | MountFlags::MS_BIND) {
        do_reconfigure_mnt(&dst_path, mount_flags, ctx)
    } else if mount_flags.contains(MountFlags::MS_REMOUNT) {
        do_remount(&dst_path, mount_flags, data, ctx)
    } else if mount_flags.contains(MountFlags::MS_BIND) {
        do_bind_mount(
            devname,
            &dst_path,
            mount_flags.contains(MountFlags::MS_REC),
            ctx,
        )
    } else if mount_flags.intersects(
        MountFlags::MS_SHARED
            | MountFlags::MS_PRIVATE
            | MountFlags::MS_SLAVE
            | MountFlags::MS_UNBINDABLE,
    ) {
        return_errno_with_message!(Errno::EINVAL, "changing mount propagation is not supported");
    } else if mount_flags.contains(MountFlags::MS_MOVE) {
        do_move_mount_old(devname, &dst_path, ctx)
    } else {
        do_new_mount(devname, fstype, &dst_path, mount_flags, data, ctx)
    }
}

/// Checks that `path` lives in the caller's mount namespace.
fn check_mnt(ctx: &Context, path: &Path) -> Result<()> {
    if !ctx.mnt_ns().owns(path.mount_node()) {
        return_errno_with_message!(Errno::EINVAL, "the path is outside the caller's namespace");
    }
    Ok(())
}

/// Changes the per-mount flags without touching the file system.
fn do_reconfigure_mnt(dst_path: &Path, mount_flags: MountFlags, ctx: &Context) -> Result<()> {
    ctx.credentials().check_cap(CapSet::SYS_ADMIN)?;
    if !dst_path.is_mount_root() {
        return_errno_with_message!(Errno::EINVAL, "can only remount a whole mount");
    }

    let mount = dst_path.mount_node();
    let mnt_flags = mount_flags.as_mnt_flags();
    security::hooks().check_remount(mount, mnt_flags)?;

    let ns = ctx.mnt_ns();
    let _guard = ns.write_guard();
    mount.set_flags(mnt_flags);
    Ok(())
}

/// Changes a mount's flags and asks its file system to reconfigure.
fn do_remount(
    dst_path: &Path,
    mount_flags: MountFlags,
    _data: Option<&str>,
    ctx: &Context,
) -> Result<()> {
    ctx.credentials().check_cap(CapSet::SYS_ADMIN)?;
    if !dst_path.is_mount_root() {
        return_errno_with_message!(Errno::EINVAL, "can only remount a whole mount");
    }

    let mount = dst_path.mount_node();
    let mnt_flags = mount_flags.as_mnt_flags();
    security::hooks().check_remount(mount, mnt_flags)?;

    let ns = ctx.mnt_ns();
    let _guard = ns.write_guard();
    if mount.namespace().is_none() {
        return_errno_with_message!(Errno::ENOENT, "the mount is no longer reachable");
    }
    mount.fs().remount(mount_flags.as_fs_flags())?;
    mount.set_flags(mnt_flags);
    Ok(())
}

/// Mounts an existing subtree at a second location.
fn do_bind_mount(src_name: &str, dst_path: &Path, recursive: bool, ctx: &Context) -> Result<()> {
    ctx.credentials().check_cap(CapSet::SYS_ADMIN)?;
    let src_path = ctx.fs().read().lookup(&FsPath::new(src_name)?)?;
    check_mnt(ctx, &src_path)?;

    let ns = ctx.mnt_ns();
    let _guard = ns.write_guard();
    src_path.bind_mount_to(dst_path, recursive)?;
    Ok(())
}

/// The `MS_MOVE` form of `mount`: detaches a mount and reattaches it at
/// the destination.
fn do_move_mount_old(src_name: &str, dst_path: &Path, ctx: &Context) -> Result<()> {
    ctx.credentials().check_cap(CapSet::SYS_ADMIN)?;
    let src_path = ctx.fs().read().lookup(&FsPath::new(src_name)?)?;
    check_mnt(ctx, &src_path)?;

    let ns = ctx.mnt_ns();
    let _guard = ns.write_guard();
    src_path.move_mount_to(dst_path)
}

/// Creates a file system instance and mounts it.
fn do_new_mount(
    devname: &str,
    fstype: Option<&str>,
    target: &Path,
    mount_flags: MountFlags,
    data: Option<&str>,
    ctx: &Context,
) -> Result<()> {
    ctx.credentials().check_cap(CapSet::SYS_ADMIN)?;
    let fstype = fstype.filter(|ty| !ty.is_empty()).ok_or_else(|| {
        Error::with_message(Errno::EINVAL, "a new mount must name a file system type")
    })?;
    if target.dentry().type_() != InodeType::Dir {
        return_errno!(Errno::ENOTDIR);
    }

    let fs_type = registry::look_up(fstype)
        .ok_or_else(|| Error::with_message(Errno::ENODEV, "the FS type is not registered"))?;
    if fs_type.properties().contains(FsProperties::NEED_SOURCE) && devname.is_empty() {
        return_errno_with_message!(Errno::ENOENT, "the FS type requires a source");
    }

    let fs = fs_type.create(data, devname)?;
    if fs.flags().contains(FsFlags::NOUSER) {
        return_errno_with_message!(Errno::EINVAL, "the FS type cannot be mounted by users");
    }

    let ns = ctx.mnt_ns();
    let _guard = ns.write_guard();
    let mount = target.mount(fs, devname)?;
    mount.set_flags(mount_flags.as_mnt_flags());
    Ok(())
}

impl MountFlags {
    /// Extracts the per-mount flags.
    fn as_mnt_flags(&self) -> MntFlags {
        let mut flags = MntFlags::empty();
        for (ms, mnt) in [
            (Self::MS_RDONLY, MntFlags::RDONLY),
            (Self::MS_NOSUID, MntFlags::NOSUID),
            (Self::MS_NODEV, MntFlags::NODEV),
            (Self::MS_NOEXEC, MntFlags::NOEXEC),
            (Self::MS_NOATIME, MntFlags::NOATIME),
            (Self::MS_NODIRATIME, MntFlags::NODIRATIME),
        ] {
            if self.contains(ms) {
                flags |= mnt;
            }
        }
        flags
    }

    /// Extracts the FS-level flags.
    fn as_fs_flags(&self) -> FsFlags {
        let mut flags = FsFlags::empty();
        for (ms, fs) in [
            (Self::MS_RDONLY, FsFlags::RDONLY),
            (Self::MS_SYNCHRONOUS, FsFlags::SYNCHRONOUS),
            (Self::MS_MANDLOCK, FsFlags::MANDLOCK),
            (Self::MS_DIRSYNC, FsFlags::DIRSYNC),
            (Self::MS_SILENT, FsFlags::SILENT),
        ] {
            if self.contains(ms) {
                flags |= fs;
            }
        }
        flags
    }
}

const MS_MGC_VAL: u64 = 0xC0ED_0000;
const MS_MGC_MSK: u64 = 0xffff_0000;

bitflags! {
    /// Flags to the `mount` syscall, as Linux defines them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MountFlags: u32 {
        /// Mount read-only.
        const MS_RDONLY      = 1 << 0;
        /// Ignore suid and sgid bits.
        const MS_NOSUID      = 1 << 1;
        /// Disallow access to device special files.
        const MS_NODEV       = 1 << 2;
        /// Disallow program execution.
        const MS_NOEXEC      = 1 << 3;
        /// Writes are synced at once.
        const MS_SYNCHRONOUS = 1 << 4;
        /// Alter flags of a mounted FS.
        const MS_REMOUNT     = 1 << 5;
        /// Allow mandatory locks on an FS.
        const MS_MANDLOCK    = 1 << 6;
        /// Directory modifications are synchronous.
        const MS_DIRSYNC     = 1 << 7;
        /// Do not follow symlinks.
        const MS_NOSYMFOLLOW = 1 << 8;
        /// Do not update access times.
        const MS_NOATIME     = 1 << 10;
        /// Do not update directory access times.
        const MS_NODIRATIME  = 1 << 11;
        /// Bind a subtree elsewhere.
        const MS_BIND        = 1 << 12;
        /// Move a subtree.
        const MS_MOVE        = 1 << 13;
        /// Apply to the whole subtree.
        const MS_REC         = 1 << 14;
        /// Suppress certain messages in kernel log.
        const MS_SILENT      = 1 << 15;
        /// VFS does not apply the umask.
        const MS_POSIXACL    = 1 << 16;
        /// Change to unbindable.
        const MS_UNBINDABLE  = 1 << 17;
        /// Change to private.
        const MS_PRIVATE     = 1 << 18;
        /// Change to slave.
        const MS_SLAVE       = 1 << 19;
        /// Change to shared.
        const MS_SHARED      = 1 << 20;
        /// Update atime relative to mtime/ctime.
        const MS_RELATIME    = 1 << 21;
        /// This is a kern_mount call.
        const MS_KERNMOUNT   = 1 << 22;
        /// Update inode I_version field.
        const MS_I_VERSION   = 1 << 23;
        /// Always perform atime updates.
        const MS_STRICTATIME = 1 << 24;
        /// Update timestamps on write access.
        const MS_LAZYTIME    = 1 << 25;
    }
}

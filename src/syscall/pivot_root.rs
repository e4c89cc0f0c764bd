// SPDX-License-Identifier: MPL-2.0

use crate::{
    context::{CapSet, Context},
    fs::{
        fs_resolver::FsPath,
        path::Path,
        utils::InodeType,
    },
    prelude::*,
    security,
};

/// The `pivot_root` syscall.
///
/// Makes the mount at `new_root` the root of the caller's namespace and
/// reattaches the previous root under `put_old`, which must be a
/// directory beneath `new_root`.
pub fn sys_pivot_root(new_root: &str, put_old: &str, ctx: &Context) -> Result<()> {
    debug!("pivot_root: new_root = {:?}, put_old = {:?}", new_root, put_old);

    ctx.credentials().check_cap(CapSet::SYS_ADMIN)?;

    let new_root_path = ctx.fs().read().lookup(&FsPath::new(new_root)?)?;
    let put_old_path = ctx.fs().read().lookup(&FsPath::new(put_old)?)?;

    security::hooks().check_pivot_root(&new_root_path, &put_old_path)?;

    if new_root_path.dentry().type_() != InodeType::Dir
        || put_old_path.dentry().type_() != InodeType::Dir
    {
        return_errno!(Errno::ENOTDIR);
    }

    // Both paths were resolved without the tree lock, so every check
    // against the tree's shape runs under the exclusive guard.
    let ns = ctx.mnt_ns();
    let _guard = ns.write_guard();
    if !ns.owns(new_root_path.mount_node()) || !ns.owns(put_old_path.mount_node()) {
        return_errno_with_message!(Errno::EINVAL, "the paths are outside the caller's namespace");
    }
    if !new_root_path.is_mount_root() {
        return_errno_with_message!(Errno::EINVAL, "the new root is not a mountpoint");
    }

    let new_mnt = new_root_path.mount_node().clone();
    let root_mnt = ns.root();
    if Arc::ptr_eq(&new_mnt, &root_mnt) {
        return_errno_with_message!(Errno::EBUSY, "the new root is already the root");
    }
    if Arc::ptr_eq(put_old_path.mount_node(), new_root_path.mount_node())
        && Arc::ptr_eq(put_old_path.dentry(), new_root_path.dentry())
    {
        return_errno_with_message!(Errno::EBUSY, "put_old is the same as the new root");
    }
    if !new_mnt.is_attached() {
        return_errno_with_message!(Errno::EINVAL, "the new root is not attached");
    }
    check_put_old_under_new_root(&put_old_path, &new_root_path)?;

    // The new root leaves its old place, the old root goes under
    // `put_old`, and the namespace is re-rooted.
    let (old_parent, old_mountpoint) = new_mnt.detach().unwrap();
    if let Err(e) = root_mnt.attach(put_old_path.mount_node(), put_old_path.dentry()) {
        let _ = new_mnt.attach(&old_parent, &old_mountpoint);
        return Err(e);
    }
    ns.set_root(new_mnt.clone());

    // Every resolver that viewed the tree through the old root follows
    // it to the new one, not just the calling context's.
    let new_root_top = Path::new_fs_root(new_mnt);
    for resolver in ns.tracked_resolvers() {
        let mut resolver = resolver.write();
        if Arc::ptr_eq(resolver.root().mount_node(), &root_mnt) {
            resolver.set_root(new_root_top.clone());
        }
        if Arc::ptr_eq(resolver.cwd().mount_node(), &root_mnt) {
            resolver.set_cwd(new_root_top.clone());
        }
    }
    Ok(())
}

/// Checks that `put_old` lies beneath `new_root` in the mount tree, by
/// climbing mount crossings from `put_old` upwards.
fn check_put_old_under_new_root(put_old: &Path, new_root: &Path) -> Result<()> {
    let mut mnt = put_old.mount_node().clone();
    let mut dentry = put_old.dentry().clone();
    loop {
        if Arc::ptr_eq(&mnt, new_root.mount_node()) {
            let new_root_dentry = new_root.mount_node().root_dentry();
            if Arc::ptr_eq(&dentry, new_root_dentry) || dentry.is_descendant_of(new_root_dentry) {
                return Ok(());
            }
            return_errno_with_message!(Errno::EINVAL, "put_old is not underneath the new root");
        }
        match (mnt.parent(), mnt.mountpoint()) {
            (Some(parent), Some(mountpoint)) => {
                dentry = mountpoint;
                mnt = parent;
            }
            _ => {
                return_errno_with_message!(Errno::EINVAL, "put_old is not underneath the new root")
            }
        }
    }
}

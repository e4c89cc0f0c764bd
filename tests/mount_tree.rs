// SPDX-License-Identifier: MPL-2.0

//! Mounting, unmounting, moving, and remounting file systems.

mod common;

use common::{mkdir_p, new_context, resolve, touch};
use mountns::{
    context::{Context, Credentials},
    fs::path::{lookup_mnt, lookup_mnt_all, MntFlags},
    syscall::{sys_mount, sys_umount, MountFlags, UmountFlags},
    Errno,
};

#[test]
fn mount_attaches_and_umount_detaches() {
    let (_ns, ctx) = new_context();
    mkdir_p(&ctx, "/m");

    sys_mount("tmp", "/m", Some("ramfs"), 0, None, &ctx).unwrap();

    let mountpoint = resolve(&ctx, "/m").unwrap();
    assert!(mountpoint.is_mount_root());
    assert_eq!(mountpoint.abs_path(), "/m");
    assert_eq!(mountpoint.mount_node().devname(), "tmp");

    // The hash table and the tree agree on what is mounted where.
    let parent = mountpoint.mount_node().parent().unwrap();
    let dentry = mountpoint.mount_node().mountpoint().unwrap();
    assert!(dentry.is_mountpoint());
    assert_eq!(dentry.mount_count(), 1);
    let hashed = lookup_mnt(&parent, &dentry).unwrap();
    assert_eq!(hashed.id(), mountpoint.mount_node().id());

    // A recursive sync from the root reaches the new mount.
    parent.sync().unwrap();

    // Drop our references so the mount is no longer busy.
    drop(hashed);
    drop(mountpoint);
    sys_umount("/m", 0, &ctx).unwrap();
    let plain = resolve(&ctx, "/m").unwrap();
    assert!(!plain.dentry().is_mountpoint());
    assert_eq!(plain.dentry().mount_count(), 0);
    assert!(lookup_mnt(&parent, &dentry).is_none());
}

#[test]
fn stacked_mounts_shadow_most_recent_wins() {
    let (_ns, ctx) = new_context();
    mkdir_p(&ctx, "/m");

    sys_mount("first", "/m", Some("ramfs"), 0, None, &ctx).unwrap();
    let first_id = resolve(&ctx, "/m").unwrap().mount_node().id();
    sys_mount("second", "/m", Some("ramfs"), 0, None, &ctx).unwrap();

    // Lookup lands on the top of the stack.
    let top = resolve(&ctx, "/m").unwrap();
    assert_eq!(top.mount_node().devname(), "second");

    // The stack is a chain: the later mount sits on the root dentry of
    // the earlier one.
    let first = top.mount_node().parent().unwrap();
    assert_eq!(first.id(), first_id);
    let root_mnt = ctx.fs().read().root().mount_node().clone();
    let m_dentry = first.mountpoint().unwrap();
    assert_eq!(lookup_mnt(&root_mnt, &m_dentry).unwrap().id(), first_id);
    assert_eq!(lookup_mnt_all(&root_mnt, &m_dentry).len(), 1);
    assert_eq!(
        lookup_mnt(&first, first.root_dentry()).unwrap().id(),
        top.mount_node().id()
    );

    // Unmounting the top reveals the shadowed mount again.
    drop(top);
    sys_umount("/m", 0, &ctx).unwrap();
    let revealed = resolve(&ctx, "/m").unwrap();
    assert_eq!(revealed.mount_node().id(), first_id);
}

#[test]
fn busy_mount_refuses_plain_umount() {
    let (_ns, ctx) = new_context();
    mkdir_p(&ctx, "/m");
    sys_mount("tmp", "/m", Some("ramfs"), 0, None, &ctx).unwrap();

    let held = resolve(&ctx, "/m").unwrap();
    let err = sys_umount("/m", 0, &ctx).unwrap_err();
    assert_eq!(err.error(), Errno::EBUSY);

    // A lazy detach succeeds regardless.
    drop(held);
    sys_umount("/m", 0, &ctx).unwrap();
}

#[test]
fn detach_flag_unmounts_a_busy_mount() {
    let (_ns, ctx) = new_context();
    mkdir_p(&ctx, "/m");
    sys_mount("tmp", "/m", Some("ramfs"), 0, None, &ctx).unwrap();

    let held = resolve(&ctx, "/m").unwrap();
    sys_umount("/m", UmountFlags::MNT_DETACH.bits() as u64, &ctx).unwrap();

    // The held path still works against the detached mount.
    assert!(held.is_mount_root());
    assert!(!held.mount_node().is_attached());
    assert!(!resolve(&ctx, "/m").unwrap().dentry().is_mountpoint());
}

#[test]
fn moving_a_mount_relocates_its_subtree() {
    let (_ns, ctx) = new_context();
    mkdir_p(&ctx, "/a");
    mkdir_p(&ctx, "/b");
    sys_mount("tmp", "/a", Some("ramfs"), 0, None, &ctx).unwrap();
    mkdir_p(&ctx, "/a/inner");
    sys_mount("inner", "/a/inner", Some("ramfs"), 0, None, &ctx).unwrap();
    touch(&ctx, "/a/inner/file");

    sys_mount("/a", "/b", None, MountFlags::MS_MOVE.bits() as u64, None, &ctx).unwrap();

    assert!(!resolve(&ctx, "/a").unwrap().dentry().is_mountpoint());
    let moved = resolve(&ctx, "/b").unwrap();
    assert_eq!(moved.mount_node().devname(), "tmp");
    // The submount moved along with its parent.
    resolve(&ctx, "/b/inner/file").unwrap();
    assert_eq!(resolve(&ctx, "/b/inner").unwrap().abs_path(), "/b/inner");
}

#[test]
fn moving_a_mount_beneath_itself_fails() {
    let (_ns, ctx) = new_context();
    mkdir_p(&ctx, "/a");
    sys_mount("tmp", "/a", Some("ramfs"), 0, None, &ctx).unwrap();
    mkdir_p(&ctx, "/a/sub");

    let err = sys_mount(
        "/a",
        "/a/sub",
        None,
        MountFlags::MS_MOVE.bits() as u64,
        None,
        &ctx,
    )
    .unwrap_err();
    assert_eq!(err.error(), Errno::ELOOP);
    // The mount stayed where it was.
    assert_eq!(resolve(&ctx, "/a").unwrap().mount_node().devname(), "tmp");
}

#[test]
fn remount_changes_flags() {
    let (ns, ctx) = new_context();
    mkdir_p(&ctx, "/m");
    sys_mount("tmp", "/m", Some("ramfs"), 0, None, &ctx).unwrap();

    let flags = (MountFlags::MS_REMOUNT | MountFlags::MS_RDONLY | MountFlags::MS_NOEXEC).bits();
    sys_mount("", "/m", None, flags as u64, None, &ctx).unwrap();

    let mount = resolve(&ctx, "/m").unwrap().mount_node().clone();
    assert!(mount.flags().contains(MntFlags::RDONLY | MntFlags::NOEXEC));
    assert!(ns.read_mounts().contains("tmp /m ramfs ro,noexec 0 0"));

    // Remounting somewhere that is not a mount root is refused.
    mkdir_p(&ctx, "/m/sub");
    let err = sys_mount("", "/m/sub", None, flags as u64, None, &ctx).unwrap_err();
    assert_eq!(err.error(), Errno::EINVAL);
}

#[test]
fn reconfigure_touches_mount_flags_only() {
    let (_ns, ctx) = new_context();
    mkdir_p(&ctx, "/m");
    sys_mount("tmp", "/m", Some("ramfs"), 0, None, &ctx).unwrap();

    let flags = (MountFlags::MS_REMOUNT | MountFlags::MS_BIND | MountFlags::MS_NOSUID).bits();
    sys_mount("", "/m", None, flags as u64, None, &ctx).unwrap();
    let mount = resolve(&ctx, "/m").unwrap().mount_node().clone();
    assert_eq!(mount.flags(), MntFlags::NOSUID);
}

#[test]
fn umounting_the_namespace_root_makes_it_read_only() {
    let (ns, ctx) = new_context();
    sys_umount("/", 0, &ctx).unwrap();
    assert!(ns.root().flags().contains(MntFlags::RDONLY));
    // It is still the root; nothing got detached.
    assert!(ns.read_mounts().starts_with("rootfs / ramfs ro"));
}

#[test]
fn mounting_over_the_root_is_allowed() {
    let (ns, ctx) = new_context();
    sys_mount("over", "/", Some("ramfs"), 0, None, &ctx).unwrap();
    let mounts = ns.read_mounts();
    assert!(mounts.contains("rootfs / ramfs rw 0 0"));
    assert!(mounts.contains("over / ramfs rw 0 0"));
}

#[test]
fn mount_argument_errors() {
    let (_ns, ctx) = new_context();
    mkdir_p(&ctx, "/m");

    // An unregistered FS type.
    let err = sys_mount("tmp", "/m", Some("nosuchfs"), 0, None, &ctx).unwrap_err();
    assert_eq!(err.error(), Errno::ENODEV);

    // A new mount must name its FS type.
    let err = sys_mount("tmp", "/m", None, 0, None, &ctx).unwrap_err();
    assert_eq!(err.error(), Errno::EINVAL);

    // A nonexistent mountpoint.
    let err = sys_mount("tmp", "/nope", Some("ramfs"), 0, None, &ctx).unwrap_err();
    assert_eq!(err.error(), Errno::ENOENT);

    // A file cannot host a new (directory-rooted) mount.
    touch(&ctx, "/m/file");
    let err = sys_mount("tmp", "/m/file", Some("ramfs"), 0, None, &ctx).unwrap_err();
    assert_eq!(err.error(), Errno::ENOTDIR);

    // Mount propagation types are not supported.
    let err = sys_mount(
        "",
        "/m",
        None,
        MountFlags::MS_SHARED.bits() as u64,
        None,
        &ctx,
    )
    .unwrap_err();
    assert_eq!(err.error(), Errno::EINVAL);
}

#[test]
fn umount_argument_errors() {
    let (ns, ctx) = new_context();
    mkdir_p(&ctx, "/m");
    mkdir_p(&ctx, "/plain");
    sys_mount("tmp", "/m", Some("ramfs"), 0, None, &ctx).unwrap();

    // Not a mountpoint.
    let err = sys_umount("/plain", 0, &ctx).unwrap_err();
    assert_eq!(err.error(), Errno::EINVAL);

    // Unknown flag bits.
    let err = sys_umount("/m", 1 << 10, &ctx).unwrap_err();
    assert_eq!(err.error(), Errno::EINVAL);

    // MNT_EXPIRE cannot be combined with force or detach.
    let flags = (UmountFlags::MNT_EXPIRE | UmountFlags::MNT_DETACH).bits();
    let err = sys_umount("/m", flags as u64, &ctx).unwrap_err();
    assert_eq!(err.error(), Errno::EINVAL);

    let ctx_user = Context::new(ns.clone(), Credentials::new_user());
    let err = sys_umount("/m", 0, &ctx_user).unwrap_err();
    assert_eq!(err.error(), Errno::EPERM);
}

#[test]
fn unprivileged_callers_cannot_mount() {
    let (ns, _ctx) = new_context();
    let ctx = Context::new(ns, Credentials::new_user());
    mkdir_p(&ctx, "/m");

    let err = sys_mount("tmp", "/m", Some("ramfs"), 0, None, &ctx).unwrap_err();
    assert_eq!(err.error(), Errno::EPERM);
}

#[test]
fn unlinking_a_mountpoint_is_refused() {
    let (_ns, ctx) = new_context();
    mkdir_p(&ctx, "/dir/m");
    sys_mount("tmp", "/dir/m", Some("ramfs"), 0, None, &ctx).unwrap();

    let dir = resolve(&ctx, "/dir").unwrap();
    let err = dir.rmdir("m").unwrap_err();
    assert_eq!(err.error(), Errno::EBUSY);
}

#[test]
fn special_characters_in_sources_are_escaped() {
    let (ns, ctx) = new_context();
    mkdir_p(&ctx, "/m");
    sys_mount("dev name\twith\njunk\\", "/m", Some("ramfs"), 0, None, &ctx).unwrap();
    assert!(ns
        .read_mounts()
        .contains("dev\\040name\\011with\\012junk\\134 /m ramfs rw 0 0"));
}

#[test]
fn magic_flag_prefix_is_ignored() {
    let (_ns, ctx) = new_context();
    mkdir_p(&ctx, "/m");
    const MS_MGC_VAL: u64 = 0xC0ED_0000;
    sys_mount(
        "tmp",
        "/m",
        Some("ramfs"),
        MS_MGC_VAL | MountFlags::MS_RDONLY.bits() as u64,
        None,
        &ctx,
    )
    .unwrap();
    let mount = resolve(&ctx, "/m").unwrap().mount_node().clone();
    assert_eq!(mount.flags(), MntFlags::RDONLY);
}

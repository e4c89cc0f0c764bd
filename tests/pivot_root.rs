// SPDX-License-Identifier: MPL-2.0

//! Relocating the namespace root with `pivot_root`.

mod common;

use common::{mkdir_p, new_context, resolve, touch};
use mountns::{
    context::{Context, Credentials},
    syscall::{sys_mount, sys_pivot_root, sys_umount},
    Errno,
};
use std::sync::Arc;

#[test]
fn pivot_swaps_root_and_old_root() {
    let (ns, ctx) = new_context();
    mkdir_p(&ctx, "/newroot");
    sys_mount("newfs", "/newroot", Some("ramfs"), 0, None, &ctx).unwrap();
    mkdir_p(&ctx, "/newroot/oldroot");
    touch(&ctx, "/newroot/marker");

    let old_root = ns.root();
    sys_pivot_root("/newroot", "/newroot/oldroot", &ctx).unwrap();

    // The namespace is rooted on the new mount now.
    let new_root = ns.root();
    assert!(!Arc::ptr_eq(&old_root, &new_root));
    assert_eq!(new_root.devname(), "newfs");
    assert!(!new_root.is_attached());

    // The old root hangs under /oldroot.
    assert_eq!(old_root.mountpoint().unwrap().name(), "oldroot");
    let mounts = ns.read_mounts();
    assert!(mounts.starts_with("newfs / ramfs rw 0 0"));
    assert!(mounts.contains("rootfs /oldroot ramfs rw 0 0"));

    // The calling context was re-rooted; names resolve in the new fs.
    resolve(&ctx, "/marker").unwrap();
    resolve(&ctx, "/oldroot/newroot").unwrap();

    // The old root can be unmounted once nothing uses it.
    drop(old_root);
    sys_umount("/oldroot", 0, &ctx).unwrap();
    assert!(!ns.read_mounts().contains("oldroot"));
}

#[test]
fn pivot_migrates_every_context_in_the_namespace() {
    let (ns, ctx) = new_context();
    let other = Context::new(ns.clone(), Credentials::new_root());

    mkdir_p(&ctx, "/newroot");
    sys_mount("newfs", "/newroot", Some("ramfs"), 0, None, &ctx).unwrap();
    mkdir_p(&ctx, "/newroot/oldroot");
    touch(&ctx, "/newroot/marker");

    sys_pivot_root("/newroot", "/newroot/oldroot", &ctx).unwrap();

    // A context that did not make the call is re-rooted as well.
    let new_root = ns.root();
    assert!(Arc::ptr_eq(other.fs().read().root().mount_node(), &new_root));
    assert!(Arc::ptr_eq(other.fs().read().cwd().mount_node(), &new_root));
    resolve(&other, "/marker").unwrap();
}

#[test]
fn put_old_must_be_under_new_root() {
    let (_ns, ctx) = new_context();
    mkdir_p(&ctx, "/newroot");
    mkdir_p(&ctx, "/elsewhere");
    sys_mount("newfs", "/newroot", Some("ramfs"), 0, None, &ctx).unwrap();

    let err = sys_pivot_root("/newroot", "/elsewhere", &ctx).unwrap_err();
    assert_eq!(err.error(), Errno::EINVAL);
}

#[test]
fn new_root_must_be_a_mountpoint() {
    let (_ns, ctx) = new_context();
    mkdir_p(&ctx, "/plain/old");

    let err = sys_pivot_root("/plain", "/plain/old", &ctx).unwrap_err();
    assert_eq!(err.error(), Errno::EINVAL);
}

#[test]
fn pivoting_to_the_current_root_fails() {
    let (_ns, ctx) = new_context();
    mkdir_p(&ctx, "/old");

    let err = sys_pivot_root("/", "/old", &ctx).unwrap_err();
    assert_eq!(err.error(), Errno::EBUSY);
}

#[test]
fn put_old_must_be_a_directory() {
    let (_ns, ctx) = new_context();
    mkdir_p(&ctx, "/newroot");
    sys_mount("newfs", "/newroot", Some("ramfs"), 0, None, &ctx).unwrap();
    touch(&ctx, "/newroot/file");

    let err = sys_pivot_root("/newroot", "/newroot/file", &ctx).unwrap_err();
    assert_eq!(err.error(), Errno::ENOTDIR);
}

#[test]
fn pivot_requires_sys_admin() {
    let (ns, ctx) = new_context();
    mkdir_p(&ctx, "/newroot/old");
    let user_ctx = Context::new(ns, Credentials::new_user());
    let err = sys_pivot_root("/newroot", "/newroot/old", &user_ctx).unwrap_err();
    assert_eq!(err.error(), Errno::EPERM);
}

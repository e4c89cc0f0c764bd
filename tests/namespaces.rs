// SPDX-License-Identifier: MPL-2.0

//! Cloning and tearing down mount namespaces.

mod common;

use common::{mkdir_p, new_context, resolve, touch};
use mountns::{
    context::{Context, Credentials},
    syscall::{sys_mount, sys_umount},
    Errno,
};
use std::sync::Arc;

#[test]
fn cloned_namespace_mirrors_the_tree() {
    let (ns, ctx) = new_context();
    mkdir_p(&ctx, "/a");
    mkdir_p(&ctx, "/a/b");
    sys_mount("outer", "/a", Some("ramfs"), 0, None, &ctx).unwrap();
    mkdir_p(&ctx, "/a/inner");
    sys_mount("inner", "/a/inner", Some("ramfs"), 0, None, &ctx).unwrap();

    let before = ns.read_mounts();
    let new_ns = ns.clone_new(&ctx).unwrap();

    // Same shape, same names, distinct mounts, shared file systems.
    assert_eq!(new_ns.read_mounts(), before);
    let old_mounts = ns.all_mounts();
    let new_mounts = new_ns.all_mounts();
    assert_eq!(old_mounts.len(), 3);
    assert_eq!(new_mounts.len(), old_mounts.len());
    for (old, new) in old_mounts.iter().zip(&new_mounts) {
        assert_ne!(old.id(), new.id());
        assert!(Arc::ptr_eq(old.fs(), new.fs()));
        assert!(new_ns.owns(new));
        assert!(!ns.owns(new));
    }
}

#[test]
fn clone_migrates_the_calling_context() {
    let (ns, ctx) = new_context();
    mkdir_p(&ctx, "/a");
    sys_mount("tmp", "/a", Some("ramfs"), 0, None, &ctx).unwrap();

    let new_ns = ns.clone_new(&ctx).unwrap();

    assert!(Arc::ptr_eq(&ctx.mnt_ns(), &new_ns));
    let resolver = ctx.fs().read();
    assert!(new_ns.owns(resolver.root().mount_node()));
    assert!(new_ns.owns(resolver.cwd().mount_node()));
}

#[test]
fn namespaces_evolve_independently_after_clone() {
    let (ns, ctx) = new_context();
    mkdir_p(&ctx, "/m");
    mkdir_p(&ctx, "/n");
    sys_mount("shared", "/m", Some("ramfs"), 0, None, &ctx).unwrap();

    // The context moves to the clone; mutate the clone's tree.
    let new_ns = ns.clone_new(&ctx).unwrap();
    sys_mount("private", "/n", Some("ramfs"), 0, None, &ctx).unwrap();
    sys_umount("/m", 0, &ctx).unwrap();

    // The original namespace is untouched.
    assert!(ns.read_mounts().contains("shared /m ramfs rw 0 0"));
    assert!(!ns.read_mounts().contains("private"));
    assert!(new_ns.read_mounts().contains("private /n ramfs rw 0 0"));
    assert!(!new_ns.read_mounts().contains("shared"));
}

#[test]
fn file_contents_stay_shared_across_namespaces() {
    let (ns, ctx) = new_context();
    mkdir_p(&ctx, "/m");
    sys_mount("tmp", "/m", Some("ramfs"), 0, None, &ctx).unwrap();

    let _new_ns = ns.clone_new(&ctx).unwrap();
    // Created through the clone's mount, served by the shared fs.
    touch(&ctx, "/m/file");

    let old_ctx = Context::new(ns, Credentials::new_root());
    resolve(&old_ctx, "/m/file").unwrap();
}

#[test]
fn cloning_requires_sys_admin() {
    let (ns, _ctx) = new_context();
    let ctx = Context::new(ns.clone(), Credentials::new_user());
    assert_eq!(ns.clone_new(&ctx).unwrap_err().error(), Errno::EPERM);
}

#[test]
fn dropping_a_namespace_tears_its_tree_down() {
    let (ns, ctx) = new_context();
    mkdir_p(&ctx, "/m");
    sys_mount("tmp", "/m", Some("ramfs"), 0, None, &ctx).unwrap();

    let new_ns = ns.clone_new(&ctx).unwrap();
    let cloned_mount = {
        let mounts = new_ns.all_mounts();
        assert_eq!(mounts.len(), 2);
        mounts[1].clone()
    };
    assert!(cloned_mount.is_attached());

    // The context keeps the clone alive via its namespace reference.
    drop(ctx);
    drop(new_ns);

    assert!(!cloned_mount.is_attached());
    assert!(cloned_mount.namespace().is_none());
}

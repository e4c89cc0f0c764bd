// SPDX-License-Identifier: MPL-2.0

//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use mountns::{
    context::{Context, Credentials},
    fs::{
        fs_resolver::FsPath,
        path::{MountNamespace, Path},
        ramfs::RamFS,
        utils::{InodeMode, InodeType},
    },
};

/// Creates a fresh namespace rooted on a ramfs, plus a root-capable
/// context living in it.
pub fn new_context() -> (Arc<MountNamespace>, Context) {
    let ns = MountNamespace::new_init(RamFS::new(), "rootfs");
    let ctx = Context::new(ns.clone(), Credentials::new_root());
    (ns, ctx)
}

/// Resolves an absolute or cwd-relative path in the context.
pub fn resolve(ctx: &Context, path: &str) -> mountns::Result<Path> {
    ctx.fs().read().lookup(&FsPath::new(path)?)
}

/// Creates the directory `path` and any missing ancestors.
pub fn mkdir_p(ctx: &Context, path: &str) -> Path {
    let mut current = ctx.fs().read().root().clone();
    for name in path.split('/').filter(|s| !s.is_empty()) {
        current = match current.lookup(name) {
            Ok(next) => next,
            Err(_) => current
                .new_fs_child(name, InodeType::Dir, InodeMode::from_bits_truncate(0o755))
                .unwrap(),
        };
    }
    current
}

/// Creates an empty regular file at `path` (the parent must exist).
pub fn touch(ctx: &Context, path: &str) -> Path {
    let (dir, name) = path.rsplit_once('/').unwrap();
    let parent = if dir.is_empty() {
        ctx.fs().read().root().clone()
    } else {
        resolve(ctx, dir).unwrap()
    };
    parent
        .new_fs_child(name, InodeType::File, InodeMode::from_bits_truncate(0o644))
        .unwrap()
}

// SPDX-License-Identifier: MPL-2.0

use crate::{
    fs::{
        path::{MountNamespace, Path},
        utils::PATH_MAX,
    },
    prelude::*,
};

/// The per-context state for resolving path strings: a root directory
/// and a current working directory, both inside one mount namespace.
#[derive(Clone)]
pub struct FsResolver {
    root: Path,
    cwd: Path,
}

impl FsResolver {
    /// Creates a resolver rooted at the namespace's root mount.
    pub fn new(mnt_ns: &Arc<MountNamespace>) -> Self {
        let root = Path::new_fs_root(mnt_ns.root());
        Self {
            cwd: root.clone(),
            root,
        }
    }

    /// Gets the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Gets the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn set_root(&mut self, path: Path) {
        self.root = path;
    }

    pub fn set_cwd(&mut self, path: Path) {
        self.cwd = path;
    }

    /// Resolves `path` to a location in the mount tree.
    ///
    /// Absolute paths start at the resolver's root, relative ones at its
    /// working directory.
    pub fn lookup(&self, path: &FsPath) -> Result<Path> {
        match path.inner {
            FsPathInner::Absolute(path) => self.root.lookup(path.trim_start_matches('/')),
            FsPathInner::CwdRelative(path) => self.cwd.lookup(path),
        }
    }
}

/// A validated path string.
#[derive(Debug)]
pub struct FsPath<'a> {
    inner: FsPathInner<'a>,
}

#[derive(Debug)]
enum FsPathInner<'a> {
    Absolute(&'a str),
    CwdRelative(&'a str),
}

impl<'a> FsPath<'a> {
    pub fn new(path: &'a str) -> Result<Self> {
        if path.len() > PATH_MAX {
            return_errno_with_message!(Errno::ENAMETOOLONG, "the path is too long");
        }
        if path.is_empty() {
            return_errno_with_message!(Errno::ENOENT, "the path is an empty string");
        }

        let inner = if path.starts_with('/') {
            FsPathInner::Absolute(path)
        } else {
            FsPathInner::CwdRelative(path)
        };
        Ok(Self { inner })
    }
}

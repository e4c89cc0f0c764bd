// SPDX-License-Identifier: MPL-2.0

//! The per-caller context the syscall surface operates on.

use crate::{
    fs::{
        fs_resolver::FsResolver,
        path::MountNamespace,
    },
    prelude::*,
};

bitflags! {
    /// Capability bits, numbered as Linux numbers them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CapSet: u64 {
        const SYS_ADMIN = 1 << 21;
    }
}

/// The credentials of a caller.
#[derive(Debug, Clone)]
pub struct Credentials {
    caps: CapSet,
}

impl Credentials {
    /// Creates credentials carrying every capability.
    pub fn new_root() -> Self {
        Self { caps: CapSet::all() }
    }

    /// Creates credentials carrying no capability.
    pub fn new_user() -> Self {
        Self {
            caps: CapSet::empty(),
        }
    }

    /// Checks that the caller holds `cap`.
    pub fn check_cap(&self, cap: CapSet) -> Result<()> {
        if !self.caps.contains(cap) {
            return_errno_with_message!(Errno::EPERM, "the caller lacks the needed capability");
        }
        Ok(())
    }
}

/// Everything a mount-related call needs to know about its caller: its
/// credentials, its mount namespace, and its path-resolution state.
pub struct Context {
    fs: Arc<RwLock<FsResolver>>,
    mnt_ns: RwLock<Arc<MountNamespace>>,
    credentials: Credentials,
}

impl Context {
    /// Creates a context living in `mnt_ns`, with its root and working
    /// directories at the namespace root.
    pub fn new(mnt_ns: Arc<MountNamespace>, credentials: Credentials) -> Self {
        let fs = Arc::new(RwLock::new(FsResolver::new(&mnt_ns)));
        mnt_ns.track_resolver(&fs);
        Self {
            fs,
            mnt_ns: RwLock::new(mnt_ns),
            credentials,
        }
    }

    pub fn fs(&self) -> &Arc<RwLock<FsResolver>> {
        &self.fs
    }

    pub fn mnt_ns(&self) -> Arc<MountNamespace> {
        self.mnt_ns.read().clone()
    }

    pub(crate) fn set_mnt_ns(&self, mnt_ns: Arc<MountNamespace>) {
        *self.mnt_ns.write() = mnt_ns;
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }
}

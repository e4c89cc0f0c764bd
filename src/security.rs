// SPDX-License-Identifier: MPL-2.0

//! Pluggable security checks for mount operations.
//!
//! A security module registers one [`SecurityHooks`] implementation at
//! startup; every hook defaults to allowing the operation. Hooks run
//! after argument validation and before the tree is changed, so a veto
//! leaves the tree untouched.

use crate::{
    fs::path::{MntFlags, Mount, Path},
    prelude::*,
    syscall::UmountFlags,
};

/// Decision points for mount-related operations.
pub trait SecurityHooks: Send + Sync {
    /// Checks mounting (new, bind, or move) onto `target`.
    fn check_mount(&self, devname: &str, target: &Path) -> Result<()> {
        let _ = (devname, target);
        Ok(())
    }

    /// Checks unmounting `mount`.
    fn check_umount(&self, mount: &Arc<Mount>, flags: UmountFlags) -> Result<()> {
        let _ = (mount, flags);
        Ok(())
    }

    /// Checks changing the flags of `mount`.
    fn check_remount(&self, mount: &Arc<Mount>, flags: MntFlags) -> Result<()> {
        let _ = (mount, flags);
        Ok(())
    }

    /// Checks relocating the namespace root.
    fn check_pivot_root(&self, new_root: &Path, put_old: &Path) -> Result<()> {
        let _ = (new_root, put_old);
        Ok(())
    }
}

struct DefaultHooks;

impl SecurityHooks for DefaultHooks {}

static HOOKS: Once<Box<dyn SecurityHooks>> = Once::new();
static DEFAULT_HOOKS: DefaultHooks = DefaultHooks;

/// Installs the security hooks. May be called at most once.
pub fn register_security_hooks(hooks: Box<dyn SecurityHooks>) -> Result<()> {
    if HOOKS.is_completed() {
        return_errno_with_message!(Errno::EEXIST, "security hooks are already registered");
    }
    HOOKS.call_once(|| hooks);
    Ok(())
}

pub(crate) fn hooks() -> &'static dyn SecurityHooks {
    match HOOKS.get() {
        Some(hooks) => hooks.as_ref(),
        None => &DEFAULT_HOOKS,
    }
}

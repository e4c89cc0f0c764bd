// SPDX-License-Identifier: MPL-2.0

//! The registry of file system types, which `sys_mount` consults to turn an
//! `fstype` string into a file system instance.

use crate::{
    fs::{ramfs::RamFsType, utils::FileSystem},
    prelude::*,
};

/// A type of file system.
pub trait FsType: Send + Sync + 'static {
    /// Gets the name of this FS type such as `"ramfs"`.
    fn name(&self) -> &'static str;

    /// Gets the properties of this FS type.
    fn properties(&self) -> FsProperties;

    /// Creates an instance of this FS type.
    ///
    /// `source` is the mount source (a device path or an arbitrary tag);
    /// `args` is the FS-specific mount data, if any.
    fn create(&self, args: Option<&str>, source: &str) -> Result<Arc<dyn FileSystem>>;
}

bitflags! {
    /// The properties common to all FS instances.
    #[derive(Debug, Clone, Copy)]
    pub struct FsProperties: u32 {
        /// Whether a FS needs a backing source to be instantiated.
        ///
        /// Persistent FSes require one, while a volatile FS such as RamFS
        /// does not.
        const NEED_SOURCE = 1 << 1;
    }
}

/// Registers a new FS type.
pub fn register(new_type: Arc<dyn FsType>) -> Result<()> {
    registry().register(new_type)
}

/// Unregisters a FS type.
pub fn unregister(name: &str) -> Result<Arc<dyn FsType>> {
    registry().unregister(name)
}

/// Looks up a FS type.
pub fn look_up(name: &str) -> Option<Arc<dyn FsType>> {
    registry().fs_table.lock().get(name).cloned()
}

/// Executes a user-provided operation with an iterator that can access each
/// and every FS type.
pub fn with_iter<F, R>(f: F) -> R
where
    F: FnOnce(&mut dyn Iterator<Item = (&String, &Arc<dyn FsType>)>) -> R,
{
    let guard = registry().fs_table.lock();
    let mut iter = guard.iter();

    f(&mut iter)
}

fn registry() -> &'static FsRegistry {
    FS_REGISTRY.call_once(|| {
        let registry = FsRegistry {
            fs_table: Mutex::new(BTreeMap::new()),
        };
        // RamFS is always available; it backs the initial namespace.
        registry.register(Arc::new(RamFsType)).unwrap();
        registry
    })
}

static FS_REGISTRY: Once<FsRegistry> = Once::new();

struct FsRegistry {
    fs_table: Mutex<BTreeMap<String, Arc<dyn FsType>>>,
}

impl FsRegistry {
    fn register(&self, new_type: Arc<dyn FsType>) -> Result<()> {
        let mut fs_table = self.fs_table.lock();
        if fs_table.contains_key(new_type.name()) {
            return_errno_with_message!(Errno::EEXIST, "the FS type is already registered");
        }
        fs_table.insert(new_type.name().to_string(), new_type);
        Ok(())
    }

    fn unregister(&self, name: &str) -> Result<Arc<dyn FsType>> {
        self.fs_table
            .lock()
            .remove(name)
            .ok_or_else(|| Error::with_message(Errno::ENOENT, "the FS type is not registered"))
    }
}

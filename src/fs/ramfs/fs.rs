// SPDX-License-Identifier: MPL-2.0

use core::sync::atomic::{AtomicU64, Ordering};

use hashbrown::HashMap;

use super::{BLOCK_SIZE, RAMFS_MAGIC, ROOT_INO};
use crate::{
    fs::{
        registry::{FsProperties, FsType},
        utils::{FileSystem, FsFlags, Inode, InodeMode, InodeType, SuperBlock, NAME_MAX},
    },
    prelude::*,
};

/// A volatile file system whose data and metadata exist only in memory.
pub struct RamFS {
    /// The super block.
    sb: SuperBlock,
    /// Root inode.
    root: Arc<RamInode>,
    /// An inode allocator.
    inode_allocator: AtomicU64,
}

impl RamFS {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|weak_fs| Self {
            sb: SuperBlock::new(RAMFS_MAGIC, BLOCK_SIZE, NAME_MAX),
            root: Arc::new_cyclic(|weak_root| RamInode {
                ino: ROOT_INO,
                typ: InodeType::Dir,
                children: RwLock::new(HashMap::new()),
                this: weak_root.clone(),
                fs: weak_fs.clone(),
            }),
            inode_allocator: AtomicU64::new(ROOT_INO + 1),
        })
    }

    fn alloc_id(&self) -> u64 {
        self.inode_allocator.fetch_add(1, Ordering::SeqCst)
    }
}

impl FileSystem for RamFS {
    fn sync(&self) -> Result<()> {
        // Volatile; nothing to flush.
        Ok(())
    }

    fn root_inode(&self) -> Arc<dyn Inode> {
        self.root.clone()
    }

    fn sb(&self) -> SuperBlock {
        self.sb.clone()
    }

    fn flags(&self) -> FsFlags {
        FsFlags::empty()
    }

    fn fs_type(&self) -> &'static str {
        "ramfs"
    }
}

/// The FS type registered under the name `"ramfs"`.
pub struct RamFsType;

impl FsType for RamFsType {
    fn name(&self) -> &'static str {
        "ramfs"
    }

    fn properties(&self) -> FsProperties {
        FsProperties::empty()
    }

    fn create(&self, _args: Option<&str>, _source: &str) -> Result<Arc<dyn FileSystem>> {
        Ok(RamFS::new())
    }
}

struct RamInode {
    ino: u64,
    typ: InodeType,
    /// Child inodes; only meaningful for directories.
    children: RwLock<HashMap<String, Arc<RamInode>>>,
    this: Weak<RamInode>,
    fs: Weak<RamFS>,
}

impl RamInode {
    fn new(fs: &Weak<RamFS>, typ: InodeType, ino: u64) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| RamInode {
            ino,
            typ,
            children: RwLock::new(HashMap::new()),
            this: weak_self.clone(),
            fs: fs.clone(),
        })
    }
}

impl Inode for RamInode {
    fn ino(&self) -> u64 {
        self.ino
    }

    fn type_(&self) -> InodeType {
        self.typ
    }

    fn fs(&self) -> Arc<dyn FileSystem> {
        self.fs.upgrade().unwrap()
    }

    fn lookup(&self, name: &str) -> Result<Arc<dyn Inode>> {
        if self.typ != InodeType::Dir {
            return_errno!(Errno::ENOTDIR);
        }
        let children = self.children.read();
        let inode = children
            .get(name)
            .ok_or(Error::new(Errno::ENOENT))?
            .clone();
        Ok(inode)
    }

    fn create(&self, name: &str, type_: InodeType, _mode: InodeMode) -> Result<Arc<dyn Inode>> {
        if self.typ != InodeType::Dir {
            return_errno!(Errno::ENOTDIR);
        }
        if name.len() > NAME_MAX {
            return_errno!(Errno::ENAMETOOLONG);
        }

        let mut children = self.children.write();
        if children.contains_key(name) {
            return_errno!(Errno::EEXIST);
        }
        let fs = self.fs.upgrade().unwrap();
        let new_inode = RamInode::new(&self.fs, type_, fs.alloc_id());
        children.insert(String::from(name), new_inode.clone());
        Ok(new_inode)
    }

    fn unlink(&self, name: &str) -> Result<()> {
        if self.typ != InodeType::Dir {
            return_errno!(Errno::ENOTDIR);
        }
        let mut children = self.children.write();
        let target = children.get(name).ok_or(Error::new(Errno::ENOENT))?;
        if target.typ == InodeType::Dir {
            return_errno!(Errno::EISDIR);
        }
        children.remove(name);
        Ok(())
    }

    fn rmdir(&self, name: &str) -> Result<()> {
        if self.typ != InodeType::Dir {
            return_errno!(Errno::ENOTDIR);
        }
        let mut children = self.children.write();
        let target = children.get(name).ok_or(Error::new(Errno::ENOENT))?;
        if target.typ != InodeType::Dir {
            return_errno!(Errno::ENOTDIR);
        }
        if !target.children.read().is_empty() {
            return_errno!(Errno::ENOTEMPTY);
        }
        children.remove(name);
        Ok(())
    }
}

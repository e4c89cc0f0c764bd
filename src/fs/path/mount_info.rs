// SPDX-License-Identifier: MPL-2.0

//! Textual enumeration of a namespace's mounts, in the format of
//! `/proc/mounts`.

use super::{Mount, MountNamespace, MntFlags, Path};
use crate::{fs::utils::FsFlags, prelude::*};

impl MountNamespace {
    /// Renders every mount of this namespace, one line per mount:
    ///
    /// ```text
    /// <source> <target> <fstype> <options> 0 0
    /// ```
    ///
    /// Mounts appear in tree pre-order, so a shadowed mount precedes the
    /// one stacked over it. Whitespace and backslashes in the fields are
    /// octal-escaped.
    pub fn read_mounts(&self) -> String {
        let _guard = self.read_guard();

        let mut output = String::new();
        for mount in Mount::collect_subtree(&self.root()) {
            let target = Path::new(mount.clone(), mount.root_dentry().clone()).abs_path();
            let source = if mount.devname().is_empty() {
                "none"
            } else {
                mount.devname()
            };
            output.push_str(&format!(
                "{} {} {} {} 0 0\n",
                mangle(source),
                mangle(&target),
                mangle(mount.fs().fs_type()),
                mount_options(&mount),
            ));
        }
        output
    }
}

/// Escapes the characters that would corrupt the line format.
fn mangle(field: &str) -> String {
    let mut escaped = String::with_capacity(field.len());
    for ch in field.chars() {
        match ch {
            ' ' => escaped.push_str("\\040"),
            '\t' => escaped.push_str("\\011"),
            '\n' => escaped.push_str("\\012"),
            '\\' => escaped.push_str("\\134"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn mount_options(mount: &Arc<Mount>) -> String {
    let flags = mount.flags();
    let mut options = String::from(if flags.contains(MntFlags::RDONLY) {
        "ro"
    } else {
        "rw"
    });

    for (flag, name) in [
        (MntFlags::NOSUID, "nosuid"),
        (MntFlags::NODEV, "nodev"),
        (MntFlags::NOEXEC, "noexec"),
        (MntFlags::NOATIME, "noatime"),
        (MntFlags::NODIRATIME, "nodiratime"),
    ] {
        if flags.contains(flag) {
            options.push(',');
            options.push_str(name);
        }
    }

    let fs_flags = mount.fs().flags();
    for (flag, name) in [
        (FsFlags::SYNCHRONOUS, "sync"),
        (FsFlags::DIRSYNC, "dirsync"),
        (FsFlags::MANDLOCK, "mand"),
    ] {
        if fs_flags.contains(flag) {
            options.push(',');
            options.push_str(name);
        }
    }

    options
}

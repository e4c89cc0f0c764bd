// SPDX-License-Identifier: MPL-2.0

pub mod fs_resolver;
pub mod path;
pub mod ramfs;
pub mod registry;
pub mod utils;

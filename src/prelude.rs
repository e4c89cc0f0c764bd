// SPDX-License-Identifier: MPL-2.0

#![allow(unused)]

pub(crate) use alloc::{
    boxed::Box,
    collections::{BTreeMap, VecDeque},
    format,
    string::{String, ToString},
    sync::{Arc, Weak},
    vec,
    vec::Vec,
};
pub(crate) use core::{any::Any, fmt::Debug};

pub(crate) use bitflags::bitflags;
pub(crate) use log::{debug, warn};
pub(crate) use spin::{Mutex, MutexGuard, Once, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub(crate) use crate::{
    error::{Errno, Error, Result},
    return_errno, return_errno_with_message,
};

// SPDX-License-Identifier: GPL-3.0-only

//! Direct host queries that do not go through an external program

use std::fs;
use std::path::Path;

use nix::sys::statvfs::statvfs;

use crate::error::{Result, SysError};

/// Live mount table of the running system
pub const PROC_MOUNTS: &str = "/proc/mounts";

/// Read access to host filesystem state.
pub trait HostFs {
    /// Full text of the live mount table, one `device mountpoint fstype ...` row per line.
    fn mount_table(&self) -> Result<String>;

    /// Bytes available to unprivileged users on the filesystem holding `path`.
    fn available_space(&self, path: &Path) -> Result<u64>;
}

impl<T: HostFs + ?Sized> HostFs for &T {
    fn mount_table(&self) -> Result<String> {
        (**self).mount_table()
    }

    fn available_space(&self, path: &Path) -> Result<u64> {
        (**self).available_space(path)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LiveHost;

impl HostFs for LiveHost {
    fn mount_table(&self) -> Result<String> {
        Ok(fs::read_to_string(PROC_MOUNTS)?)
    }

    fn available_space(&self, path: &Path) -> Result<u64> {
        let stat = statvfs(path).map_err(|errno| SysError::Io(errno.into()))?;
        Ok(stat.blocks_available() as u64 * stat.fragment_size() as u64)
    }
}

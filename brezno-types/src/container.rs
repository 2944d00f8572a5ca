// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

/// Directory holding the device nodes of opened mappers.
pub const MAPPER_DIR: &str = "/dev/mapper";

/// An active encrypted container as reconstructed from live system state.
///
/// Within one discovery pass a container is identified by its `mapper_name`. String fields are
/// empty and numeric fields zero when the corresponding piece of state could not be resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    /// Absolute path of the backing file (empty if the loop device is unknown)
    pub path: String,

    /// Device-mapper name (e.g. `vault_img`)
    pub mapper_name: String,

    /// Where the filesystem is mounted (empty if opened but not mounted)
    pub mount_point: String,

    /// Backing device, `/dev/loopN` for file-backed containers
    pub loop_device: String,

    /// Filesystem type reported by the mount table
    pub filesystem: String,

    /// Filesystem size in bytes
    pub size: u64,

    /// Used bytes
    pub used: u64,

    /// Whether the mapper is currently open
    pub active: bool,
}

impl Container {
    /// Device node of the opened mapper (e.g. `/dev/mapper/vault_img`)
    pub fn mapper_device(&self) -> String {
        format!("{MAPPER_DIR}/{}", self.mapper_name)
    }

    pub fn is_mounted(&self) -> bool {
        !self.mount_point.is_empty()
    }

    /// True when the backing device is a loop device this tool can detach.
    pub fn has_loop_device(&self) -> bool {
        self.loop_device.starts_with("/dev/loop")
    }

    pub fn available(&self) -> u64 {
        self.size.saturating_sub(self.used)
    }
}

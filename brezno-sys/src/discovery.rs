// SPDX-License-Identifier: GPL-3.0-only

//! Inventory of active containers rebuilt from live system state
//!
//! Nothing is cached: every query lists the crypt mappers (`dmsetup`), the loop devices
//! (`losetup`) and the mount table, then joins them per mapper. A mapper whose backing device or
//! mount cannot be resolved is still reported, with those fields left empty.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, warn};

use brezno_types::{Container, MAPPER_DIR};

use crate::cmd::{CommandRequest, CommandRunner};
use crate::error::{Result, SysError};
use crate::host::HostFs;
use crate::loop_dev::LoopManager;
use crate::mount::MountManager;
use crate::parse::{device_to_loop, parse_dmsetup_ls, parse_dmsetup_table, parse_mapper_mounts};
use crate::pathutil::canonical_container_path;

/// A mapper mount joined with its `df` figures
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct MountInfo {
    device: String,
    mount_point: String,
    filesystem: String,
    size: u64,
    used: u64,
}

pub struct Discovery<R, H> {
    runner: R,
    host: H,
}

impl<R: CommandRunner, H: HostFs> Discovery<R, H> {
    pub fn new(runner: R, host: H) -> Self {
        Self { runner, host }
    }

    /// Every opened crypt mapper with whatever could be correlated to it.
    pub fn discover_active(&self) -> Result<Vec<Container>> {
        let mappers = self.crypt_mappers()?;
        if mappers.is_empty() {
            return Ok(Vec::new());
        }

        let backing_files = LoopManager::new(&self.runner).list()?;
        let mounts = self.mapper_mounts()?;

        let containers = mappers
            .into_iter()
            .map(|mapper_name| self.correlate(mapper_name, &backing_files, &mounts))
            .collect::<Vec<_>>();

        debug!("Discovered {} active container(s)", containers.len());
        Ok(containers)
    }

    /// Active container backed by `path` (made absolute before comparison).
    pub fn find_by_path(&self, path: &Path) -> Result<Option<Container>> {
        let key = canonical_container_path(path)?;
        Ok(self
            .discover_active()?
            .into_iter()
            .find(|container| !container.path.is_empty() && Path::new(&container.path) == key))
    }

    pub fn find_by_mapper(&self, mapper_name: &str) -> Result<Option<Container>> {
        Ok(self
            .discover_active()?
            .into_iter()
            .find(|container| container.mapper_name == mapper_name))
    }

    /// Active container mounted on `mount_point` (made absolute before comparison).
    pub fn find_by_mount(&self, mount_point: &Path) -> Result<Option<Container>> {
        let key = canonical_container_path(mount_point)?;
        Ok(self.discover_active()?.into_iter().find(|container| {
            !container.mount_point.is_empty() && Path::new(&container.mount_point) == key
        }))
    }

    fn crypt_mappers(&self) -> Result<Vec<String>> {
        let mut request = CommandRequest::new("dmsetup");
        request.args(["ls", "--target", "crypt"]);
        let output = self.runner.run(&request)?;

        if !output.success() {
            let diagnostic = output.diagnostic();
            if diagnostic.contains("No devices found") {
                return Ok(Vec::new());
            }
            return Err(SysError::ExternalToolFailure {
                command: request.render(),
                status: output.status,
                stderr: diagnostic,
            });
        }

        Ok(parse_dmsetup_ls(&output.stdout))
    }

    /// Loop device (or raw `major:minor`) backing `mapper_name`.
    fn backing_device(&self, mapper_name: &str) -> Option<String> {
        let table = match self.runner.run_output("dmsetup", &["table", mapper_name]) {
            Ok(table) => table,
            Err(e) => {
                warn!("Could not read table of mapper {}: {}", mapper_name, e);
                return None;
            }
        };

        match parse_dmsetup_table(&table) {
            Ok(device) => Some(device_to_loop(&device)),
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }

    fn mapper_mounts(&self) -> Result<HashMap<String, MountInfo>> {
        let table = self.host.mount_table()?;
        let mounts = MountManager::new(&self.runner);

        Ok(parse_mapper_mounts(&table)
            .into_iter()
            .map(|row| {
                let (size, used) = mounts
                    .filesystem_usage(&row.mount_point)
                    .unwrap_or_else(|e| {
                        warn!("Could not query usage of {}: {}", row.mount_point, e);
                        (0, 0)
                    });
                let info = MountInfo {
                    device: row.device,
                    mount_point: row.mount_point,
                    filesystem: row.filesystem,
                    size,
                    used,
                };
                (info.device.clone(), info)
            })
            .collect())
    }

    fn correlate(
        &self,
        mapper_name: String,
        backing_files: &HashMap<String, String>,
        mounts: &HashMap<String, MountInfo>,
    ) -> Container {
        let loop_device = self.backing_device(&mapper_name).unwrap_or_default();
        let path = backing_files.get(&loop_device).cloned().unwrap_or_default();
        let mount = mounts
            .get(&format!("{MAPPER_DIR}/{mapper_name}"))
            .cloned()
            .unwrap_or_default();

        Container {
            path,
            mapper_name,
            mount_point: mount.mount_point,
            loop_device,
            filesystem: mount.filesystem,
            size: mount.size,
            used: mount.used,
            active: true,
        }
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! Online expansion of a mounted container
//!
//! [`Resizer::prepare`] runs every check without touching anything and returns a
//! [`ResizePlan`] holding the open backing file, so the caller can preview and confirm.
//! [`Resizer::execute`] then grows, in order, the backing file, the loop device, the LUKS
//! mapper and the filesystem. The sequence only moves forward: a failure after the file has
//! grown is reported as a [`SysError::PartialMutation`] naming the commands that finish the job.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use brezno_types::{Container, FilesystemType, bytes_to_pretty};

use crate::auth::AuthMethod;
use crate::cmd::CommandRunner;
use crate::discovery::Discovery;
use crate::error::{Result, SysError};
use crate::host::HostFs;
use crate::loop_dev::LoopManager;
use crate::luks::LuksManager;
use crate::mount::MountManager;
use crate::pathutil::{available_space_for, canonical_container_path};

/// Everything `execute` needs, validated
#[derive(Debug)]
pub struct ResizePlan {
    file: File,
    path: PathBuf,
    container: Container,
    filesystem: FilesystemType,
    current_size: u64,
    new_size: u64,
}

impl ResizePlan {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn filesystem(&self) -> FilesystemType {
        self.filesystem
    }

    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    pub fn new_size(&self) -> u64 {
        self.new_size
    }

    pub fn delta(&self) -> u64 {
        self.new_size - self.current_size
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizeReport {
    pub old_size: u64,
    pub new_size: u64,
    /// Filesystem size reported after growth, if it could be queried
    pub filesystem_size: Option<u64>,
}

pub struct Resizer<R, H> {
    runner: R,
    host: H,
}

impl<R: CommandRunner, H: HostFs> Resizer<R, H> {
    pub fn new(runner: R, host: H) -> Self {
        Self { runner, host }
    }

    /// Validate a resize of the container at `path` to `new_size` bytes.
    pub fn prepare(&self, path: &Path, new_size: u64) -> Result<ResizePlan> {
        let path = canonical_container_path(path)?;
        let file = open_backing_file(&path)?;

        let container = Discovery::new(&self.runner, &self.host)
            .find_by_path(&path)?
            .ok_or_else(|| {
                SysError::PreconditionFailed(format!(
                    "Container {} is not active; open and mount it first",
                    path.display()
                ))
            })?;

        if !container.is_mounted() {
            return Err(SysError::PreconditionFailed(format!(
                "Container {} is open as {} but not mounted; online resize needs a mounted filesystem",
                path.display(),
                container.mapper_name
            )));
        }

        let filesystem: FilesystemType = container.filesystem.parse().map_err(|_| {
            SysError::PreconditionFailed(format!(
                "Filesystem '{}' cannot be resized online (supported: ext4, xfs, btrfs)",
                container.filesystem
            ))
        })?;

        if !self.runner.command_exists(filesystem.grow_tool()) {
            return Err(SysError::ToolMissing(format!(
                "{} (install {})",
                filesystem.grow_tool(),
                filesystem.grow_package()
            )));
        }
        self.runner.check_dependencies(&["blockdev"])?;

        let current_size = file.metadata()?.len();
        if new_size <= current_size {
            return Err(SysError::PreconditionFailed(format!(
                "New size {} must be larger than the current size {}; shrinking is not supported",
                bytes_to_pretty(&new_size, false),
                bytes_to_pretty(&current_size, false)
            )));
        }

        let delta = new_size - current_size;
        match available_space_for(&self.host, &path) {
            Ok(available) if available < delta => {
                return Err(SysError::PreconditionFailed(format!(
                    "Insufficient space: need {} more, only {} available",
                    bytes_to_pretty(&delta, false),
                    bytes_to_pretty(&available, false)
                )));
            }
            Ok(_) => {}
            Err(e) => warn!("Could not check free space for {}: {}", path.display(), e),
        }

        Ok(ResizePlan {
            file,
            path,
            container,
            filesystem,
            current_size,
            new_size,
        })
    }

    /// Grow the container described by `plan`, re-authenticating with `auth` for the mapper.
    pub fn execute(&self, plan: ResizePlan, auth: &AuthMethod) -> Result<ResizeReport> {
        let container = &plan.container;
        let mapper_device = container.mapper_device();

        info!(
            "Growing {} from {} to {}",
            plan.path.display(),
            bytes_to_pretty(&plan.current_size, false),
            bytes_to_pretty(&plan.new_size, false)
        );
        let grow_command = plan
            .filesystem
            .grow_command_line(&mapper_device, &container.mount_point);

        plan.file.set_len(plan.new_size)?;
        if let Err(e) = plan.file.sync_all() {
            return Err(unflushed_growth(&plan, &grow_command, &e));
        }

        if let Err(e) = LoopManager::new(&self.runner).refresh_size(&container.loop_device) {
            warn!(
                "Could not refresh loop device {}: {}",
                container.loop_device, e
            );
        }

        info!("Resizing LUKS mapper {}", container.mapper_name);
        if let Err(e) = LuksManager::new(&self.runner).resize(&container.mapper_name, auth) {
            return Err(SysError::PartialMutation(format!(
                "Backing file grown to {} but the LUKS resize failed: {}. \
                 Finish manually with: cryptsetup resize {} && {}",
                bytes_to_pretty(&plan.new_size, false),
                e,
                container.mapper_name,
                grow_command
            )));
        }

        let mounts = MountManager::new(&self.runner);
        info!("Growing {} filesystem", plan.filesystem);
        if let Err(e) =
            mounts.grow_filesystem(plan.filesystem, &mapper_device, &container.mount_point)
        {
            return Err(SysError::PartialMutation(format!(
                "Backing file and LUKS mapper grown but the filesystem resize failed: {}. \
                 Finish manually with: {}",
                e, grow_command
            )));
        }

        let filesystem_size = match mounts.filesystem_usage(&container.mount_point) {
            Ok((size, _)) if container.size > 0 && size <= container.size => {
                return Err(SysError::PartialMutation(format!(
                    "Resize commands succeeded but {} still reports {}. Check with: {}",
                    container.mount_point,
                    bytes_to_pretty(&size, false),
                    grow_command
                )));
            }
            Ok((size, _)) => Some(size),
            Err(e) => {
                warn!("Could not verify new filesystem size: {}", e);
                None
            }
        };

        Ok(ResizeReport {
            old_size: plan.current_size,
            new_size: plan.new_size,
            filesystem_size,
        })
    }
}

/// The file length is already committed once `set_len` returns; the rest of the sequence is
/// handed back as the command to resume with.
fn unflushed_growth(plan: &ResizePlan, grow_command: &str, cause: &std::io::Error) -> SysError {
    let container = &plan.container;
    SysError::PartialMutation(format!(
        "Backing file already extended to {} but flushing it failed: {}. \
         Resume with: sync {} && losetup -c {} && cryptsetup resize {} && {}",
        bytes_to_pretty(&plan.new_size, false),
        cause,
        plan.path.display(),
        container.loop_device,
        container.mapper_name,
        grow_command
    ))
}

/// Open the backing file for writing; all later size changes go through this descriptor.
fn open_backing_file(path: &Path) -> Result<File> {
    let metadata = fs::metadata(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            SysError::NotFound(format!("container {}", path.display()))
        }
        _ => SysError::Io(e),
    })?;
    if !metadata.is_file() {
        return Err(SysError::PreconditionFailed(format!(
            "{} is not a regular file",
            path.display()
        )));
    }

    let file = OpenOptions::new().write(true).open(path)?;
    if !file.metadata()?.is_file() {
        return Err(SysError::PreconditionFailed(format!(
            "{} is not a regular file",
            path.display()
        )));
    }
    Ok(file)
}

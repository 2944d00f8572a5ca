// SPDX-License-Identifier: GPL-3.0-only

//! Filesystem creation, mounting and online growth

use std::fs;
use std::path::Path;

use tracing::{info, warn};

use brezno_types::FilesystemType;

use crate::cmd::{CommandRequest, CommandRunner};
use crate::error::Result;
use crate::parse::parse_df;

pub struct MountManager<R> {
    runner: R,
}

impl<R: CommandRunner> MountManager<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    /// Mount `device` on `mount_point`, creating the directory when needed.
    pub fn mount(&self, device: &str, mount_point: &Path, read_only: bool) -> Result<()> {
        fs::create_dir_all(mount_point)?;

        let mut request = CommandRequest::new("mount");
        if read_only {
            request.args(["-o", "ro"]);
        }
        request
            .arg(device)
            .arg(mount_point.to_string_lossy().into_owned());
        self.runner.run_checked(&request)?;

        info!("Mounted {} on {}", device, mount_point.display());
        Ok(())
    }

    /// Unmount `mount_point`. With `force`, escalate to `umount -f` and then a lazy unmount.
    pub fn unmount(&self, mount_point: &Path, force: bool) -> Result<()> {
        let target = mount_point.to_string_lossy();
        let plain = self.runner.run_output("umount", &[&target]);
        if !force || plain.is_ok() {
            return plain.map(|_| ());
        }

        warn!("umount {} failed, retrying with --force", target);
        if self.runner.run_output("umount", &["-f", &target]).is_ok() {
            return Ok(());
        }

        warn!("Forced unmount of {} failed, detaching lazily", target);
        self.runner.run_output("umount", &["-l", &target])?;
        Ok(())
    }

    pub fn make_filesystem(&self, device: &str, filesystem: FilesystemType) -> Result<()> {
        let mut request = CommandRequest::new(filesystem.mkfs_tool());
        request.args(filesystem.mkfs_args(device));
        self.runner.run_checked(&request)?;
        info!("Created {} filesystem on {}", filesystem, device);
        Ok(())
    }

    /// Grow a mounted filesystem to fill its device.
    pub fn grow_filesystem(
        &self,
        filesystem: FilesystemType,
        mapper_device: &str,
        mount_point: &str,
    ) -> Result<()> {
        let mut request = CommandRequest::new(filesystem.grow_tool());
        request.args(filesystem.grow_args(mapper_device, mount_point));
        self.runner.run_checked(&request)?;
        Ok(())
    }

    /// Total and used bytes of the filesystem mounted on `mount_point`.
    pub fn filesystem_usage(&self, mount_point: &str) -> Result<(u64, u64)> {
        let output = self
            .runner
            .run_output("df", &["--block-size=1", mount_point])?;
        parse_df(&output)
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! Loop device management via `losetup`

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use crate::cmd::{CommandRequest, CommandRunner};
use crate::error::{Result, SysError};
use crate::parse::{parse_losetup_find, parse_losetup_json};

pub struct LoopManager<R> {
    runner: R,
}

impl<R: CommandRunner> LoopManager<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    /// Attach `path` to the first free loop device and return that device.
    pub fn attach(&self, path: &Path) -> Result<String> {
        let mut request = CommandRequest::new("losetup");
        request
            .args(["-f", "--show"])
            .arg(path.to_string_lossy().into_owned());

        let output = self.runner.run_checked(&request)?;
        let device = output.stdout.trim().to_string();
        if device.is_empty() {
            return Err(SysError::parse(
                "losetup output",
                format!("no loop device reported for {}", path.display()),
            ));
        }

        info!("Attached {} to {}", path.display(), device);
        Ok(device)
    }

    pub fn detach(&self, device: &str) -> Result<()> {
        self.runner.run_output("losetup", &["-d", device])?;
        debug!("Detached loop device {}", device);
        Ok(())
    }

    /// Loop device currently backed by `path`, if any.
    pub fn find_by_file(&self, path: &Path) -> Result<Option<String>> {
        let path = path.to_string_lossy();
        let output = self.runner.run_output("losetup", &["-j", &path])?;
        Ok(parse_losetup_find(&output))
    }

    /// Every configured loop device mapped to its backing file.
    pub fn list(&self) -> Result<HashMap<String, String>> {
        let output = self.runner.run_output("losetup", &["-l", "-J"])?;
        parse_losetup_json(&output)
    }

    /// Make the kernel re-read the size of the backing file.
    pub fn refresh_size(&self, device: &str) -> Result<()> {
        self.runner.run_output("losetup", &["-c", device])?;
        Ok(())
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! LUKS operations via `cryptsetup`

use std::path::Path;

use tracing::{debug, info};

use brezno_types::MAPPER_DIR;

use crate::auth::AuthMethod;
use crate::cmd::{CommandOutput, CommandRequest, CommandRunner};
use crate::error::{Result, SysError};

/// Exit code `cryptsetup` uses when no key slot accepts the supplied key
const EXIT_NO_KEY: i32 = 2;

pub struct LuksManager<R> {
    runner: R,
}

impl<R: CommandRunner> LuksManager<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    /// Write a LUKS2 header to `path`, protected by `auth`.
    pub fn format(&self, path: &Path, auth: &AuthMethod) -> Result<()> {
        let mut request = CommandRequest::new("cryptsetup");
        request
            .args(["luksFormat", "--type", "luks2", "--batch-mode"])
            .arg(path.to_string_lossy().into_owned());
        auth.apply_current(&mut request);

        self.run_authenticated(&request)?;
        info!("Formatted {} as LUKS2", path.display());
        Ok(())
    }

    /// Whether `path` carries a LUKS header. Any non-zero exit means no.
    pub fn is_luks(&self, path: &Path) -> Result<bool> {
        let mut request = CommandRequest::new("cryptsetup");
        request
            .arg("isLuks")
            .arg(path.to_string_lossy().into_owned());
        Ok(self.runner.run(&request)?.success())
    }

    pub fn open(&self, device: &str, mapper_name: &str, auth: &AuthMethod) -> Result<()> {
        let mut request = CommandRequest::new("cryptsetup");
        request.args(["luksOpen", device, mapper_name]);
        auth.apply_current(&mut request);

        self.run_authenticated(&request)?;
        info!("Opened {} as {}/{}", device, MAPPER_DIR, mapper_name);
        Ok(())
    }

    pub fn close(&self, mapper_name: &str) -> Result<()> {
        self.runner
            .run_output("cryptsetup", &["luksClose", mapper_name])?;
        debug!("Closed mapper {}", mapper_name);
        Ok(())
    }

    /// Grow an open mapper to the full size of its backing device.
    pub fn resize(&self, mapper_name: &str, auth: &AuthMethod) -> Result<()> {
        let mut request = CommandRequest::new("cryptsetup");
        request.args(["resize", mapper_name]);
        auth.apply_current(&mut request);

        self.run_authenticated(&request)?;
        Ok(())
    }

    /// Size in bytes of the opened mapper device.
    pub fn mapper_size(&self, mapper_name: &str) -> Result<u64> {
        let device = format!("{MAPPER_DIR}/{mapper_name}");
        let output = self
            .runner
            .run_output("blockdev", &["--getsize64", &device])?;
        output.trim().parse().map_err(|_| {
            SysError::parse(
                "blockdev output",
                format!("invalid size '{}'", output.trim()),
            )
        })
    }

    /// Replace the credential in key slot 0 of `device`.
    ///
    /// The current credential is applied before the new one, so two passphrases reach the tool
    /// in the order it prompts for them.
    pub fn change_key(&self, device: &Path, current: &AuthMethod, new: &AuthMethod) -> Result<()> {
        let request = change_key_request(device, current, new);
        self.run_authenticated(&request)?;
        info!("Changed key slot 0 of {}", device.display());
        Ok(())
    }

    fn run_authenticated(&self, request: &CommandRequest) -> Result<CommandOutput> {
        let output = self.runner.run(request)?;
        if output.success() {
            return Ok(output);
        }
        Err(classify_failure(request, &output))
    }
}

/// `cryptsetup luksChangeKey --key-slot 0 <device>` with both credentials applied.
pub fn change_key_request(device: &Path, current: &AuthMethod, new: &AuthMethod) -> CommandRequest {
    let mut request = CommandRequest::new("cryptsetup");
    request
        .args(["luksChangeKey", "--key-slot", "0"])
        .arg(device.to_string_lossy().into_owned());
    current.apply_current(&mut request);
    new.apply_new(&mut request);
    request
}

/// Map a failed `cryptsetup` run to a key rejection or a generic tool failure.
fn classify_failure(request: &CommandRequest, output: &CommandOutput) -> SysError {
    let diagnostic = output.diagnostic();
    if output.status == EXIT_NO_KEY || diagnostic.contains("No key available") {
        return SysError::AuthenticationFailed(if diagnostic.is_empty() {
            "no key available with this passphrase or keyfile".to_string()
        } else {
            diagnostic
        });
    }
    SysError::ExternalToolFailure {
        command: request.render(),
        status: output.status,
        stderr: diagnostic,
    }
}

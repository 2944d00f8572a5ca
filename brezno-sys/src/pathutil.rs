// SPDX-License-Identifier: GPL-3.0-only

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use nix::unistd::Uid;
use tracing::warn;

use crate::error::{Result, SysError};
use crate::host::HostFs;

/// Permission bits that make a keyfile readable by group or others
const SHARED_READ_BITS: u32 = 0o044;

/// Resolve a keyfile to its canonical path and check that it can serve as key material.
///
/// Group or world readable keyfiles are accepted with a warning.
pub fn validate_keyfile(path: &Path) -> Result<PathBuf> {
    let resolved = fs::canonicalize(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            SysError::NotFound(format!("keyfile {}", path.display()))
        }
        _ => SysError::Io(e),
    })?;

    let metadata = fs::metadata(&resolved)?;
    if !metadata.is_file() {
        return Err(SysError::PreconditionFailed(format!(
            "Keyfile {} is not a regular file",
            resolved.display()
        )));
    }

    let mode = metadata.permissions().mode();
    if mode & SHARED_READ_BITS != 0 {
        warn!(
            "Keyfile {} is readable by group or others (mode {:o}); consider chmod 600",
            resolved.display(),
            mode & 0o777
        );
    }

    Ok(resolved)
}

/// Absolute form of a user-supplied container or mount point path.
///
/// Existing paths are fully canonicalized so they compare equal to what `losetup` reports.
pub fn canonical_container_path(path: &Path) -> Result<PathBuf> {
    match fs::canonicalize(path) {
        Ok(resolved) => Ok(resolved),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(std::path::absolute(path)?),
        Err(e) => Err(SysError::Io(e)),
    }
}

/// Fail unless running with an effective uid of 0.
pub fn require_root() -> Result<()> {
    if Uid::effective().is_root() {
        Ok(())
    } else {
        Err(SysError::PreconditionFailed(
            "This command must be run as root".to_string(),
        ))
    }
}

/// Free bytes on the filesystem that holds (or will hold) `path`.
pub fn available_space_for(host: &impl HostFs, path: &Path) -> Result<u64> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    host.available_space(&parent)
}

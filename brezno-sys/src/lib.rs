// SPDX-License-Identifier: GPL-3.0-only

//! System operations for file-backed LUKS containers
//!
//! This crate drives the standard Linux tools (`cryptsetup`, `losetup`, `dmsetup`, `mount`,
//! mkfs and growth tools) and rebuilds the set of active containers from live system state
//! on every query:
//! - Discovery of active containers
//! - Container creation, mounting and closing with rollback on failure
//! - Online resize of mounted containers
//! - Key slot credential rotation
//!
//! These operations require root privileges.

pub mod auth;
pub mod cleanup;
pub mod cmd;
pub mod credentials;
pub mod discovery;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod loop_dev;
pub mod luks;
pub mod mount;
pub mod parse;
pub mod pathutil;
pub mod resize;
pub mod secret;

#[cfg(test)]
mod fake;

pub use auth::AuthMethod;
pub use cleanup::{CleanupGuard, CleanupStack};
pub use cmd::{CommandOutput, CommandRequest, CommandRunner, SystemRunner};
pub use credentials::CredentialChanger;
pub use discovery::Discovery;
pub use error::{Result, SysError};
pub use host::{HostFs, LiveHost};
pub use lifecycle::{Lifecycle, generate_mapper_name};
pub use loop_dev::LoopManager;
pub use luks::LuksManager;
pub use mount::MountManager;
pub use pathutil::{available_space_for, canonical_container_path, require_root, validate_keyfile};
pub use resize::{ResizePlan, ResizeReport, Resizer};
pub use secret::SecretBuffer;

/// Tools every container operation relies on
pub const REQUIRED_TOOLS: &[&str] = &[
    "cryptsetup",
    "losetup",
    "dmsetup",
    "mount",
    "umount",
    "blockdev",
    "df",
];

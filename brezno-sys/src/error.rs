// SPDX-License-Identifier: GPL-3.0-only

use thiserror::Error;

/// Error types for container operations
#[derive(Error, Debug)]
pub enum SysError {
    /// Container, mount point, or credential file absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate open or mount
    #[error("Already active: {0}")]
    AlreadyActive(String),

    /// Wrong mount state, size not larger, insufficient space, ...
    #[error("{0}")]
    PreconditionFailed(String),

    /// The encryption tool rejected the supplied passphrase or keyfile
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// An external program exited non-zero
    #[error("{command} failed (exit code {status}): {stderr}")]
    ExternalToolFailure {
        command: String,
        status: i32,
        stderr: String,
    },

    /// A later stage of a multi-step mutation failed after earlier stages committed
    #[error("{0}")]
    PartialMutation(String),

    #[error("Required command not found: {0}")]
    ToolMissing(String),

    #[error("Failed to parse {what}: {reason}")]
    Parse { what: String, reason: String },

    #[error("Cleanup errors: {}", .0.join("; "))]
    Cleanup(Vec<String>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SysError {
    pub(crate) fn parse(what: impl Into<String>, reason: impl Into<String>) -> Self {
        SysError::Parse {
            what: what.into(),
            reason: reason.into(),
        }
    }

    /// Raw diagnostic text of a failed external tool, if this is one.
    pub fn tool_stderr(&self) -> Option<&str> {
        match self {
            SysError::ExternalToolFailure { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

/// Result type alias for system operations
pub type Result<T> = std::result::Result<T, SysError>;

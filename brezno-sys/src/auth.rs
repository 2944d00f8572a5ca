// SPDX-License-Identifier: GPL-3.0-only

//! Credentials for unlocking a container
//!
//! An [`AuthMethod`] is applied to a `cryptsetup` request in one of two roles. As the *current*
//! credential it proves access; as the *new* credential it is what `luksChangeKey` writes into
//! the key slot. The two roles place the credential differently on the command line, and when
//! both are passphrases they share one stdin stream (current line first), so they are separate
//! operations rather than one order-agnostic `apply`.

use std::path::{Path, PathBuf};

use crate::cmd::CommandRequest;
use crate::secret::SecretBuffer;

#[derive(Debug)]
pub enum AuthMethod {
    Password(SecretBuffer),
    Keyfile(PathBuf),
}

impl AuthMethod {
    pub fn password(secret: SecretBuffer) -> Self {
        AuthMethod::Password(secret)
    }

    pub fn keyfile(path: impl Into<PathBuf>) -> Self {
        AuthMethod::Keyfile(path.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AuthMethod::Password(_) => "password",
            AuthMethod::Keyfile(_) => "keyfile",
        }
    }

    pub fn keyfile_path(&self) -> Option<&Path> {
        match self {
            AuthMethod::Keyfile(path) => Some(path),
            AuthMethod::Password(_) => None,
        }
    }

    /// Apply as the credential that unlocks the container.
    ///
    /// A keyfile becomes `--key-file <path>`; a passphrase becomes the first stdin line.
    pub fn apply_current(&self, request: &mut CommandRequest) {
        match self {
            AuthMethod::Keyfile(path) => {
                request
                    .arg("--key-file")
                    .arg(path.to_string_lossy().into_owned());
            }
            AuthMethod::Password(secret) => {
                request.push_stdin_line(secret.expose());
            }
        }
    }

    /// Apply as the replacement credential of `luksChangeKey`.
    ///
    /// A keyfile becomes a trailing positional argument. A passphrase is appended to the stdin
    /// stream after the current passphrase, or opens a fresh stream when the current credential
    /// was a keyfile.
    pub fn apply_new(&self, request: &mut CommandRequest) {
        match self {
            AuthMethod::Keyfile(path) => {
                request.sensitive_arg(path.to_string_lossy().into_owned());
            }
            AuthMethod::Password(secret) => {
                request.push_stdin_line(secret.expose());
            }
        }
    }
}

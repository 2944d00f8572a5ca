// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Args;
use tracing::info;

use brezno_sys::SysError;

use super::{Context, path_or_prompt};
use crate::prompt::{PassphrasePrompt, auth_method};

/// Supports password -> password (no flags), password -> keyfile (`--new-keyfile`),
/// keyfile -> password (`--keyfile`) and keyfile -> keyfile (both).
#[derive(Debug, Args)]
pub struct PasswordArgs {
    /// Container file (must be closed)
    pub path: Option<PathBuf>,

    /// Current keyfile (prompts for the current passphrase when omitted)
    #[arg(short, long)]
    pub keyfile: Option<PathBuf>,

    /// New keyfile (prompts for a new passphrase when omitted)
    #[arg(long)]
    pub new_keyfile: Option<PathBuf>,

    /// Read passphrases from stdin, one per line (current, new, confirmation)
    #[arg(long)]
    pub password_stdin: bool,
}

pub fn run(ctx: &Context, args: PasswordArgs) -> Result<()> {
    ctx.preflight()?;

    let path = ctx
        .credentials()
        .ensure_closed(&path_or_prompt(args.path, "Container file path")?)?;

    info!("Enter current authentication credentials");
    let current = auth_method(
        args.keyfile.as_deref(),
        &PassphrasePrompt::UNLOCK,
        args.password_stdin,
    )?;

    info!("Enter new authentication credentials");
    let new = auth_method(
        args.new_keyfile.as_deref(),
        &PassphrasePrompt {
            enter: "Enter new passphrase",
            confirm: Some("Confirm new passphrase"),
        },
        args.password_stdin,
    )?;

    match ctx.credentials().change_key(&path, &current, &new) {
        Ok(()) => {}
        Err(SysError::AuthenticationFailed(_)) => {
            return Err(anyhow!("incorrect current passphrase or keyfile"));
        }
        Err(e) => return Err(e.into()),
    }

    ctx.say("Container credentials changed successfully");
    ctx.say(format!("Container: {}", path.display()));
    if current.kind() != new.kind() {
        ctx.say(format!(
            "Authentication changed: {} -> {}",
            current.kind(),
            new.kind()
        ));
    }
    Ok(())
}

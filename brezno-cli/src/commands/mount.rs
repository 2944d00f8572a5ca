// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use brezno_sys::canonical_container_path;

use super::{Context, path_or_prompt};
use crate::prompt::{PassphrasePrompt, auth_method};

#[derive(Debug, Args)]
pub struct MountArgs {
    /// Container file to open
    pub path: Option<PathBuf>,

    /// Directory to mount the filesystem on (created if missing)
    pub mount_point: Option<PathBuf>,

    /// Keyfile path (prompts for a passphrase when omitted)
    #[arg(short, long)]
    pub keyfile: Option<PathBuf>,

    /// Mount read-only
    #[arg(short, long)]
    pub readonly: bool,

    /// Read the passphrase from stdin
    #[arg(long)]
    pub password_stdin: bool,
}

pub fn run(ctx: &Context, args: MountArgs) -> Result<()> {
    ctx.preflight()?;

    let path = canonical_container_path(&path_or_prompt(args.path, "Container file path")?)?;
    let mount_point = canonical_container_path(&path_or_prompt(args.mount_point, "Mount point")?)?;

    let auth = auth_method(
        args.keyfile.as_deref(),
        &PassphrasePrompt::UNLOCK,
        args.password_stdin,
    )?;

    let mapper = ctx
        .lifecycle()
        .open_and_mount(&path, &mount_point, args.readonly, &auth)?;

    ctx.say(format!("Container mounted at: {}", mount_point.display()));
    ctx.say(format!("Mapper: /dev/mapper/{mapper}"));
    Ok(())
}

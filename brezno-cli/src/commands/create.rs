// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use anyhow::{Context as _, Result, bail};
use clap::Args;
use tracing::info;

use brezno_sys::{CommandRunner, canonical_container_path};
use brezno_types::{FilesystemType, bytes_to_pretty, parse_size};

use super::{Context, path_or_prompt};
use crate::prompt::{PassphrasePrompt, auth_method, prompt_string};

#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Path of the container file to create
    pub path: Option<PathBuf>,

    /// Container size (e.g. 1G, 100M)
    #[arg(short, long)]
    pub size: Option<String>,

    /// Filesystem type (ext4, xfs, btrfs)
    #[arg(short, long)]
    pub filesystem: Option<FilesystemType>,

    /// Keyfile path (prompts for a passphrase when omitted)
    #[arg(short, long)]
    pub keyfile: Option<PathBuf>,
}

pub fn run(ctx: &Context, args: CreateArgs) -> Result<()> {
    ctx.preflight()?;

    let path = canonical_container_path(&path_or_prompt(args.path, "Container file path")?)?;
    let size_text = match args.size {
        Some(size) => size,
        None => prompt_string("Container size (e.g. 1G, 10G)")?,
    };
    let size = parse_size(&size_text)?;
    let filesystem = args.filesystem.unwrap_or(ctx.config.default_filesystem);

    if !ctx.runner().command_exists(filesystem.mkfs_tool()) {
        bail!(
            "filesystem tool not found: {} (please install it)",
            filesystem.mkfs_tool()
        );
    }
    if path.exists() {
        bail!("file already exists: {}", path.display());
    }

    let auth = auth_method(args.keyfile.as_deref(), &PassphrasePrompt::NEW, false)?;

    info!(
        "Creating {} encrypted container: {}",
        bytes_to_pretty(&size, false),
        path.display()
    );
    ctx.lifecycle()
        .create(&path, size, filesystem, &auth)
        .with_context(|| format!("failed to create {}", path.display()))?;

    ctx.say(format!("Container created successfully: {}", path.display()));
    ctx.say(format!(
        "Size: {}, Filesystem: {}",
        bytes_to_pretty(&size, false),
        filesystem
    ));
    Ok(())
}

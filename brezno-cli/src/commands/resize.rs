// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Args;

use brezno_types::{bytes_to_pretty, parse_size};

use super::Context;
use crate::prompt::{PassphrasePrompt, auth_method, confirm, prompt_string};

#[derive(Debug, Args)]
pub struct ResizeArgs {
    /// Container file to grow (must be mounted)
    pub path: PathBuf,

    /// New container size (e.g. 20G, 500M)
    pub new_size: Option<String>,

    /// New container size, alternative to the positional argument
    #[arg(short, long, conflicts_with = "new_size")]
    pub size: Option<String>,

    /// Keyfile path for re-authentication
    #[arg(short, long)]
    pub keyfile: Option<PathBuf>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

pub fn run(ctx: &Context, args: ResizeArgs) -> Result<()> {
    ctx.preflight()?;

    let size_text = match args.new_size.or(args.size) {
        Some(size) => size,
        None => prompt_string("New container size (e.g. 20G, 500M)")?,
    };
    let new_size = parse_size(&size_text)?;

    let resizer = ctx.resizer();
    let plan = resizer.prepare(&args.path, new_size)?;
    let container = plan.container();

    ctx.say(format!("Container:   {}", plan.path().display()));
    ctx.say(format!("Mounted at:  {}", container.mount_point));
    ctx.say(format!("Filesystem:  {}", plan.filesystem()));
    ctx.say(format!(
        "Current:     {}",
        bytes_to_pretty(&plan.current_size(), false)
    ));
    ctx.say(format!(
        "New:         {} (+{})",
        bytes_to_pretty(&plan.new_size(), false),
        bytes_to_pretty(&plan.delta(), false)
    ));

    if !args.yes && !confirm("Proceed with resize?")? {
        bail!("resize cancelled");
    }

    let auth = auth_method(args.keyfile.as_deref(), &PassphrasePrompt::UNLOCK, false)?;
    let report = resizer.execute(plan, &auth)?;

    ctx.say(format!(
        "Container resized: {} -> {}",
        bytes_to_pretty(&report.old_size, false),
        bytes_to_pretty(&report.new_size, false)
    ));
    if let Some(size) = report.filesystem_size {
        ctx.say(format!("Filesystem size: {}", bytes_to_pretty(&size, false)));
    }
    Ok(())
}

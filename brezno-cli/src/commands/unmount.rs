// SPDX-License-Identifier: GPL-3.0-only

use anyhow::{Context as _, Result, anyhow};
use clap::Args;

use super::Context;
use crate::prompt::prompt_string;

#[derive(Debug, Args)]
pub struct UnmountArgs {
    /// Container path, mount point or mapper name
    pub target: Option<String>,

    /// Force the unmount (falls back to a lazy unmount)
    #[arg(short, long)]
    pub force: bool,
}

pub fn run(ctx: &Context, args: UnmountArgs) -> Result<()> {
    ctx.preflight()?;

    let target = match args.target {
        Some(target) => target,
        None => prompt_string("Container path, mount point, or mapper name")?,
    };

    let lifecycle = ctx.lifecycle();
    let container = lifecycle
        .resolve(&target)?
        .ok_or_else(|| anyhow!("no active container found matching: {target}"))?;

    lifecycle
        .close(&container, args.force)
        .with_context(|| format!("failed to close {}", container.mapper_name))?;

    ctx.say("Container closed successfully");
    if !container.path.is_empty() {
        ctx.say(format!("Container: {}", container.path));
    }
    Ok(())
}

// SPDX-License-Identifier: GPL-3.0-only

use anyhow::{Context as _, Result};
use clap::Args;

use super::Context;
use crate::output::{render_json, render_table, render_verbose};

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Print JSON
    #[arg(short, long)]
    pub json: bool,
}

pub fn run(ctx: &Context, args: ListArgs) -> Result<()> {
    ctx.preflight()?;

    let containers = ctx
        .discovery()
        .discover_active()
        .context("failed to discover containers")?;

    if args.json {
        println!("{}", render_json(&containers)?);
        return Ok(());
    }

    if containers.is_empty() {
        println!("No active containers found");
    } else if ctx.verbose {
        println!("{}", render_verbose(&containers));
    } else {
        println!("{}", render_table(&containers));
    }
    Ok(())
}

// SPDX-License-Identifier: GPL-3.0-only

//! brezno: manage file-backed LUKS2 containers with the standard Linux tools

mod commands;
mod config;
mod logging;
mod output;
mod prompt;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::Context;
use commands::create::CreateArgs;
use commands::list::ListArgs;
use commands::mount::MountArgs;
use commands::password::PasswordArgs;
use commands::resize::ResizeArgs;
use commands::unmount::UnmountArgs;
use config::Config;
use logging::Verbosity;

/// dm-crypt container manager
#[derive(Debug, Parser)]
#[command(name = "brezno", version)]
#[command(
    about = "Manage LUKS2 encrypted container files",
    long_about = "brezno creates, mounts, resizes and re-keys LUKS2 encrypted container files \
                  using cryptsetup, losetup and dm-crypt. It keeps no state of its own: active \
                  containers are discovered from the running system."
)]
struct Cli {
    /// Verbose output (also selects the detailed `list` form)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Show every executed command
    #[arg(long, global = true)]
    debug: bool,

    /// Configuration file (default: $BREZNO_CONFIG or /etc/brezno/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a new encrypted container
    Create(CreateArgs),
    /// Open and mount an encrypted container
    Mount(MountArgs),
    /// Unmount and close an encrypted container
    Unmount(UnmountArgs),
    /// List active encrypted containers
    List(ListArgs),
    /// Grow a mounted encrypted container
    Resize(ResizeArgs),
    /// Change the passphrase or keyfile of a closed container
    Password(PasswordArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    let verbosity = Verbosity {
        verbose: cli.verbose,
        quiet: cli.quiet,
        debug: cli.debug,
    };
    let _log_guard = logging::init(
        verbosity.level(config.log_level),
        config.color && !cli.no_color,
        config.log_dir.as_deref(),
    );

    let ctx = Context::new(config, cli.verbose, cli.quiet);
    match cli.command {
        Command::Create(args) => commands::create::run(&ctx, args),
        Command::Mount(args) => commands::mount::run(&ctx, args),
        Command::Unmount(args) => commands::unmount::run(&ctx, args),
        Command::List(args) => commands::list::run(&ctx, args),
        Command::Resize(args) => commands::resize::run(&ctx, args),
        Command::Password(args) => commands::password::run(&ctx, args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let cli = Cli::try_parse_from(["brezno", "list", "-v", "--json"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::List(ListArgs { json: true })));
    }

    #[test]
    fn resize_accepts_positional_or_flag_size() {
        let cli = Cli::try_parse_from(["brezno", "resize", "c.img", "20G", "-y"]).unwrap();
        match cli.command {
            Command::Resize(args) => {
                assert_eq!(args.new_size.as_deref(), Some("20G"));
                assert!(args.yes);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(Cli::try_parse_from(["brezno", "resize", "c.img", "20G", "-s", "30G"]).is_err());
    }

    #[test]
    fn create_parses_filesystem() {
        let cli =
            Cli::try_parse_from(["brezno", "create", "c.img", "-s", "1G", "-f", "xfs"]).unwrap();
        match cli.command {
            Command::Create(args) => {
                assert_eq!(args.filesystem, Some(brezno_types::FilesystemType::Xfs));
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(Cli::try_parse_from(["brezno", "create", "c.img", "-f", "ntfs"]).is_err());
    }
}

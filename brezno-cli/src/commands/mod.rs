// SPDX-License-Identifier: GPL-3.0-only

pub mod create;
pub mod list;
pub mod mount;
pub mod password;
pub mod resize;
pub mod unmount;

use std::path::PathBuf;

use anyhow::Result;

use brezno_sys::{
    CommandRunner, CredentialChanger, Discovery, Lifecycle, LiveHost, REQUIRED_TOOLS, Resizer,
    SystemRunner, require_root,
};

use crate::config::Config;
use crate::prompt::prompt_string;

/// State shared by every subcommand
pub struct Context {
    pub config: Config,
    pub verbose: bool,
    pub quiet: bool,
    runner: SystemRunner,
    host: LiveHost,
}

impl Context {
    pub fn new(config: Config, verbose: bool, quiet: bool) -> Self {
        Self {
            config,
            verbose,
            quiet,
            runner: SystemRunner::new(),
            host: LiveHost,
        }
    }

    pub fn runner(&self) -> &SystemRunner {
        &self.runner
    }

    /// Root privileges and the base tool set, checked before any subcommand touches the system.
    pub fn preflight(&self) -> Result<()> {
        require_root()?;
        self.runner.check_dependencies(REQUIRED_TOOLS)?;
        Ok(())
    }

    pub fn discovery(&self) -> Discovery<&SystemRunner, &LiveHost> {
        Discovery::new(&self.runner, &self.host)
    }

    pub fn lifecycle(&self) -> Lifecycle<&SystemRunner, &LiveHost> {
        Lifecycle::new(&self.runner, &self.host)
    }

    pub fn resizer(&self) -> Resizer<&SystemRunner, &LiveHost> {
        Resizer::new(&self.runner, &self.host)
    }

    pub fn credentials(&self) -> CredentialChanger<&SystemRunner, &LiveHost> {
        CredentialChanger::new(&self.runner, &self.host)
    }

    /// Print a result line unless `--quiet` was given.
    pub fn say(&self, message: impl AsRef<str>) {
        if !self.quiet {
            println!("{}", message.as_ref());
        }
    }
}

/// Use the positional argument when given, otherwise ask for it.
pub(crate) fn path_or_prompt(value: Option<PathBuf>, prompt: &str) -> Result<PathBuf> {
    match value {
        Some(path) => Ok(path),
        None => {
            let input = prompt_string(prompt)?;
            if input.is_empty() {
                anyhow::bail!("{prompt} is required");
            }
            Ok(PathBuf::from(input))
        }
    }
}

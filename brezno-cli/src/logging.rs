// SPDX-License-Identifier: GPL-3.0-only

use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingLevel;

const LOG_PREFIX: &str = "brezno.log";

/// Console verbosity chosen on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verbosity {
    pub verbose: bool,
    pub quiet: bool,
    pub debug: bool,
}

impl Verbosity {
    /// Flags win over the configured level; `--debug` also shows every executed command.
    pub fn level(self, configured: LoggingLevel) -> LoggingLevel {
        if self.debug {
            LoggingLevel::Trace
        } else if self.verbose {
            LoggingLevel::Debug
        } else if self.quiet {
            LoggingLevel::Warn
        } else {
            configured
        }
    }
}

/// Install the stderr subscriber and, with `log_dir`, a daily file layer.
///
/// `RUST_LOG` overrides the computed level. The returned guard must live until exit so the
/// file writer flushes.
pub fn init(level: LoggingLevel, color: bool, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_directive()));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .with_ansi(color);

    let file = log_dir.and_then(|dir| match fs::create_dir_all(dir) {
        Ok(()) => Some(tracing_appender::non_blocking(
            tracing_appender::rolling::daily(dir, LOG_PREFIX),
        )),
        Err(e) => {
            eprintln!("brezno: failed to create log directory {}: {e}", dir.display());
            None
        }
    });

    match file {
        Some((writer, guard)) => {
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .with(file_layer)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .init();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_configured_level() {
        let flags = |verbose, quiet, debug| Verbosity {
            verbose,
            quiet,
            debug,
        };
        assert_eq!(
            flags(false, false, false).level(LoggingLevel::Error),
            LoggingLevel::Error
        );
        assert_eq!(
            flags(true, false, false).level(LoggingLevel::Info),
            LoggingLevel::Debug
        );
        assert_eq!(
            flags(false, true, false).level(LoggingLevel::Info),
            LoggingLevel::Warn
        );
        assert_eq!(
            flags(true, true, true).level(LoggingLevel::Info),
            LoggingLevel::Trace
        );
    }
}

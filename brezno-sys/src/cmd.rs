// SPDX-License-Identifier: GPL-3.0-only

//! External command execution
//!
//! Every interaction with the system tools (`cryptsetup`, `losetup`, `dmsetup`, `mount`, `df`,
//! mkfs and growth tools) goes through a [`CommandRunner`], so engines can be driven by a
//! scripted runner in tests.

use std::io::Write;
use std::process::{Command, Stdio};

use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{Result, SysError};

/// Flags whose following argument is a credential path and is never logged.
const SENSITIVE_FLAGS: &[&str] = &["--key-file", "-k"];

/// A program invocation with optional secret input on stdin.
#[derive(Debug, Default)]
pub struct CommandRequest {
    program: String,
    args: Vec<String>,
    sensitive: Vec<usize>,
    stdin: Option<Zeroizing<Vec<u8>>>,
}

impl CommandRequest {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(&mut self, value: impl Into<String>) -> &mut Self {
        self.args.push(value.into());
        self
    }

    pub fn args<I, S>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for value in values {
            self.args.push(value.into());
        }
        self
    }

    /// Append an argument that must be redacted when the command is rendered.
    pub fn sensitive_arg(&mut self, value: impl Into<String>) -> &mut Self {
        self.sensitive.push(self.args.len());
        self.args.push(value.into());
        self
    }

    /// Append one newline-terminated line to the stdin stream, opening it if needed.
    ///
    /// Lines are consumed by the tool in the order they were pushed.
    pub fn push_stdin_line(&mut self, line: &[u8]) -> &mut Self {
        let stream = self.stdin.get_or_insert_with(|| Zeroizing::new(Vec::new()));
        stream.extend_from_slice(line);
        stream.push(b'\n');
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn stdin(&self) -> Option<&[u8]> {
        self.stdin.as_ref().map(|stream| stream.as_slice())
    }

    pub fn has_stdin(&self) -> bool {
        self.stdin.is_some()
    }

    /// Loggable form of the command with credentials replaced by `[REDACTED]`.
    pub fn render(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());

        let mut redact_next = false;
        for (index, arg) in self.args.iter().enumerate() {
            if redact_next || self.sensitive.contains(&index) {
                parts.push("[REDACTED]".to_string());
            } else {
                parts.push(arg.clone());
            }
            redact_next = SENSITIVE_FLAGS.contains(&arg.as_str());
        }

        let mut rendered = parts.join(" ");
        if self.stdin.is_some() {
            rendered.push_str(" < [STDIN]");
        }
        rendered
    }
}

/// Captured result of a finished program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// stderr when present, stdout otherwise
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            stderr.to_string()
        } else {
            self.stdout.trim().to_string()
        }
    }
}

/// Capability to run external programs.
pub trait CommandRunner {
    /// Run the request to completion. A non-zero exit is not an error at this level; only a
    /// failure to execute the program at all is.
    fn run(&self, request: &CommandRequest) -> Result<CommandOutput>;

    /// Whether `name` can be found on `PATH`.
    fn command_exists(&self, name: &str) -> bool;

    /// Run and turn a non-zero exit into [`SysError::ExternalToolFailure`].
    fn run_checked(&self, request: &CommandRequest) -> Result<CommandOutput> {
        let output = self.run(request)?;
        if !output.success() {
            return Err(SysError::ExternalToolFailure {
                command: request.render(),
                status: output.status,
                stderr: output.diagnostic(),
            });
        }
        Ok(output)
    }

    /// Run `program args...` and return its stdout.
    fn run_output(&self, program: &str, args: &[&str]) -> Result<String> {
        let mut request = CommandRequest::new(program);
        request.args(args.iter().copied());
        Ok(self.run_checked(&request)?.stdout)
    }

    /// Verify that every tool in `deps` is installed, reporting all missing ones at once.
    fn check_dependencies(&self, deps: &[&str]) -> Result<()> {
        let missing: Vec<&str> = deps
            .iter()
            .copied()
            .filter(|dep| !self.command_exists(dep))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SysError::ToolMissing(missing.join(", ")))
        }
    }
}

impl<T: CommandRunner + ?Sized> CommandRunner for &T {
    fn run(&self, request: &CommandRequest) -> Result<CommandOutput> {
        (**self).run(request)
    }

    fn command_exists(&self, name: &str) -> bool {
        (**self).command_exists(name)
    }
}

/// Runs programs on the host with `std::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, request: &CommandRequest) -> Result<CommandOutput> {
        debug!("Executing: {}", request.render());

        let mut command = Command::new(request.program());
        command
            .args(request.get_args())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if request.has_stdin() {
                Stdio::piped()
            } else {
                Stdio::null()
            });

        let mut child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SysError::ToolMissing(request.program().to_string())
            } else {
                SysError::Io(e)
            }
        })?;

        if let (Some(payload), Some(mut stdin)) = (request.stdin(), child.stdin.take()) {
            // The tool may exit before reading everything (e.g. on a bad key); its exit
            // status carries the real error.
            if let Err(e) = stdin.write_all(payload) {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(SysError::Io(e));
                }
            }
        }

        let output = child.wait_with_output()?;
        let result = CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if !result.success() {
            debug!(
                "{} exited with {}: {}",
                request.program(),
                result.status,
                result.diagnostic()
            );
        }
        Ok(result)
    }

    fn command_exists(&self, name: &str) -> bool {
        which::which(name).is_ok()
    }
}

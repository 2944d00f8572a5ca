// SPDX-License-Identifier: GPL-3.0-only

//! Scripted runner and host used by the engine tests

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::Mutex;

use crate::cmd::{CommandOutput, CommandRequest, CommandRunner};
use crate::error::{Result, SysError};
use crate::host::HostFs;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub line: String,
    pub stdin: Option<Vec<u8>>,
}

/// Answers commands from a script keyed by the full command line.
///
/// Unscripted commands succeed with empty output. A line scripted several times answers in
/// order, repeating the last answer once the queue is down to one.
#[derive(Default)]
pub struct FakeRunner {
    responses: Mutex<HashMap<String, VecDeque<CommandOutput>>>,
    calls: Mutex<Vec<RecordedCall>>,
    missing: HashSet<String>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, line: &str, stdout: &str) -> Self {
        self.script(
            line,
            CommandOutput {
                status: 0,
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
        )
    }

    pub fn fail(self, line: &str, status: i32, stderr: &str) -> Self {
        self.script(
            line,
            CommandOutput {
                status,
                stdout: String::new(),
                stderr: stderr.to_string(),
            },
        )
    }

    pub fn without_tool(mut self, name: &str) -> Self {
        self.missing.insert(name.to_string());
        self
    }

    fn script(self, line: &str, output: CommandOutput) -> Self {
        self.responses
            .lock()
            .unwrap()
            .entry(line.to_string())
            .or_default()
            .push_back(output);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.line).collect()
    }

    pub fn ran(&self, prefix: &str) -> bool {
        self.lines().iter().any(|line| line.starts_with(prefix))
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, request: &CommandRequest) -> Result<CommandOutput> {
        if self.missing.contains(request.program()) {
            return Err(SysError::ToolMissing(request.program().to_string()));
        }

        let mut line = request.program().to_string();
        for arg in request.get_args() {
            line.push(' ');
            line.push_str(arg);
        }

        self.calls.lock().unwrap().push(RecordedCall {
            line: line.clone(),
            stdin: request.stdin().map(<[u8]>::to_vec),
        });

        let mut responses = self.responses.lock().unwrap();
        let output = match responses.get_mut(&line) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_default(),
            Some(queue) => queue.front().cloned().unwrap_or_default(),
            None => CommandOutput::default(),
        };
        Ok(output)
    }

    fn command_exists(&self, name: &str) -> bool {
        !self.missing.contains(name)
    }
}

/// Fixed mount table and free-space answer.
#[derive(Debug, Default)]
pub struct FakeHost {
    pub mounts: String,
    pub available: Option<u64>,
}

impl FakeHost {
    pub fn new(mounts: &str, available: Option<u64>) -> Self {
        Self {
            mounts: mounts.to_string(),
            available,
        }
    }
}

impl HostFs for FakeHost {
    fn mount_table(&self) -> Result<String> {
        Ok(self.mounts.clone())
    }

    fn available_space(&self, path: &Path) -> Result<u64> {
        self.available.ok_or_else(|| {
            SysError::Io(std::io::Error::other(format!(
                "statvfs {} unavailable",
                path.display()
            )))
        })
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// External process execution.
//
// Print dispatch and printer enumeration both shell out to host utilities.
// They do so through `CommandRunner` so that tests can observe the exact argv
// (and the artifact it names) without a print subsystem being present.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use druckbote_core::Dialect;
use druckbote_core::error::Result;
use tokio::process::Command;
use tracing::debug;

use crate::codec;

/// A program plus its argument vector.  Never passed through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl ProcessCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Escaped command line for logs.  Fails if any part contains NUL.
    pub fn command_line(&self, dialect: Dialect) -> Result<String> {
        codec::command_line(&self.program.to_string_lossy(), &self.args, dialect)
    }
}

/// What a finished process left behind.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    /// Exit code, `None` when terminated by a signal.
    pub exit_status: Option<i32>,
    pub success: bool,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Runs external commands to completion.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` and collect its output.  `Err` only when the process
    /// could not be launched at all.
    async fn run(&self, command: &ProcessCommand) -> std::io::Result<ProcessOutput>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, command: &ProcessCommand) -> std::io::Result<ProcessOutput> {
        debug!(program = %command.program.display(), args = ?command.args, "spawning process");

        let output = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(ProcessOutput {
            exit_status: output.status.code(),
            success: output.status.success(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

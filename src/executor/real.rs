//! Real command executor implementation.
//!
//! This module provides [`RealCommandExecutor`], which executes commands
//! using `std::process::Command` with real-time output streaming and
//! stdout/stderr merged into one captured buffer.

use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use which::which;

use super::pipe::{OutputBuffer, StreamType, collect_output, panic_message, read_pipe_to_log};
use super::{CommandExecutor, CommandSpec, ExecutionResult};
use crate::error::RsinitrdError;

/// Cleans up a child process and its associated reader threads.
///
/// Called from error paths in [`RealCommandExecutor::execute()`] to ensure
/// proper cleanup when thread spawning or process waiting fails.
fn cleanup_child_process<I>(child: &mut Child, handles: I)
where
    I: IntoIterator<Item = JoinHandle<()>>,
{
    let pid = child.id();
    if let Err(e) = child.kill() {
        tracing::debug!(pid = pid, "kill returned error (process may have already exited): {}", e);
    }
    if let Err(e) = child.wait() {
        tracing::warn!(pid = pid, "failed to wait for child process after kill: {}", e);
    }
    for handle in handles {
        if let Err(e) = handle.join() {
            tracing::warn!("reader thread panicked during cleanup: {}", panic_message(&*e));
        }
    }
}

fn execution_error(spec: &CommandSpec, status: String) -> anyhow::Error {
    RsinitrdError::Execution {
        command: spec.command_line(),
        status,
    }
    .into()
}

/// Command executor that runs actual system commands.
///
/// When `dry_run` is true, commands are logged but not executed,
/// and `execute()` returns a result without exit status.
/// A running command is waited on without a timeout.
pub struct RealCommandExecutor {
    pub dry_run: bool,
}

impl CommandExecutor for RealCommandExecutor {
    fn execute(&self, spec: &CommandSpec) -> Result<ExecutionResult> {
        if self.dry_run {
            tracing::info!("dry run: {}", spec.command_line());
            return Ok(ExecutionResult::default());
        }

        let cmd = which(&spec.command).map_err(|_| RsinitrdError::CommandNotFound {
            command: spec.command.clone(),
        })?;
        tracing::trace!("command found: {}: {}", spec.command, cmd.to_string_lossy());

        let mut command = Command::new(cmd);
        command.args(&spec.args);

        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .with_context(|| format!("failed to spawn command `{}`", spec.command_line()))?;

        tracing::trace!("spawned command: {}: pid={}", spec.command, child.id());

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let buffer = OutputBuffer::default();

        let stdout_buffer = Arc::clone(&buffer);
        let stdout_handle = match thread::Builder::new()
            .name("stdout-reader".to_string())
            .spawn(move || read_pipe_to_log(stdout_pipe, StreamType::Stdout, stdout_buffer))
        {
            Ok(handle) => handle,
            Err(e) => {
                cleanup_child_process(&mut child, []);
                return Err(execution_error(
                    spec,
                    format!("failed to spawn stdout reader thread: {}", e),
                ));
            }
        };

        let stderr_buffer = Arc::clone(&buffer);
        let stderr_handle = match thread::Builder::new()
            .name("stderr-reader".to_string())
            .spawn(move || read_pipe_to_log(stderr_pipe, StreamType::Stderr, stderr_buffer))
        {
            Ok(handle) => handle,
            Err(e) => {
                cleanup_child_process(&mut child, [stdout_handle]);
                return Err(execution_error(
                    spec,
                    format!("failed to spawn stderr reader thread: {}", e),
                ));
            }
        };

        let status = match child.wait() {
            Ok(s) => s,
            Err(e) => {
                cleanup_child_process(&mut child, [stdout_handle, stderr_handle]);
                return Err(execution_error(spec, format!("failed to wait for command: {}", e)));
            }
        };

        let mut panicked_streams = Vec::new();
        let handles = [("stdout", stdout_handle), ("stderr", stderr_handle)];
        for (name, handle) in handles {
            if let Err(e) = handle.join() {
                let msg = panic_message(&*e);
                tracing::error!(stream = name, panic = msg, "reader thread panicked");
                panicked_streams.push(format!("{}: {}", name, msg));
            }
        }

        if !panicked_streams.is_empty() {
            return Err(execution_error(
                spec,
                format!(
                    "reader thread(s) panicked during command execution: {}",
                    panicked_streams.join(", ")
                ),
            ));
        }

        tracing::trace!("executed command: {}: success={}", spec.command, status.success());

        Ok(ExecutionResult {
            status: Some(status),
            output: collect_output(&buffer),
        })
    }
}

//! Command execution abstraction for rsinitrd.
//!
//! This module provides:
//! - [`CommandSpec`]: Specification for commands to execute
//! - [`ExecutionResult`]: Result of command execution, including merged output
//! - [`CommandExecutor`]: Trait for command execution strategies
//! - [`RealCommandExecutor`]: Production implementation using `std::process::Command`
//! - [`execute_checked`]: Runs a command and turns a non-zero exit into an error

mod pipe;
mod real;

use std::process::ExitStatus;

use anyhow::Result;

use crate::error::RsinitrdError;

pub use real::RealCommandExecutor;

/// Formats string arguments into a space-separated, debug-quoted string.
///
/// Used by error messages and dry-run output to consistently format
/// command arguments (e.g., `"--force" "initrd.xz"`).
pub(crate) fn format_command_args(args: &[String]) -> String {
    args.iter()
        .map(|a| format!("{:?}", a))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Specification for a command to be executed.
///
/// Arguments are always an explicit token list; nothing is interpreted by a shell.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// The command to execute (e.g., "chroot")
    pub command: String,
    /// Command arguments
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Creates a new CommandSpec with command and args
    #[must_use]
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    /// Returns the command and its arguments as one display string.
    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, format_command_args(&self.args))
        }
    }
}

/// Result of command execution
#[derive(Debug, Default)]
pub struct ExecutionResult {
    /// Exit status of the command (None in dry-run mode)
    pub status: Option<ExitStatus>,
    /// Combined stdout and stderr lines, in the order they were read
    pub output: String,
}

impl ExecutionResult {
    /// Returns true if the command executed successfully.
    ///
    /// In dry-run mode (status is None), this always returns true.
    pub fn success(&self) -> bool {
        self.status.is_none_or(|s| s.success())
    }

    /// Returns the exit code if available
    pub fn code(&self) -> Option<i32> {
        self.status.and_then(|s| s.code())
    }
}

/// Trait for command execution.
///
/// Implementations must be `Send + Sync` so one executor can be shared
/// through an `Arc<dyn CommandExecutor>`.
pub trait CommandExecutor: Send + Sync {
    /// Executes a command with the given specification.
    fn execute(&self, spec: &CommandSpec) -> Result<ExecutionResult>;
}

/// Executes a command and fails with [`RsinitrdError::CommandFailed`] on a
/// non-zero exit status.
///
/// The captured output is carried in the error so callers can surface it.
/// No retry is attempted.
pub fn execute_checked(
    executor: &dyn CommandExecutor,
    spec: &CommandSpec,
) -> Result<ExecutionResult> {
    let result = executor.execute(spec)?;
    if !result.success() {
        let status = match result.status {
            Some(status) => status.to_string(),
            None => "unknown".to_string(),
        };
        return Err(RsinitrdError::CommandFailed {
            command: spec.command_line(),
            status,
            output: result.output,
        }
        .into());
    }
    Ok(result)
}

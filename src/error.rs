//! Domain-specific error types for rsinitrd.
//!
//! This module defines `RsinitrdError`, a `thiserror`-based enum that
//! provides typed error variants for common failure modes. Public API
//! functions return `Result<T, RsinitrdError>` for programmatic error
//! handling, while trait boundaries continue to use `anyhow::Result`.
//!
//! `RsinitrdError` implements `Into<anyhow::Error>`, so the `?` operator
//! converts it automatically at trait boundaries that return `anyhow::Result`.

use std::io;

/// Formats an IO error kind into a human-readable message.
///
/// Provides consistent, user-friendly messages for common IO error kinds
/// (e.g., "I/O error: not found") instead of the OS-level messages
/// (e.g., "No such file or directory (os error 2)"). For unrecognized
/// error kinds, falls back to including the OS-level error message
/// directly.
pub(crate) fn io_error_kind_message(err: &io::Error) -> String {
    match err.kind() {
        io::ErrorKind::NotFound => "I/O error: not found".to_string(),
        io::ErrorKind::PermissionDenied => "I/O error: permission denied".to_string(),
        io::ErrorKind::IsADirectory => "I/O error: is a directory".to_string(),
        _ => format!("I/O error: {}", err),
    }
}

/// Appends captured command output to an error message, if any.
fn format_output(output: &str) -> String {
    let trimmed = output.trim_end();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("\n{}", trimmed)
    }
}

/// Domain-specific error type for rsinitrd.
///
/// Provides typed variants for common failure modes, enabling callers
/// to match on error kinds programmatically rather than parsing error
/// message strings.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RsinitrdError {
    /// A validation constraint was violated.
    #[error("validation error: {0}")]
    Validation(String),

    /// The command could not be found in PATH.
    #[error("command not found in PATH: {command}")]
    CommandNotFound {
        /// The command that was looked up.
        command: String,
    },

    /// A command could not be run to completion (spawn failure, wait failure, thread panic, etc.).
    #[error("command execution failed: {command}: {status}")]
    Execution {
        /// The command that was executed.
        command: String,
        /// Human-readable description of the internal failure.
        status: String,
    },

    /// A command ran but exited unsuccessfully.
    #[error("{command} exited with non-zero status: {status}{}", format_output(.output))]
    CommandFailed {
        /// The command line that was executed.
        command: String,
        /// Exit code or signal information.
        status: String,
        /// Combined stdout/stderr captured while the command ran.
        output: String,
    },

    /// No kernel is installed in the inspected root tree.
    #[error("no installed kernel found in {root}")]
    KernelNotFound {
        /// The root tree that was inspected.
        root: String,
    },

    /// A boot image operation failed.
    #[error("boot image error: {0}")]
    BootImage(String),

    /// A configuration file could not be loaded or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O operation failed with contextual information.
    #[error("{context}: {message}")]
    Io {
        /// What was being done when the error occurred.
        ///
        /// This is either a file path (e.g., `"/etc/dracut.conf.d/02-rsinitrd.conf"`)
        /// or an operation description with a path.
        context: String,
        /// Human-readable description of the I/O failure, derived from
        /// [`io_error_kind_message`].
        message: String,
        /// The underlying I/O error, preserved for programmatic inspection.
        #[source]
        source: std::io::Error,
    },
}

impl RsinitrdError {
    /// Creates an `Io` variant with the `message` field automatically derived
    /// from the `source` via [`io_error_kind_message`].
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            message: io_error_kind_message(&source),
            source,
        }
    }
}

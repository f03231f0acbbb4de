//! Internal utilities for streaming command output to logs.
//!
//! This module handles reading from stdout/stderr pipes, logging the
//! output in real-time and collecting it into one merged buffer.

use std::io::{BufRead, BufReader, Read};
use std::sync::{Arc, Mutex};

/// Shared buffer that both reader threads append complete lines to.
pub(super) type OutputBuffer = Arc<Mutex<Vec<String>>>;

/// Type of output stream for logging purposes.
#[derive(Clone, Copy)]
pub(super) enum StreamType {
    Stdout,
    Stderr,
}

impl std::fmt::Display for StreamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
        }
    }
}

/// Extracts a human-readable message from a thread panic.
pub(super) fn panic_message(err: &(dyn std::any::Any + Send)) -> &str {
    err.downcast_ref::<&str>()
        .copied()
        .or_else(|| err.downcast_ref::<String>().map(|s| s.as_str()))
        .unwrap_or("unknown panic")
}

/// Joins collected lines back into a newline-terminated string.
pub(super) fn collect_output(buffer: &OutputBuffer) -> String {
    let lines = match buffer.lock() {
        Ok(lines) => lines,
        Err(poisoned) => poisoned.into_inner(),
    };
    let mut output = String::new();
    for line in lines.iter() {
        output.push_str(line);
        output.push('\n');
    }
    output
}

/// Reads from a pipe, logs each line and appends it to the shared buffer.
///
/// - stdout is logged at INFO level, stderr at WARN level.
/// - Binary data uses lossy UTF-8 conversion
/// - I/O errors stop reading but don't fail command execution
///   (command success is determined by exit status)
/// - `None` pipe logs an error and returns (unexpected if `Stdio::piped()` was set)
pub(super) fn read_pipe_to_log<R: Read>(
    pipe: Option<R>,
    stream_type: StreamType,
    buffer: OutputBuffer,
) {
    let Some(pipe) = pipe else {
        tracing::error!(
            stream = %stream_type,
            "pipe was None (unexpected: Stdio::piped() was set), no output will be captured"
        );
        return;
    };

    let mut reader = BufReader::new(pipe);
    let mut line_buf = Vec::new();

    loop {
        line_buf.clear();
        match reader.read_until(b'\n', &mut line_buf) {
            Ok(0) => break, // EOF
            Ok(_) => {
                let content = line_buf.strip_suffix(b"\n").unwrap_or(&line_buf);
                let line = log_line(content, stream_type);
                match buffer.lock() {
                    Ok(mut lines) => lines.push(line),
                    Err(poisoned) => poisoned.into_inner().push(line),
                }
            }
            Err(e) => {
                tracing::error!(stream = %stream_type, error = %e, "I/O error, stopping read");
                break;
            }
        }
    }
}

/// Logs a complete line at the appropriate level and returns it.
///
/// Trailing CR is trimmed to handle CRLF line endings.
fn log_line(line: &[u8], stream_type: StreamType) -> String {
    let text = String::from_utf8_lossy(line);
    let trimmed = text.trim_end_matches('\r');
    match stream_type {
        StreamType::Stdout => tracing::info!(stream = %stream_type, "{}", trimmed),
        StreamType::Stderr => tracing::warn!(stream = %stream_type, "{}", trimmed),
    }
    trimmed.to_string()
}

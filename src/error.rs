//! Domain-specific error types for shellout.
//!
//! This module defines `ShelloutError`, a `thiserror`-based enum that
//! provides typed error variants for every failure mode of command building
//! and execution. Library functions return `Result<T, ShelloutError>` so
//! callers can match on the failure kind (and recover captured output),
//! while the CLI layer works with `anyhow::Result`.
//!
//! `ShelloutError` implements `Into<anyhow::Error>`, so the `?` operator
//! converts it automatically at boundaries that return `anyhow::Result`.

use std::io;

use crate::executor::ExecutionResult;

/// Formats an IO error kind into a human-readable message.
///
/// Provides consistent, user-friendly messages for common IO error kinds
/// (e.g., "I/O error: not found") instead of the OS-level messages
/// (e.g., "No such file or directory (os error 2)"). For unrecognized
/// error kinds, falls back to including the OS-level error message
/// directly (e.g., "I/O error: connection refused").
pub(crate) fn io_error_kind_message(err: &io::Error) -> String {
    match err.kind() {
        io::ErrorKind::NotFound => "I/O error: not found".to_string(),
        io::ErrorKind::PermissionDenied => "I/O error: permission denied".to_string(),
        io::ErrorKind::IsADirectory => "I/O error: is a directory".to_string(),
        io::ErrorKind::NotADirectory => "I/O error: not a directory".to_string(),
        _ => format!("I/O error: {}", err),
    }
}

/// Domain-specific error type for shellout.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ShelloutError {
    /// The command line could not be split into arguments (e.g., unbalanced quotes).
    #[error("malformed command `{command}`: {reason}")]
    MalformedCommand {
        /// The raw command text.
        command: String,
        /// Why tokenization failed.
        reason: String,
    },

    /// An inherited environment entry has no `=` separator.
    ///
    /// Entries come from the running process, so this indicates a broken
    /// invariant rather than bad user input.
    #[error("malformed environment entry (missing '='): {entry:?}")]
    MalformedEnvironmentEntry {
        /// The offending entry.
        entry: String,
    },

    /// An environment override cannot be applied to a child process.
    #[error("environment resolution failed: {0}")]
    EnvironmentResolution(String),

    /// The program could not be located on the resolved `PATH`.
    #[error("command not found in PATH: {command}: {reason}")]
    CommandNotFound {
        /// The program name that was looked up.
        command: String,
        /// The lookup failure reported by `which`.
        reason: String,
    },

    /// A command execution failed (spawn failure, wait failure, non-zero exit, etc.).
    #[error("command execution failed: {command}: {status}")]
    Execution {
        /// The command that was executed.
        command: String,
        /// Human-readable reason for the failure: exit code, signal information,
        /// or a description of the internal error.
        status: String,
        /// Output captured before the failure, when the process got far enough to
        /// produce any.
        output: Option<Box<ExecutionResult>>,
    },

    /// A failed run re-reported with the command text and captured output.
    ///
    /// Produced by [`CommandExecutor::run_reporting`](crate::executor::CommandExecutor::run_reporting).
    #[error("{message}")]
    Reported {
        /// The full diagnostic message.
        message: String,
        /// Output captured by the failed run, if any.
        output: Option<Box<ExecutionResult>>,
        /// The underlying failure.
        #[source]
        source: Box<ShelloutError>,
    },

    /// A validation constraint was violated.
    #[error("validation error: {0}")]
    Validation(String),

    /// A manifest could not be loaded or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O operation failed with contextual information.
    #[error("{context}: {message}")]
    Io {
        /// What was being done when the error occurred (usually a path).
        context: String,
        /// Human-readable description derived from [`io_error_kind_message`].
        message: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl ShelloutError {
    /// Creates an `Io` variant with the `message` field automatically derived
    /// from the `source` via [`io_error_kind_message`].
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            message: io_error_kind_message(&source),
            source,
        }
    }

    /// Returns the output captured before the failure, if there is any.
    pub fn output(&self) -> Option<&ExecutionResult> {
        match self {
            Self::Execution { output, .. } | Self::Reported { output, .. } => output.as_deref(),
            _ => None,
        }
    }

    /// Removes and returns the captured output, leaving `None` behind.
    pub(crate) fn take_output(&mut self) -> Option<Box<ExecutionResult>> {
        match self {
            Self::Execution { output, .. } | Self::Reported { output, .. } => output.take(),
            _ => None,
        }
    }
}

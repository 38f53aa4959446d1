//! Command execution abstraction for shellout.
//!
//! This module provides:
//! - [`CommandSpec`]: Declarative description of a command to run
//! - [`ExecutionResult`]: Exit status and captured output of a run
//! - [`CommandExecutor`]: Trait for command execution strategies
//! - [`RealCommandExecutor`]: Production implementation using `std::process::Command`
//! - [`StreamingProcess`]: A running child whose output is read by the caller

mod pipe;
mod real;

use std::collections::BTreeMap;
use std::process::ExitStatus;

use camino::Utf8PathBuf;

use crate::error::ShelloutError;
use crate::privilege::Sudo;

pub use real::{RealCommandExecutor, StreamingProcess};

/// Specification for a command to be executed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    /// The command line: a shell line when `shell` is set, otherwise split
    /// into arguments with shell-style quoting.
    pub command: String,
    /// Working directory (optional, defaults to the caller's directory)
    pub cwd: Option<Utf8PathBuf>,
    /// Run `command` through `<shell_program> -c` instead of tokenizing it
    pub shell: bool,
    /// Shell interpreter for shell mode (defaults to `sh`)
    pub shell_program: Option<String>,
    /// Privilege escalation to wrap the command in
    pub sudo: Option<Sudo>,
    /// Environment overrides merged into the inherited environment
    pub env: BTreeMap<String, String>,
}

impl CommandSpec {
    /// Creates a new CommandSpec for a command line
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    /// Runs the command through the default shell
    #[must_use]
    pub fn with_shell(mut self) -> Self {
        self.shell = true;
        self
    }

    /// Runs the command through the given shell interpreter
    #[must_use]
    pub fn with_shell_program(mut self, program: impl Into<String>) -> Self {
        self.shell = true;
        self.shell_program = Some(program.into());
        self
    }

    /// Sets the privilege escalation
    #[must_use]
    pub fn with_sudo(mut self, sudo: Option<Sudo>) -> Self {
        self.sudo = sudo;
        self
    }

    /// Sets the working directory
    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<Utf8PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Adds an environment override
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Adds multiple environment overrides.
    ///
    /// Accepts any iterator of key-value pairs that can be converted into strings,
    /// such as `Vec<(String, String)>`, `&[(&str, &str)]`, or `HashMap<String, String>`.
    #[must_use]
    pub fn with_envs<I, K, V>(mut self, envs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(envs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }
}

/// Result of command execution
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    /// Exit status of the command (None in dry-run mode)
    pub status: Option<ExitStatus>,
    /// Captured standard output (empty when output was not captured)
    pub stdout: String,
    /// Captured standard error (empty when output was not captured)
    pub stderr: String,
}

impl ExecutionResult {
    /// Returns true if the command executed successfully.
    ///
    /// In dry-run mode (status is None), this always returns true.
    pub fn success(&self) -> bool {
        self.status.is_none_or(|s| s.success())
    }

    /// Returns the exit code if available.
    ///
    /// `None` in dry-run mode or when the process was terminated by a signal.
    pub fn code(&self) -> Option<i32> {
        self.status.and_then(|s| s.code())
    }
}

/// Builds the diagnostic message used by [`CommandExecutor::run_reporting`].
///
/// Segments are appended in a fixed order and only when present:
/// `error running command <command>[, stdout: ..][, stderr: ..], error: <err>`.
pub(crate) fn report_message(
    command: &str,
    output: Option<&ExecutionResult>,
    err: &ShelloutError,
) -> String {
    let mut message = format!("error running command {}", command);
    if let Some(output) = output {
        let stdout = output.stdout.trim();
        if !stdout.is_empty() {
            message.push_str(&format!(", stdout: {}", stdout));
        }
        let stderr = output.stderr.trim();
        if !stderr.is_empty() {
            message.push_str(&format!(", stderr: {}", stderr));
        }
    }
    message.push_str(&format!(", error: {}", err));
    message
}

/// Trait for command execution.
///
/// Implementations must be `Send + Sync` so that one executor can be shared
/// as `Arc<dyn CommandExecutor>`.
pub trait CommandExecutor: Send + Sync {
    /// Runs a command to completion, capturing stdout and stderr.
    ///
    /// A non-zero exit is an error; the captured output stays reachable
    /// through [`ShelloutError::output`].
    fn run(&self, spec: &CommandSpec) -> Result<ExecutionResult, ShelloutError>;

    /// Runs a command to completion with stdout and stderr connected to the
    /// caller's own streams. The returned result carries only the status.
    fn run_passthrough(&self, spec: &CommandSpec) -> Result<ExecutionResult, ShelloutError>;

    /// Runs a command to completion, discarding all output.
    fn run_quiet(&self, spec: &CommandSpec) -> Result<(), ShelloutError>;

    /// Runs a command like [`run`](Self::run), rewriting any failure into a
    /// [`ShelloutError::Reported`] whose message names the command and
    /// includes the trimmed output.
    fn run_reporting(&self, spec: &CommandSpec) -> Result<ExecutionResult, ShelloutError> {
        self.run(spec).map_err(|mut err| {
            let output = err.take_output();
            let message = report_message(&spec.command, output.as_deref(), &err);
            ShelloutError::Reported {
                message,
                output,
                source: Box::new(err),
            }
        })
    }
}

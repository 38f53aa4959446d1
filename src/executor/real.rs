//! Real command executor implementation.
//!
//! This module provides [`RealCommandExecutor`], which resolves a
//! [`CommandSpec`] and runs it with `std::process::Command`, and
//! [`StreamingProcess`], a running child whose pipes belong to the caller.

use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Stdio};
use std::thread;
use std::thread::JoinHandle;

use super::pipe::{StreamType, panic_message, read_pipe};
use super::{CommandExecutor, CommandSpec, ExecutionResult};
use crate::builder::{self, ResolvedProcess};
use crate::error::{ShelloutError, io_error_kind_message};

/// Formats an argument vector for messages, quoting where a shell would need it.
fn describe(process: &ResolvedProcess) -> String {
    shell_words::join(process.argv())
}

fn execution_error(
    command: &str,
    status: impl Into<String>,
    output: Option<ExecutionResult>,
) -> ShelloutError {
    ShelloutError::Execution {
        command: command.to_string(),
        status: status.into(),
        output: output.map(Box::new),
    }
}

/// Cleans up a child process and its associated reader threads.
///
/// This function kills the child process, waits for it to terminate,
/// and joins all reader threads to prevent resource leaks.
fn cleanup_child_process<I>(child: &mut Child, handles: I)
where
    I: IntoIterator<Item = JoinHandle<String>>,
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

/// Starts a named thread draining `pipe`, if there is one.
fn spawn_reader<R>(
    pipe: Option<R>,
    stream_type: StreamType,
) -> std::io::Result<Option<JoinHandle<String>>>
where
    R: std::io::Read + Send + 'static,
{
    pipe.map(|pipe| {
        thread::Builder::new()
            .name(format!("{}-reader", stream_type))
            .spawn(move || read_pipe(pipe, stream_type))
    })
    .transpose()
}

/// Joins a reader thread, recording a panic instead of propagating it.
fn join_reader(
    name: &str,
    handle: Option<JoinHandle<String>>,
    panicked: &mut Vec<String>,
) -> String {
    let Some(handle) = handle else {
        return String::new();
    };
    match handle.join() {
        Ok(captured) => captured,
        Err(e) => {
            let msg = panic_message(&*e);
            tracing::error!(stream = name, panic = msg, "reader thread panicked");
            panicked.push(format!("{}: {}", name, msg));
            String::new()
        }
    }
}

/// Drains whatever pipes the child still owns and waits for it to exit.
///
/// A non-zero exit is returned as `ShelloutError::Execution` carrying
/// the captured output.
fn wait_with_output(mut child: Child, command: &str) -> Result<ExecutionResult, ShelloutError> {
    // Close our end of stdin so children reading it see EOF.
    drop(child.stdin.take());

    let stdout_handle = match spawn_reader(child.stdout.take(), StreamType::Stdout) {
        Ok(handle) => handle,
        Err(e) => {
            cleanup_child_process(&mut child, []);
            return Err(execution_error(
                command,
                format!("failed to spawn stdout reader thread: {}", e),
                None,
            ));
        }
    };

    let stderr_handle = match spawn_reader(child.stderr.take(), StreamType::Stderr) {
        Ok(handle) => handle,
        Err(e) => {
            cleanup_child_process(&mut child, stdout_handle);
            return Err(execution_error(
                command,
                format!("failed to spawn stderr reader thread: {}", e),
                None,
            ));
        }
    };

    let status = match child.wait() {
        Ok(s) => s,
        Err(e) => {
            // The process might still be running; kill it before giving up.
            cleanup_child_process(&mut child, stdout_handle.into_iter().chain(stderr_handle));
            return Err(execution_error(
                command,
                format!("failed to wait for command: {}", io_error_kind_message(&e)),
                None,
            ));
        }
    };

    let mut panicked_streams = Vec::new();
    let stdout = join_reader("stdout", stdout_handle, &mut panicked_streams);
    let stderr = join_reader("stderr", stderr_handle, &mut panicked_streams);

    let result = ExecutionResult {
        status: Some(status),
        stdout,
        stderr,
    };

    if !panicked_streams.is_empty() {
        return Err(execution_error(
            command,
            format!(
                "reader thread(s) panicked during command execution: {}",
                panicked_streams.join(", ")
            ),
            Some(result),
        ));
    }

    tracing::trace!("executed command: {}: success={}", command, status.success());

    if !status.success() {
        return Err(execution_error(command, status.to_string(), Some(result)));
    }

    Ok(result)
}

/// A spawned child whose stdin, stdout and stderr are pipes held by the caller.
///
/// The child runs concurrently with the caller. Output that the caller does
/// not read through the handles is collected by [`wait`](Self::wait).
/// Dropping the process without waiting kills the child and reaps it.
#[derive(Debug)]
pub struct StreamingProcess {
    command: String,
    pid: u32,
    child: Option<Child>,
}

impl StreamingProcess {
    /// Returns the OS process id.
    pub fn id(&self) -> u32 {
        self.pid
    }

    /// Returns the quoted command line this process was started from.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Borrows the child's stdin, if it has not been taken.
    pub fn stdin(&mut self) -> Option<&mut ChildStdin> {
        self.child.as_mut().and_then(|child| child.stdin.as_mut())
    }

    /// Borrows the child's stdout, if it has not been taken.
    pub fn stdout(&mut self) -> Option<&mut ChildStdout> {
        self.child.as_mut().and_then(|child| child.stdout.as_mut())
    }

    /// Borrows the child's stderr, if it has not been taken.
    pub fn stderr(&mut self) -> Option<&mut ChildStderr> {
        self.child.as_mut().and_then(|child| child.stderr.as_mut())
    }

    /// Takes ownership of the child's stdin.
    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.child.as_mut().and_then(|child| child.stdin.take())
    }

    /// Takes ownership of the child's stdout.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.as_mut().and_then(|child| child.stdout.take())
    }

    /// Takes ownership of the child's stderr.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.as_mut().and_then(|child| child.stderr.take())
    }

    /// Closes stdin, drains any pipes still held here, and waits for exit.
    ///
    /// Streams the caller took are not part of the returned output.
    pub fn wait(mut self) -> Result<ExecutionResult, ShelloutError> {
        match self.child.take() {
            Some(child) => wait_with_output(child, &self.command),
            None => Err(execution_error(&self.command, "process was already reaped", None)),
        }
    }
}

impl Drop for StreamingProcess {
    fn drop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        match child.try_wait() {
            Ok(Some(status)) => {
                tracing::trace!("streaming command exited before drop: {}: {}", self.command, status);
            }
            _ => {
                tracing::debug!(
                    pid = self.pid,
                    "killing streaming command dropped without wait: {}",
                    self.command
                );
                cleanup_child_process(&mut child, []);
            }
        }
    }
}

/// Command executor that runs actual system commands.
///
/// When `dry_run` is true, commands are resolved and logged but not
/// executed, and the run methods return `ExecutionResult { status: None, .. }`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealCommandExecutor {
    pub dry_run: bool,
}

impl RealCommandExecutor {
    /// Resolves the spec, returning `None` when this is a dry run.
    fn prepare(
        &self,
        spec: &CommandSpec,
    ) -> Result<Option<(ResolvedProcess, std::process::Command)>, ShelloutError> {
        let process = builder::resolve_current(spec)?;
        if self.dry_run {
            tracing::info!("dry run: {}", describe(&process));
            return Ok(None);
        }
        let command = process.to_command()?;
        Ok(Some((process, command)))
    }

    /// Spawns the command with piped stdin, stdout and stderr and returns
    /// immediately.
    ///
    /// # Errors
    ///
    /// Fails in dry-run mode, since there is no process to hand out.
    pub fn spawn_streaming(&self, spec: &CommandSpec) -> Result<StreamingProcess, ShelloutError> {
        let Some((process, mut command)) = self.prepare(spec)? else {
            return Err(ShelloutError::Validation(
                "streaming execution is not available in dry-run mode".to_string(),
            ));
        };
        let described = describe(&process);

        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let child = command.spawn().map_err(|e| {
            execution_error(
                &described,
                format!("failed to spawn: {}", io_error_kind_message(&e)),
                None,
            )
        })?;
        tracing::trace!("spawned command: {}: pid={}", described, child.id());

        Ok(StreamingProcess {
            command: described,
            pid: child.id(),
            child: Some(child),
        })
    }

    /// Runs a fully configured command to completion without capturing output.
    fn run_status(
        process: &ResolvedProcess,
        mut command: std::process::Command,
    ) -> Result<ExecutionResult, ShelloutError> {
        let described = describe(process);
        let status = command.status().map_err(|e| {
            execution_error(
                &described,
                format!("failed to run: {}", io_error_kind_message(&e)),
                None,
            )
        })?;
        tracing::trace!("executed command: {}: success={}", described, status.success());

        let result = ExecutionResult {
            status: Some(status),
            ..ExecutionResult::default()
        };
        if !status.success() {
            return Err(execution_error(&described, status.to_string(), Some(result)));
        }
        Ok(result)
    }
}

impl CommandExecutor for RealCommandExecutor {
    #[tracing::instrument(skip(self, spec), fields(command = %spec.command))]
    fn run(&self, spec: &CommandSpec) -> Result<ExecutionResult, ShelloutError> {
        let Some((process, mut command)) = self.prepare(spec)? else {
            return Ok(ExecutionResult::default());
        };
        let described = describe(&process);

        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let child = command.spawn().map_err(|e| {
            execution_error(
                &described,
                format!("failed to spawn: {}", io_error_kind_message(&e)),
                None,
            )
        })?;
        tracing::trace!("spawned command: {}: pid={}", described, child.id());

        wait_with_output(child, &described)
    }

    #[tracing::instrument(skip(self, spec), fields(command = %spec.command))]
    fn run_passthrough(&self, spec: &CommandSpec) -> Result<ExecutionResult, ShelloutError> {
        let Some((process, mut command)) = self.prepare(spec)? else {
            return Ok(ExecutionResult::default());
        };
        command
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        Self::run_status(&process, command)
    }

    #[tracing::instrument(skip(self, spec), fields(command = %spec.command))]
    fn run_quiet(&self, spec: &CommandSpec) -> Result<(), ShelloutError> {
        let Some((process, mut command)) = self.prepare(spec)? else {
            return Ok(());
        };
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        Self::run_status(&process, command).map(|_| ())
    }
}

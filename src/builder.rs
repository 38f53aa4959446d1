//! Turns a [`CommandSpec`] into a ready-to-spawn process description.
//!
//! The builder tokenizes the command line (or wraps it for a shell),
//! applies `sudo`, and attaches the environment block computed by
//! [`env::resolve_environment`](crate::env::resolve_environment).

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Command;

use camino::Utf8PathBuf;

use crate::env;
use crate::error::ShelloutError;
use crate::executor::CommandSpec;

/// Shell used for shell-mode commands when none is configured.
pub const DEFAULT_SHELL: &str = "sh";

/// A command after tokenization, elevation and environment resolution.
///
/// Only [`resolve`] creates one, so the argument vector is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProcess {
    argv: Vec<String>,
    cwd: Option<Utf8PathBuf>,
    env: Vec<String>,
}

impl ResolvedProcess {
    /// Returns the full argument vector; the first element is the program.
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Returns the program name.
    pub fn program(&self) -> &str {
        self.argv.first().map_or("", String::as_str)
    }

    /// Returns the arguments after the program name.
    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }

    /// Returns the working directory, `None` to inherit the caller's.
    pub fn cwd(&self) -> Option<&Utf8PathBuf> {
        self.cwd.as_ref()
    }

    /// Returns the complete environment block as `KEY=VALUE` entries.
    pub fn env(&self) -> &[String] {
        &self.env
    }

    /// Locates the program using the `PATH` of the resolved environment.
    ///
    /// Relative lookups are anchored at the resolved working directory, or
    /// the caller's current directory when none is set. The returned path is
    /// absolute, so it stays valid once the child changes directory.
    pub fn locate(&self) -> Result<PathBuf, ShelloutError> {
        let base = match &self.cwd {
            Some(cwd) => std::path::absolute(cwd).map_err(|e| {
                ShelloutError::io(format!("failed to resolve working directory {}", cwd), e)
            })?,
            None => std::env::current_dir()
                .map_err(|e| ShelloutError::io("failed to read current directory", e))?,
        };
        let path = env::lookup(&self.env, env::PATH_KEY);
        which::which_in(self.program(), path, base).map_err(|e| ShelloutError::CommandNotFound {
            command: self.program().to_string(),
            reason: e.to_string(),
        })
    }

    /// Creates a `std::process::Command` for this process.
    ///
    /// The child's environment is the resolved block. Standard streams are
    /// left at their defaults for the caller to configure.
    pub fn to_command(&self) -> Result<Command, ShelloutError> {
        let program = self.locate()?;
        tracing::trace!("command found: {}: {}", self.program(), program.display());

        let mut command = Command::new(program);
        command.args(self.args());

        if let Some(ref cwd) = self.cwd {
            command.current_dir(cwd);
        }

        apply_environment(&mut command, &self.env, std::env::vars_os())?;

        Ok(command)
    }
}

/// Makes `command`'s environment equal to `block`, starting from `current`.
///
/// Variables of `current` that already match their block entry are left to
/// be inherited, which keeps values that are not valid UTF-8 byte-for-byte
/// intact. Differing entries are set and missing ones are removed.
fn apply_environment<I>(
    command: &mut Command,
    block: &[String],
    current: I,
) -> Result<(), ShelloutError>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    let mut wanted: HashMap<&str, &str> = HashMap::with_capacity(block.len());
    for entry in block {
        let (key, value) = env::split_entry(entry)?;
        wanted.insert(key, value);
    }

    for (key, value) in current {
        let lossy_key = key.to_string_lossy();
        let unchanged = wanted
            .get(lossy_key.as_ref())
            .map(|wanted_value| value.to_string_lossy() == *wanted_value);
        match unchanged {
            Some(true) => {
                wanted.remove(&*lossy_key);
            }
            Some(false) => {}
            None => {
                command.env_remove(&key);
            }
        }
    }

    for (key, value) in wanted {
        command.env(key, value);
    }
    Ok(())
}

/// Splits a command line into arguments, honoring shell-style quoting.
///
/// # Errors
///
/// Returns `ShelloutError::MalformedCommand` on unbalanced quotes or a
/// trailing escape, and when the line contains no words at all.
pub fn tokenize(command: &str) -> Result<Vec<String>, ShelloutError> {
    let argv = shell_words::split(command).map_err(|e| ShelloutError::MalformedCommand {
        command: command.to_string(),
        reason: e.to_string(),
    })?;
    if argv.is_empty() {
        return Err(ShelloutError::MalformedCommand {
            command: command.to_string(),
            reason: "command is empty".to_string(),
        });
    }
    Ok(argv)
}

/// Builds the argument vector for a spec, without touching the environment.
pub fn build_argv(spec: &CommandSpec) -> Result<Vec<String>, ShelloutError> {
    let argv = if spec.shell {
        let shell = spec.shell_program.as_deref().unwrap_or(DEFAULT_SHELL);
        vec![shell.to_string(), "-c".to_string(), spec.command.clone()]
    } else {
        tokenize(&spec.command)?
    };

    Ok(match spec.sudo {
        Some(sudo) => sudo.prefix().into_iter().chain(argv).collect(),
        None => argv,
    })
}

/// Resolves a spec against the given inherited environment.
pub fn resolve(spec: &CommandSpec, inherited: &[String]) -> Result<ResolvedProcess, ShelloutError> {
    let argv = build_argv(spec)?;
    let env = env::resolve_environment(inherited, &spec.env)?;
    let cwd = spec.cwd.clone().filter(|cwd| !cwd.as_str().is_empty());

    tracing::trace!(argv = ?argv, cwd = ?cwd, "resolved command");

    Ok(ResolvedProcess { argv, cwd, env })
}

/// Resolves a spec against the environment of the current process.
pub fn resolve_current(spec: &CommandSpec) -> Result<ResolvedProcess, ShelloutError> {
    resolve(spec, &env::inherited_environment())
}

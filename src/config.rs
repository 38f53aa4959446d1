//! YAML manifest of commands for the `apply` and `validate` subcommands.
//!
//! A manifest holds optional `defaults` and an ordered list of `commands`.
//! Each command entry is turned into a [`CommandSpec`] by layering it over
//! the defaults.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use strum::Display;

use crate::builder;
use crate::error::ShelloutError;
use crate::executor::CommandSpec;
use crate::paths;
use crate::privilege::Privilege;

/// How a command's output is handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Display, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OutputMode {
    /// Capture stdout and stderr; report them if the command fails
    #[default]
    Buffered,
    /// Connect the command to the terminal
    Passthrough,
    /// Discard all output
    Quiet,
}

/// Settings applied to every command that does not specify its own.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    /// Shell interpreter for shell-mode commands
    #[serde(default)]
    pub shell_program: Option<String>,
    /// Working directory (`~` is expanded)
    #[serde(default)]
    pub cwd: Option<Utf8PathBuf>,
    /// Privilege escalation for commands that do not set `sudo`
    #[serde(default)]
    pub sudo: Privilege,
    /// Environment overrides shared by all commands
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// One command in the manifest.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandEntry {
    /// Optional label used in logs
    #[serde(default)]
    pub name: Option<String>,
    /// Command line to run
    pub command: String,
    /// Run through a shell instead of tokenizing
    #[serde(default)]
    pub shell: bool,
    /// Shell interpreter, overriding the defaults
    #[serde(default)]
    pub shell_program: Option<String>,
    /// Working directory, overriding the defaults (`~` is expanded)
    #[serde(default)]
    pub cwd: Option<Utf8PathBuf>,
    /// Create the working directory before running if it is missing
    #[serde(default)]
    pub create_cwd: bool,
    /// Privilege escalation; absent inherits the defaults
    #[serde(default)]
    pub sudo: Privilege,
    /// Environment overrides, layered over the defaults
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Output handling
    #[serde(default)]
    pub output: OutputMode,
}

impl CommandEntry {
    /// Returns the name, or the command line when unnamed.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.command)
    }

    /// Returns the working directory after applying defaults and `~` expansion.
    pub fn effective_cwd(&self, defaults: &Defaults) -> Option<Utf8PathBuf> {
        self.cwd
            .as_ref()
            .or(defaults.cwd.as_ref())
            .map(|cwd| paths::expand_user(cwd.as_str()))
    }

    /// Builds the command specification for this entry.
    pub fn to_spec(&self, defaults: &Defaults) -> CommandSpec {
        let mut env = defaults.env.clone();
        env.extend(self.env.iter().map(|(k, v)| (k.clone(), v.clone())));

        let sudo = self.sudo.resolve(defaults.sudo.resolve(None));

        CommandSpec {
            command: self.command.clone(),
            cwd: self.effective_cwd(defaults),
            shell: self.shell,
            shell_program: self
                .shell_program
                .clone()
                .or_else(|| defaults.shell_program.clone()),
            sudo,
            env,
        }
    }
}

/// A manifest file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub defaults: Defaults,
    pub commands: Vec<CommandEntry>,
}

impl Manifest {
    /// Returns the specs for all commands, in order.
    pub fn specs(&self) -> Vec<CommandSpec> {
        self.commands
            .iter()
            .map(|entry| entry.to_spec(&self.defaults))
            .collect()
    }

    /// Validates the manifest without running anything.
    ///
    /// Checks that there is at least one command, that every command line
    /// is non-empty and tokenizes, that `shell_program` is only used with
    /// `shell: true`, and that environment overrides are well-formed.
    pub fn validate(&self) -> Result<(), ShelloutError> {
        if self.commands.is_empty() {
            return Err(ShelloutError::Validation(
                "manifest must contain at least one command".to_string(),
            ));
        }

        for (index, entry) in self.commands.iter().enumerate() {
            let position = index + 1;
            if entry.command.trim().is_empty() {
                return Err(ShelloutError::Validation(format!(
                    "command {} has an empty command line",
                    position
                )));
            }
            if entry.shell_program.is_some() && !entry.shell {
                return Err(ShelloutError::Validation(format!(
                    "command {} ({}) sets shell_program but not shell: true",
                    position,
                    entry.label()
                )));
            }

            let spec = entry.to_spec(&self.defaults);
            builder::build_argv(&spec).map_err(|e| {
                ShelloutError::Validation(format!("command {} ({}): {}", position, entry.label(), e))
            })?;
            crate::env::resolve_environment(&[], &spec.env).map_err(|e| {
                ShelloutError::Validation(format!("command {} ({}): {}", position, entry.label(), e))
            })?;
        }

        Ok(())
    }
}

/// Loads a manifest from a YAML file.
pub fn load_manifest(path: &Utf8Path) -> Result<Manifest, ShelloutError> {
    let file = File::open(path).map_err(|e| ShelloutError::io(path.as_str(), e))?;
    let reader = BufReader::new(file);
    serde_yaml::from_reader(reader)
        .map_err(|e| ShelloutError::Config(format!("failed to parse yaml: {}: {}", path, e)))
}

use anyhow::{Result, bail};
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use crate::config::OutputMode;

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version = env!("CARGO_PKG_VERSION"),
    about = env!("CARGO_PKG_DESCRIPTION"),
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a single command
    Run(RunArgs),

    /// Run every command in the given YAML manifest, in order
    Apply(ApplyArgs),

    /// Validate the given YAML manifest
    Validate(ValidateArgs),

    /// Generate shell completion scripts
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Command line to run
    pub command: String,

    /// Working directory for the command (`~` is expanded)
    #[arg(long)]
    pub cwd: Option<Utf8PathBuf>,

    /// Run the command line through a shell (`<shell> -c <command>`)
    #[arg(long)]
    pub shell: bool,

    /// Shell interpreter to use; implies --shell
    #[arg(long, value_name = "PROGRAM")]
    pub shell_program: Option<String>,

    /// Run the command through sudo
    #[arg(long)]
    pub sudo: bool,

    /// Keep the caller's environment under sudo (`sudo -E`)
    #[arg(long, requires = "sudo")]
    pub preserve_env: bool,

    /// Environment override; PATH is merged into the inherited PATH
    #[arg(short, long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,

    /// How to handle the command's output
    #[arg(short, long, default_value = "buffered")]
    pub output: OutputMode,

    /// Set the log level
    #[arg(short, long, default_value = "info")]
    pub log_level: LogLevel,

    /// Do not run, just show what would be done
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Path to the YAML manifest
    #[arg(short, long, default_value = "commands.yaml")]
    pub file: Utf8PathBuf,

    /// Set the log level
    #[arg(short, long, default_value = "info")]
    pub log_level: LogLevel,

    /// Do not run, just show what would be done
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the YAML manifest to validate
    #[arg(short, long, default_value = "commands.yaml")]
    pub file: Utf8PathBuf,

    /// Set the log level
    #[arg(short, long, default_value = "info")]
    pub log_level: LogLevel,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Represents log levels for controlling the verbosity of logging output.
///
/// This enum maps directly to the log levels used by the `tracing` crate.
/// Resolved command lines and environment decisions are logged at `debug`
/// and `trace`; captured output lines are logged at `trace`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Commands {
    /// Returns the log level requested by the subcommand.
    pub fn log_level(&self) -> LogLevel {
        match self {
            Self::Run(opts) => opts.log_level,
            Self::Apply(opts) => opts.log_level,
            Self::Validate(opts) => opts.log_level,
            Self::Completions(_) => LogLevel::Warn,
        }
    }
}

/// Parses a `KEY=VALUE` pair, splitting on the first `=`.
fn parse_env_pair(s: &str) -> Result<(String, String)> {
    match s.split_once('=') {
        Some((key, _)) if key.is_empty() => bail!("environment variable name must not be empty"),
        Some((key, value)) => Ok((key.to_string(), value.to_string())),
        None => bail!("expected KEY=VALUE, got {:?}", s),
    }
}

pub fn parse_args() -> Result<Cli> {
    Ok(Cli::parse())
}

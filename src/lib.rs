pub mod builder;
pub mod cli;
pub mod config;
pub mod env;
pub mod error;
pub mod executor;
pub mod paths;
pub mod privilege;

pub use error::ShelloutError;

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{FmtSubscriber, filter::LevelFilter};

use crate::config::OutputMode;
use crate::executor::{CommandExecutor, CommandSpec};
use crate::privilege::Sudo;

pub fn init_logging(log_level: cli::LogLevel) -> Result<()> {
    let filter = match log_level {
        cli::LogLevel::Trace => LevelFilter::TRACE,
        cli::LogLevel::Debug => LevelFilter::DEBUG,
        cli::LogLevel::Info => LevelFilter::INFO,
        cli::LogLevel::Warn => LevelFilter::WARN,
        cli::LogLevel::Error => LevelFilter::ERROR,
    };

    tracing::subscriber::set_global_default(
        FmtSubscriber::builder()
            .with_max_level(filter)
            .with_writer(std::io::stderr)
            .finish(),
    )
    .context("failed to set global default tracing subscriber")
}

/// Runs one spec with the requested output handling.
///
/// Buffered output is written to this process's stdout and stderr once the
/// command succeeds; on failure it is part of the returned error instead.
pub fn execute_with_output(
    executor: &dyn CommandExecutor,
    spec: &CommandSpec,
    output: OutputMode,
) -> Result<(), ShelloutError> {
    match output {
        OutputMode::Buffered => {
            let result = executor.run_reporting(spec)?;
            print!("{}", result.stdout);
            eprint!("{}", result.stderr);
            std::io::stdout()
                .flush()
                .map_err(|e| ShelloutError::io("failed to flush stdout", e))?;
        }
        OutputMode::Passthrough => {
            executor.run_passthrough(spec)?;
        }
        OutputMode::Quiet => executor.run_quiet(spec)?,
    }
    Ok(())
}

/// Builds the command specification for the `run` subcommand.
pub fn spec_from_args(opts: &cli::RunArgs) -> CommandSpec {
    let mut spec = CommandSpec::new(opts.command.clone())
        .with_envs(opts.env.iter().cloned())
        .with_sudo(opts.sudo.then_some(Sudo {
            preserve_env: opts.preserve_env,
        }));

    spec = match &opts.shell_program {
        Some(program) => spec.with_shell_program(program.clone()),
        None if opts.shell => spec.with_shell(),
        None => spec,
    };

    if let Some(cwd) = &opts.cwd {
        spec = spec.with_cwd(paths::expand_user(cwd.as_str()));
    }

    spec
}

pub fn run_command(opts: &cli::RunArgs, executor: &dyn CommandExecutor) -> Result<()> {
    let spec = spec_from_args(opts);
    execute_with_output(executor, &spec, opts.output)?;
    Ok(())
}

pub fn run_apply(opts: &cli::ApplyArgs, executor: Arc<dyn CommandExecutor>) -> Result<()> {
    let manifest = config::load_manifest(opts.file.as_path())
        .with_context(|| format!("failed to load manifest from {}", opts.file))?;
    manifest.validate().context("manifest validation failed")?;

    let total = manifest.commands.len();
    info!("running {} command(s) from {}", total, opts.file);

    for (index, entry) in manifest.commands.iter().enumerate() {
        let spec = entry.to_spec(&manifest.defaults);
        info!("running command {}/{}: {}", index + 1, total, entry.label());

        if entry.create_cwd && !opts.dry_run {
            if let Some(cwd) = &spec.cwd {
                paths::ensure_dir(cwd).with_context(|| {
                    format!("failed to prepare working directory for command {}", index + 1)
                })?;
            }
        }

        execute_with_output(executor.as_ref(), &spec, entry.output)
            .with_context(|| format!("command {} ({}) failed", index + 1, entry.label()))?;
    }

    info!("all commands completed successfully");
    Ok(())
}

pub fn run_validate(opts: &cli::ValidateArgs) -> Result<()> {
    let manifest = config::load_manifest(opts.file.as_path())?;
    manifest.validate().context("manifest validation failed")?;
    info!("validation successful:\n{:#?}", manifest);
    Ok(())
}

pub fn run_completions(opts: &cli::CompletionsArgs, out: &mut dyn Write) {
    use clap::CommandFactory;

    let mut command = cli::Cli::command();
    let name = command.get_name().to_string();
    clap_complete::generate(opts.shell, &mut command, name, out);
}

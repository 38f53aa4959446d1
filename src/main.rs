use std::process::ExitCode;
use std::sync::Arc;

use shellout::ShelloutError;
use shellout::cli::{self, Commands};
use shellout::executor::RealCommandExecutor;
use tracing::error;

/// Picks the process exit code for a failed run: the child's own code when
/// the failure was a non-zero exit, otherwise 1.
fn failure_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<ShelloutError>())
        .find_map(|e| e.output().and_then(|o| o.code()))
        .and_then(|code| u8::try_from(code).ok())
        .filter(|code| *code != 0)
        .unwrap_or(1)
}

fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = shellout::init_logging(args.command.log_level()) {
        eprintln!("{:#}", e);
        return ExitCode::FAILURE;
    }

    let result = match &args.command {
        Commands::Run(opts) => {
            let executor = RealCommandExecutor {
                dry_run: opts.dry_run,
            };
            shellout::run_command(opts, &executor)
        }
        Commands::Apply(opts) => {
            let executor = Arc::new(RealCommandExecutor {
                dry_run: opts.dry_run,
            });
            shellout::run_apply(opts, executor)
        }
        Commands::Validate(opts) => shellout::run_validate(opts),
        Commands::Completions(opts) => {
            shellout::run_completions(opts, &mut std::io::stdout());
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(failure_code(&e))
        }
    }
}

// ytgrab-cli/src/main.rs
//
// Binary entry point: initializes logging, parses arguments and maps
// command results onto process exit codes.
//
// Logging uses env_logger with the RUST_LOG environment variable:
// - RUST_LOG=info (default): normal operation logs
// - RUST_LOG=debug: child command lines and probe details

use clap::Parser;
use std::process::ExitCode;

use log::error;
use ytgrab_cli::{run_download, run_resolve, Cli, Commands};
use ytgrab_core::JobState;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Download(args) => match run_download(args) {
            Ok(report) if report.state == JobState::Cancelled => ExitCode::from(130),
            Ok(_) => ExitCode::SUCCESS,
            Err(e) => {
                error!("{e}");
                ExitCode::FAILURE
            }
        },
        Commands::Resolve(args) => match run_resolve(args) {
            Ok(_) => ExitCode::SUCCESS,
            Err(e) => {
                error!("{e}");
                ExitCode::FAILURE
            }
        },
    }
}

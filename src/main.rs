//! objlock: advisory lock manager for objects in a directory-backed store.
//!
//! This is the main entry point for the `objlock` CLI. It parses arguments,
//! loads config, dispatches to the appropriate command handler, and handles
//! errors with proper exit codes.

use objlock::cli::Cli;
use objlock::commands::{self, Session};
use objlock::{exit_codes, logging};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse_args();

    let config = match commands::load_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {}", err);
            return ExitCode::from(err.exit_code() as u8);
        }
    };
    logging::init(&config.log_level);

    let session = Session::new(&cli, &config);
    match commands::dispatch(&session, &cli.object, cli.command) {
        Ok(output) => {
            print!("{}", output);
            ExitCode::from(exit_codes::SUCCESS as u8)
        }
        Err(err) => {
            // Print user-actionable error message to stderr
            eprintln!("Error: {}", err);

            ExitCode::from(err.exit_code() as u8)
        }
    }
}

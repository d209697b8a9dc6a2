//! # Paygate
//!
//! Paywall gateway with spending-policy enforcement.
//!
//! ## Usage
//!
//! ```bash
//! # Initialize configuration
//! paygate config init
//!
//! # Display current configuration
//! paygate config
//!
//! # Start the paywall server
//! paygate serve
//!
//! # Dry-run an outgoing payment against the policy
//! paygate check --amount 2.50 --to api.example.com
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

use clap::Parser;
use paygate::cli::commands::{
    CheckCommand, CheckError, ConfigCommand, ServeCommand, EXIT_ERROR, EXIT_POLICY_DENIED,
};
use paygate::cli::{Cli, Commands};
use paygate::logging::{init_logging, verbosity_to_level, LogConfig, LogError, LogFormat, LogGuard};
use paygate_core::config_loader::ConfigLoader;
use paygate_core::types::Verdict;

/// Set up logging based on verbosity level.
///
/// # Errors
///
/// Returns [`LogError`] if logging initialization fails.
fn setup_logging(verbose: u8) -> Result<LogGuard, LogError> {
    let config = LogConfig {
        level: verbosity_to_level(verbose),
        format: LogFormat::Pretty,
        file_path: None,
    };
    init_logging(&config)
}

/// Main entry point for the paygate application.
fn main() {
    let cli = Cli::parse();

    let _guard = match setup_logging(cli.verbose) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            std::process::exit(EXIT_ERROR);
        }
    };

    let loader = match cli.config_dir {
        Some(dir) => ConfigLoader::with_base_dir(dir),
        None => match ConfigLoader::new() {
            Ok(loader) => loader,
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(EXIT_ERROR);
            }
        },
    };

    // Dispatch to command handlers
    let result = match cli.command {
        Commands::Serve { listen } => {
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    eprintln!("Failed to create tokio runtime: {e}");
                    std::process::exit(EXIT_ERROR);
                }
            };
            let cmd = ServeCommand::new(loader, listen);
            rt.block_on(cmd.run()).map_err(|e| e.to_string())
        }
        Commands::Config { action } => {
            let cmd = ConfigCommand::new(loader, action);
            cmd.run().map_err(|e| e.to_string())
        }
        Commands::Check(args) => handle_check(CheckCommand::new(loader, args)),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(EXIT_ERROR);
    }
}

/// Handle the check subcommand.
///
/// # Exit Codes
///
/// This function may call `std::process::exit` directly:
/// - Exit code 1: Policy denied
/// - Exit code 2: Other error
fn handle_check(cmd: CheckCommand) -> Result<(), String> {
    match cmd.run() {
        Ok(Verdict::Allowed) => Ok(()),
        Ok(Verdict::Denied { .. }) => std::process::exit(EXIT_POLICY_DENIED),
        Err(e @ CheckError::InvalidAmount { .. }) => Err(e.to_string()),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(EXIT_ERROR);
        }
    }
}

//! Argument parsing and CLI structure definitions.
//!
//! ```text
//! paygate serve [--listen ADDR]        Start the paywall server
//! paygate config                       Display the current configuration
//! paygate config init [--force]        Write the default configuration
//! paygate config path                  Print the configuration file path
//! paygate check --amount USD [...]     Dry-run a transfer against the policy
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use paygate_core::types::Direction;

/// Top-level CLI for the paygate gateway.
#[derive(Debug, Parser)]
#[command(
    name = "paygate",
    version,
    about = "Spending-policy paywall gateway",
    propagate_version = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration directory (default: ~/.paygate).
    #[arg(short, long, global = true, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the paywall server.
    Serve {
        /// Override the listen address from the configuration.
        #[arg(long, value_name = "ADDR")]
        listen: Option<String>,
    },

    /// View or manage the configuration.
    Config {
        /// Action to perform (omit to display the configuration).
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    /// Evaluate a hypothetical transfer against the loaded policy.
    Check(CheckArgs),
}

/// Actions for the `config` subcommand.
#[derive(Debug, Clone, Subcommand)]
pub enum ConfigAction {
    /// Write the default configuration file.
    Init {
        /// Overwrite an existing configuration.
        #[arg(long)]
        force: bool,
    },

    /// Print the configuration file path.
    Path,
}

/// Arguments for the `check` subcommand.
#[derive(Debug, Clone, Args)]
pub struct CheckArgs {
    /// Transfer direction.
    #[arg(long, value_enum, default_value_t = DirectionArg::Outgoing)]
    pub direction: DirectionArg,

    /// Counterparty address.
    #[arg(long, value_name = "ADDRESS")]
    pub to: Option<String>,

    /// Counterparty domain.
    #[arg(long, value_name = "DOMAIN")]
    pub domain: Option<String>,

    /// Full resource URL (for per-endpoint limits).
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    /// Amount in decimal USD.
    #[arg(long, value_name = "USD")]
    pub amount: f64,
}

/// Transfer direction as a CLI value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DirectionArg {
    /// Funds arriving at the agent.
    Incoming,
    /// Funds leaving the agent.
    Outgoing,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Incoming => Self::Incoming,
            DirectionArg::Outgoing => Self::Outgoing,
        }
    }
}

//! Command handlers for the paygate CLI.
//!
//! Each subcommand gets a handler struct constructed from a
//! [`ConfigLoader`](paygate_core::config_loader::ConfigLoader) and its
//! parsed arguments; `main` maps handler results onto exit codes.

pub mod check;
pub mod config;
pub mod exit_codes;
pub mod serve;

pub use check::{CheckCommand, CheckError};
pub use config::{ConfigCommand, ConfigCommandError};
pub use exit_codes::{EXIT_ERROR, EXIT_POLICY_DENIED, EXIT_SUCCESS};
pub use serve::{ServeCommand, ServeError};

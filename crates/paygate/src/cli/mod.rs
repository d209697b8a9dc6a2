//! Command-line interface for the paygate gateway.

pub mod args;
pub mod commands;

pub use args::{CheckArgs, Cli, Commands, ConfigAction, DirectionArg};

//! # Paygate Library
//!
//! Paywall gateway with spending-policy enforcement.
//!
//! This crate provides both a library interface and a binary for the
//! paygate gateway. The library exposes the policy gateway facade for
//! host agents, the paywall server, and the CLI module for programmatic
//! access to argument parsing and command structures.
//!
//! ## Modules
//!
//! - [`gate`] - The [`PaymentGate`] facade for embedding agents
//! - [`server`] - The axum paywall server and settlement client
//! - [`audit`] - Tamper-evident audit logging
//! - [`cli`] - Command-line interface definitions and handlers
//! - [`logging`] - Structured logging setup
//!
//! ## Usage
//!
//! ```no_run
//! use paygate::PaymentGate;
//! use paygate_core::config::Config;
//! use paygate_core::types::{MicroUsd, TransferRequest};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = Config::default();
//! config.settlement.pay_to = "0xdeadbeef".to_string();
//!
//! let gate = PaymentGate::from_config(&config)?;
//! let request = TransferRequest::outgoing(MicroUsd::from_usd(1.5).unwrap())
//!     .with_counterparty("api.example.com");
//! let verdict = gate.authorize_outgoing(&request)?;
//! if verdict.is_allowed() {
//!     // pay, then:
//!     gate.record_outgoing(&request);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod audit;
pub mod cli;
pub mod gate;
pub mod logging;
pub mod server;

// Re-export key types for convenience
pub use gate::{GateError, PaymentGate};
pub use logging::{
    init_logging, verbosity_to_level, LogConfig, LogError, LogFormat, LogGuard, LogLevel,
};

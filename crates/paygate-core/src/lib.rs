//! # paygate-core
//!
//! Core types, errors, and configuration for the `PayGate` spending-policy
//! gateway.
//!
//! ## Internal Crate Warning
//!
//! **This crate is an internal implementation detail of `paygate`.**
//!
//! It is published to crates.io only because Cargo requires all dependencies
//! to be published. The API is **unstable** and may change without notice
//! between any versions, including patch releases.
//!
//! ## Modules
//!
//! - [`error`] - Error types and result aliases
//! - [`types`] - Core data types ([`MicroUsd`], [`TransferRequest`],
//!   [`Verdict`])
//! - [`config`] - Configuration structures and validation
//! - [`config_loader`] - Configuration file loading and path expansion
//!
//! ## Money
//!
//! All monetary amounts flow through the gateway as [`MicroUsd`]: unsigned
//! fixed-point USD with six implied decimal places. Decimal USD only appears
//! at the configuration boundary and is converted once, at startup:
//!
//! ```rust
//! use paygate_core::MicroUsd;
//!
//! let price = MicroUsd::from_usd(0.01).expect("valid amount");
//! assert_eq!(price.micros(), 10_000);
//! ```
//!
//! ## Error Handling
//!
//! Each subsystem has its own error family, unified under
//! [`PaygateError`]:
//!
//! ```rust
//! use paygate_core::error::{ErrorCode, PaygateError};
//!
//! let err = PaygateError::policy_denied("daily", "limit exceeded");
//! assert_eq!(ErrorCode::from(&err), ErrorCode::PolicyViolation);
//! assert_eq!(ErrorCode::from(&err).http_status(), 403);
//! ```
//!
//! [`MicroUsd`]: types::MicroUsd
//! [`TransferRequest`]: types::TransferRequest
//! [`Verdict`]: types::Verdict

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod config_loader;
pub mod error;
pub mod types;

// Re-export commonly used error types at crate root for convenience
pub use error::{
    ConfigError, ErrorCode, PaygateError, PolicyError, Result, SettleError, StoreError,
};

// Re-export config types at crate root for convenience
pub use config::{
    AuditConfig, Config, LedgerBackend, LedgerConfig, Limit, LimitsConfig, PolicyGroup,
    RateLimitConfig, ServerConfig, SettlementConfig,
};

// Re-export config loader types at crate root for convenience
pub use config_loader::{expand_path, load_config, ConfigLoader};

// Re-export core types at crate root for convenience
pub use types::{Direction, MicroUsd, TransferRequest, Verdict, MICROS_PER_USD};

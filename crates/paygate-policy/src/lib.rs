//! # paygate-policy
//!
//! Policy evaluation, spending ledger, and rate limiting for the `PayGate`
//! spending-policy gateway.
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
//! - [`engine`] - The [`PolicyEvaluator`] and per-group check results
//! - [`ledger`] - Windowed spending totals over a pluggable store
//! - [`ratelimit`] - Rolling-window attempt caps
//! - [`scope`] - Limit scope resolution (endpoint, counterparty, global)
//! - [`store`] - Spend-history backends (in-memory and `SQLite`)
//! - [`clock`] - Time source abstraction for deterministic tests
//!
//! ## Evaluation Flow
//!
//! ```
//! use paygate_core::config::{Limit, LimitsConfig, PolicyGroup};
//! use paygate_core::types::{MicroUsd, TransferRequest};
//! use paygate_policy::clock::SystemClock;
//! use paygate_policy::engine::PolicyEvaluator;
//! use paygate_policy::ledger::SpendingLedger;
//! use paygate_policy::ratelimit::RateLimiter;
//! use paygate_policy::store::MemoryStore;
//! use std::sync::Arc;
//!
//! let clock = Arc::new(SystemClock);
//! let ledger = SpendingLedger::new(Arc::new(MemoryStore::new()), clock.clone());
//! let rate_limiter = RateLimiter::new(clock);
//!
//! let groups = vec![PolicyGroup::new("daily").with_outgoing_limits(
//!     LimitsConfig::new().with_global(
//!         Limit::new().with_max_total_usd(10.0).with_window_ms(86_400_000),
//!     ),
//! )];
//!
//! let evaluator = PolicyEvaluator::new(groups, ledger, rate_limiter);
//! let request = TransferRequest::outgoing(MicroUsd::from_usd(0.01).unwrap())
//!     .with_counterparty("svc.example.com");
//!
//! let verdict = evaluator.evaluate(&request).unwrap();
//! assert!(verdict.is_allowed());
//!
//! // After settlement, feed the amount back into the ledger.
//! evaluator.record_settlement(&request);
//! ```
//!
//! [`PolicyEvaluator`]: engine::PolicyEvaluator

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod clock;
pub mod engine;
pub mod ledger;
pub mod ratelimit;
pub mod scope;
pub mod store;

// Re-export the main entry points at crate root for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{DenialRule, GroupCheckResult, PolicyEvaluator};
pub use ledger::{LimitCheck, SpendingLedger};
pub use ratelimit::RateLimiter;
pub use scope::{find_most_specific_limit, resolve_domain, Scope};
pub use store::{LedgerKey, MemoryStore, SpendStore, SpendingEntry, SqliteStore};

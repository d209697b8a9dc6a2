//! Core data types for the `PayGate` policy engine.
//!
//! This module provides the foundational data structures shared across all
//! `PayGate` crates:
//!
//! - [`MicroUsd`] - fixed-point USD amounts (6 implied decimal places)
//! - [`Direction`] - whether a transfer is incoming or outgoing
//! - [`TransferRequest`] - a proposed transfer submitted for evaluation
//! - [`Verdict`] - the outcome of a policy evaluation
//!
//! # Numeric semantics
//!
//! All monetary amounts are expressed in base units of the reference currency
//! with 6 implied decimal places (micro-USD). Conversions from decimal USD
//! truncate toward zero; all arithmetic on accumulated totals is saturating
//! integer addition, so there is no floating-point drift anywhere past the
//! configuration boundary.
//!
//! # Example
//!
//! ```
//! use paygate_core::types::{Direction, MicroUsd, TransferRequest, Verdict};
//!
//! let amount = MicroUsd::from_usd(2.5).expect("valid amount");
//! assert_eq!(amount.micros(), 2_500_000);
//!
//! let request = TransferRequest::outgoing(amount)
//!     .with_counterparty("0x742d35Cc6634C0532925a3b844Bc454e7595f")
//!     .with_domain("svc.example.com");
//!
//! assert_eq!(request.direction, Direction::Outgoing);
//! assert!(Verdict::Allowed.is_allowed());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of base units per whole USD (6 implied decimal places).
pub const MICROS_PER_USD: u64 = 1_000_000;

/// A USD amount in fixed-point base units (micro-USD).
///
/// Internally a `u64` count of millionths of a dollar. Negative amounts
/// cannot be represented; callers that decode external amounts must map
/// non-positive values to [`MicroUsd::ZERO`] before they reach the ledger,
/// which silently ignores zero.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MicroUsd(u64);

impl MicroUsd {
    /// Zero dollars.
    pub const ZERO: Self = Self(0);

    /// Creates an amount from a raw base-unit count.
    #[must_use]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Converts a decimal USD value to base units, truncating toward zero.
    ///
    /// Returns `None` for NaN, negative, or out-of-range values. This is the
    /// only place floating point touches monetary values; everything past the
    /// configuration boundary is integer arithmetic.
    ///
    /// # Examples
    ///
    /// ```
    /// use paygate_core::types::MicroUsd;
    ///
    /// assert_eq!(MicroUsd::from_usd(1.0).unwrap().micros(), 1_000_000);
    /// assert_eq!(MicroUsd::from_usd(0.1234567).unwrap().micros(), 123_456);
    /// assert!(MicroUsd::from_usd(-1.0).is_none());
    /// assert!(MicroUsd::from_usd(f64::NAN).is_none());
    /// ```
    #[must_use]
    pub fn from_usd(usd: f64) -> Option<Self> {
        if !usd.is_finite() || usd < 0.0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let scaled = usd * MICROS_PER_USD as f64;
        #[allow(clippy::cast_precision_loss)]
        if scaled >= u64::MAX as f64 {
            return None;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Some(Self(scaled.trunc() as u64))
    }

    /// Returns the raw base-unit count.
    #[must_use]
    pub const fn micros(self) -> u64 {
        self.0
    }

    /// Returns `true` if the amount is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Saturating addition; totals cap at `u64::MAX` base units instead of
    /// wrapping.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for MicroUsd {
    /// Formats as a decimal USD string, e.g. `4`, `0.50`, `1.234567`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / MICROS_PER_USD;
        let frac = self.0 % MICROS_PER_USD;
        if frac == 0 {
            return write!(f, "{whole}");
        }
        let mut frac_str = format!("{frac:06}");
        while frac_str.ends_with('0') {
            frac_str.pop();
        }
        write!(f, "{whole}.{frac_str}")
    }
}

/// Direction of a monetary transfer, relative to the agent being governed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Funds arriving at the agent (the agent is the payee).
    Incoming,
    /// Funds leaving the agent (the agent is the payer).
    Outgoing,
}

impl Direction {
    /// Stable lowercase identifier used in ledger keys and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Incoming => "incoming",
            Self::Outgoing => "outgoing",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposed transfer submitted to the policy evaluator.
///
/// The counterparty address is optional because, for inbound requests, the
/// payer is only revealed by a successful settlement; admission runs with
/// whatever identifying information the request carries (usually just the
/// sender domain).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Whether the transfer is incoming or outgoing.
    pub direction: Direction,

    /// Counterparty address, if known at evaluation time.
    pub counterparty: Option<String>,

    /// Counterparty domain, extracted from `Origin`/`Referer` headers or
    /// from the target URL of an outgoing payment.
    pub domain: Option<String>,

    /// Full resource URL of the request, used for per-endpoint limits.
    pub request_url: Option<String>,

    /// Transfer amount in base units.
    pub amount: MicroUsd,
}

impl TransferRequest {
    /// Creates an incoming transfer request with no counterparty information.
    #[must_use]
    pub const fn incoming(amount: MicroUsd) -> Self {
        Self {
            direction: Direction::Incoming,
            counterparty: None,
            domain: None,
            request_url: None,
            amount,
        }
    }

    /// Creates an outgoing transfer request with no counterparty information.
    #[must_use]
    pub const fn outgoing(amount: MicroUsd) -> Self {
        Self {
            direction: Direction::Outgoing,
            counterparty: None,
            domain: None,
            request_url: None,
            amount,
        }
    }

    /// Sets the counterparty address.
    #[must_use]
    pub fn with_counterparty(mut self, counterparty: impl Into<String>) -> Self {
        self.counterparty = Some(counterparty.into());
        self
    }

    /// Sets the counterparty domain.
    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Sets the full request URL.
    #[must_use]
    pub fn with_request_url(mut self, url: impl Into<String>) -> Self {
        self.request_url = Some(url.into());
        self
    }
}

/// Outcome of evaluating a transfer against all policy groups.
///
/// A denial is an expected, recoverable outcome surfaced as a value, never an
/// internal error; evaluation errors (store failures and the like) travel
/// separately as [`crate::error::PolicyError`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "result")]
pub enum Verdict {
    /// All configured policy groups admit the transfer.
    #[default]
    Allowed,

    /// A policy group denied the transfer; no later group was consulted.
    Denied {
        /// Name of the denying policy group.
        group: String,
        /// Human-readable explanation of the denial.
        reason: String,
    },
}

impl Verdict {
    /// Returns `true` if the transfer is admitted.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Returns `true` if the transfer is denied.
    #[must_use]
    pub const fn is_denied(&self) -> bool {
        !self.is_allowed()
    }

    /// Name of the denying group, if any.
    #[must_use]
    pub fn group(&self) -> Option<&str> {
        match self {
            Self::Allowed => None,
            Self::Denied { group, .. } => Some(group),
        }
    }

    /// Denial reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Allowed => None,
            Self::Denied { reason, .. } => Some(reason),
        }
    }
}

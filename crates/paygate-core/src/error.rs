//! Error types for the `PayGate` spending-policy gateway.
//!
//! Errors are organized by domain:
//!
//! - [`ConfigError`] - configuration loading and validation failures
//! - [`StoreError`] - spend-history storage failures
//! - [`PolicyError`] - policy *evaluation* failures (not denials)
//! - [`SettleError`] - settlement collaborator failures
//! - [`PaygateError`] - top-level error wrapping all of the above
//!
//! Policy denials are never errors: they are surfaced as
//! [`Verdict::Denied`](crate::types::Verdict) values and, at the HTTP
//! boundary, as structured 403 responses. Configuration errors, by contrast,
//! are fatal at startup and never silently downgraded.
//!
//! # Example
//!
//! ```rust
//! use paygate_core::error::{ConfigError, PaygateError};
//!
//! fn check_payout(pay_to: &str) -> Result<(), PaygateError> {
//!     if pay_to.is_empty() {
//!         return Err(ConfigError::missing_field("settlement.pay_to").into());
//!     }
//!     Ok(())
//! }
//! ```

use std::fmt;

/// Top-level error type for `PayGate`.
///
/// Wraps all domain-specific error types with automatic conversion via
/// `#[from]`.
#[derive(Debug, thiserror::Error)]
pub enum PaygateError {
    /// Configuration loading or validation failed.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Spend-history storage operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Policy evaluation failed (not a denial, an evaluation failure).
    #[error("policy error: {0}")]
    Policy(#[from] PolicyError),

    /// Settlement collaborator failed.
    #[error("settlement error: {0}")]
    Settle(#[from] SettleError),

    /// A policy group denied the transfer.
    ///
    /// Only used by CLI paths that need to map a denial to an exit code;
    /// the server surfaces denials as structured 403 responses instead.
    #[error("policy denied by group {group}: {reason}")]
    PolicyDenied {
        /// The policy group that denied the transfer.
        group: String,
        /// Human-readable reason for denial.
        reason: String,
    },
}

impl PaygateError {
    /// Creates a policy denied error.
    #[must_use]
    pub fn policy_denied(group: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PolicyDenied {
            group: group.into(),
            reason: reason.into(),
        }
    }
}

/// Stable error codes used in JSON error bodies at the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// A policy group denied the transfer (HTTP 403).
    PolicyViolation,
    /// The settlement collaborator rejected the payment (HTTP 402).
    SettlementRejected,
    /// The request was malformed (HTTP 400).
    InvalidRequest,
    /// An internal failure that is not the caller's fault (HTTP 500).
    InternalError,
}

impl ErrorCode {
    /// Returns the wire identifier used in JSON error bodies.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PolicyViolation => "policy_violation",
            Self::SettlementRejected => "settlement_rejected",
            Self::InvalidRequest => "invalid_request",
            Self::InternalError => "internal_error",
        }
    }

    /// Returns the HTTP status code this error code maps to.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::PolicyViolation => 403,
            Self::SettlementRejected => 402,
            Self::InvalidRequest => 400,
            Self::InternalError => 500,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.http_status())
    }
}

impl From<&PaygateError> for ErrorCode {
    fn from(error: &PaygateError) -> Self {
        match error {
            PaygateError::PolicyDenied { .. } => Self::PolicyViolation,
            PaygateError::Settle(SettleError::Rejected { .. }) => Self::SettlementRejected,
            PaygateError::Config(_)
            | PaygateError::Store(_)
            | PaygateError::Policy(_)
            | PaygateError::Settle(_) => Self::InternalError,
        }
    }
}

// ============================================================================
// ConfigError
// ============================================================================

/// Errors that can occur while loading or validating configuration.
///
/// These are fatal at startup: a gateway with an invalid policy or settlement
/// configuration must not serve traffic.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The home directory could not be determined for `~` expansion.
    #[error("could not determine home directory")]
    NoHomeDirectory,

    /// File system I/O error while reading or writing configuration.
    #[error("{context}")]
    Io {
        /// Description of the operation that failed.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file does not exist.
    #[error("configuration file not found: {path}")]
    FileNotFound {
        /// Path that was checked.
        path: String,
    },

    /// The configuration file contains invalid TOML.
    #[error("failed to parse configuration: {context}")]
    ParseFailed {
        /// Description of the parse failure.
        context: String,
    },

    /// A required field is missing or empty.
    #[error("missing required configuration field: {field}")]
    MissingField {
        /// Dotted path of the missing field, e.g. `settlement.pay_to`.
        field: String,
    },

    /// The configured settlement network is not supported.
    #[error("unsupported settlement network: {network}")]
    UnsupportedNetwork {
        /// The network identifier that was requested.
        network: String,
    },

    /// A monetary amount in the configuration is invalid.
    #[error("invalid amount for {field}: {value}")]
    InvalidAmount {
        /// Dotted path of the offending field.
        field: String,
        /// The rejected value, rendered as text.
        value: String,
    },

    /// A policy group definition is invalid.
    #[error("invalid policy group {group}: {context}")]
    InvalidGroup {
        /// Name of the offending group (may be empty if the name itself is
        /// the problem).
        group: String,
        /// Description of the problem.
        context: String,
    },
}

impl ConfigError {
    /// Creates a `NoHomeDirectory` error.
    #[must_use]
    pub const fn no_home_directory() -> Self {
        Self::NoHomeDirectory
    }

    /// Creates an `Io` error with context.
    #[must_use]
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Creates a `FileNotFound` error.
    #[must_use]
    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Creates a `ParseFailed` error with context.
    #[must_use]
    pub fn parse_failed(context: impl Into<String>) -> Self {
        Self::ParseFailed {
            context: context.into(),
        }
    }

    /// Creates a `MissingField` error.
    #[must_use]
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Creates an `UnsupportedNetwork` error.
    #[must_use]
    pub fn unsupported_network(network: impl Into<String>) -> Self {
        Self::UnsupportedNetwork {
            network: network.into(),
        }
    }

    /// Creates an `InvalidAmount` error.
    #[must_use]
    pub fn invalid_amount(field: impl Into<String>, value: impl fmt::Display) -> Self {
        Self::InvalidAmount {
            field: field.into(),
            value: value.to_string(),
        }
    }

    /// Creates an `InvalidGroup` error.
    #[must_use]
    pub fn invalid_group(group: impl Into<String>, context: impl Into<String>) -> Self {
        Self::InvalidGroup {
            group: group.into(),
            context: context.into(),
        }
    }
}

// ============================================================================
// StoreError
// ============================================================================

/// Errors that can occur in the spend-history store.
///
/// Admission paths treat these as evaluation failures (fail closed); the
/// recording path logs and swallows them (fail open), since by then the
/// settlement has already succeeded.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[source] std::io::Error),

    /// The backing database reported a failure.
    #[error("backend error: {context}")]
    Backend {
        /// Description of the backend failure.
        context: String,
    },
}

impl StoreError {
    /// Creates a `Backend` error with context.
    #[must_use]
    pub fn backend(context: impl Into<String>) -> Self {
        Self::Backend {
            context: context.into(),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error)
    }
}

// ============================================================================
// PolicyError
// ============================================================================

/// Errors that can occur during policy evaluation.
///
/// Note: these are evaluation *failures*, not denials. Denials are values,
/// see [`Verdict`](crate::types::Verdict).
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// The policy configuration is invalid.
    #[error("invalid policy configuration: {context}")]
    InvalidConfiguration {
        /// Description of the configuration problem.
        context: String,
    },

    /// The spend-history store failed during evaluation.
    #[error("store failure during evaluation: {0}")]
    Store(#[from] StoreError),
}

impl PolicyError {
    /// Creates an `InvalidConfiguration` error with context.
    #[must_use]
    pub fn invalid_configuration(context: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            context: context.into(),
        }
    }
}

// ============================================================================
// SettleError
// ============================================================================

/// Errors from the external settlement collaborator.
#[derive(Debug, thiserror::Error)]
pub enum SettleError {
    /// The facilitator rejected the payment.
    #[error("settlement rejected: {reason}")]
    Rejected {
        /// Reason reported by the facilitator.
        reason: String,
    },

    /// Transport-level failure talking to the facilitator.
    #[error("facilitator transport error: {context}")]
    Transport {
        /// Description of the transport failure.
        context: String,
    },

    /// The facilitator returned a response we could not interpret.
    #[error("invalid facilitator response: {context}")]
    InvalidResponse {
        /// Description of the decoding failure.
        context: String,
    },
}

impl SettleError {
    /// Creates a `Rejected` error.
    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// Creates a `Transport` error with context.
    #[must_use]
    pub fn transport(context: impl Into<String>) -> Self {
        Self::Transport {
            context: context.into(),
        }
    }

    /// Creates an `InvalidResponse` error with context.
    #[must_use]
    pub fn invalid_response(context: impl Into<String>) -> Self {
        Self::InvalidResponse {
            context: context.into(),
        }
    }
}

/// Convenience alias for results with [`PaygateError`].
pub type Result<T> = std::result::Result<T, PaygateError>;

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_error_code_wire_identifiers() {
        assert_eq!(ErrorCode::PolicyViolation.as_str(), "policy_violation");
        assert_eq!(ErrorCode::SettlementRejected.as_str(), "settlement_rejected");
        assert_eq!(ErrorCode::InvalidRequest.as_str(), "invalid_request");
        assert_eq!(ErrorCode::InternalError.as_str(), "internal_error");
    }

    #[test]
    fn test_error_code_http_status() {
        assert_eq!(ErrorCode::PolicyViolation.http_status(), 403);
        assert_eq!(ErrorCode::SettlementRejected.http_status(), 402);
        assert_eq!(ErrorCode::InvalidRequest.http_status(), 400);
        assert_eq!(ErrorCode::InternalError.http_status(), 500);
    }

    #[test]
    fn test_policy_denied_maps_to_policy_violation() {
        let err = PaygateError::policy_denied("daily", "over budget");
        assert_eq!(ErrorCode::from(&err), ErrorCode::PolicyViolation);
    }

    #[test]
    fn test_settle_rejected_maps_to_settlement_rejected() {
        let err = PaygateError::from(SettleError::rejected("insufficient funds"));
        assert_eq!(ErrorCode::from(&err), ErrorCode::SettlementRejected);
    }

    #[test]
    fn test_config_error_is_internal() {
        let err = PaygateError::from(ConfigError::missing_field("settlement.pay_to"));
        assert_eq!(ErrorCode::from(&err), ErrorCode::InternalError);
    }

    #[test]
    fn test_error_display_chains() {
        let err = PaygateError::from(ConfigError::unsupported_network("mars"));
        assert!(err.to_string().contains("unsupported settlement network"));
        assert!(err.to_string().contains("mars"));
    }

    #[test]
    fn test_store_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let err = StoreError::from(io);
        assert!(matches!(err, StoreError::Io(_)));
    }

    #[test]
    fn test_policy_error_from_store() {
        let err = PolicyError::from(StoreError::backend("pool exhausted"));
        assert!(err.to_string().contains("pool exhausted"));
    }
}

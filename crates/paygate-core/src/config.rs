//! Configuration types for the `PayGate` spending-policy gateway.
//!
//! This module provides the configuration structures for the `PayGate`
//! daemon: server settings, the settlement collaborator, spend-ledger
//! storage, audit logging, and the policy groups themselves.
//!
//! # Configuration File
//!
//! Configuration is stored in TOML format at `~/.paygate/config.toml`.
//! Policy groups are loaded once at process start and are immutable for the
//! process lifetime; there is no hot-reload.
//!
//! # Examples
//!
//! ```
//! use paygate_core::config::Config;
//!
//! let toml_str = r#"
//! [server]
//! listen_addr = "127.0.0.1:8402"
//! resource_path = "/reports/weather"
//! price_usd = 0.01
//!
//! [settlement]
//! pay_to = "0x209693Bc6afc0C5328bA36FaF03C514EF312287C"
//! network = "base"
//!
//! [[policy_group]]
//! name = "daily"
//!
//! [policy_group.outgoing_limits.global]
//! max_total_usd = 10.0
//! window_ms = 86400000
//! "#;
//!
//! let config: Config = toml::from_str(toml_str).expect("valid TOML");
//! config.validate().expect("valid config");
//! assert_eq!(config.policy_groups.len(), 1);
//! ```

use crate::error::ConfigError;
use crate::types::{Direction, MicroUsd};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Settlement networks the gateway knows how to talk to.
pub const SUPPORTED_NETWORKS: &[&str] = &["base", "base-sepolia", "avalanche", "iotex"];

/// Top-level configuration for the `PayGate` daemon.
///
/// Sections:
///
/// - **Server**: listen address, protected resource path, declared price
/// - **Settlement**: facilitator endpoint and payout address
/// - **Ledger**: spend-history storage backend
/// - **Audit**: tamper-evident admission log
/// - **Policy groups**: the enforcement rules themselves
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Settlement collaborator configuration.
    #[serde(default)]
    pub settlement: SettlementConfig,

    /// Spend-ledger storage configuration.
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Audit log configuration.
    #[serde(default)]
    pub audit: AuditConfig,

    /// Ordered list of policy groups; evaluation order is configuration
    /// order.
    #[serde(default, rename = "policy_group")]
    pub policy_groups: Vec<PolicyGroup>,
}

impl Config {
    /// Validates the whole configuration.
    ///
    /// Configuration errors are fatal at startup and never silently
    /// downgraded: a gateway with a missing payout address or an unsupported
    /// network must not serve traffic.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if:
    /// - `settlement.pay_to` is empty
    /// - `settlement.network` is not one of [`SUPPORTED_NETWORKS`]
    /// - any USD amount is negative, NaN, or out of range
    /// - a policy group has an empty or duplicate name
    /// - a rate limit has a zero count or window
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.settlement.validate()?;
        self.server.validate()?;

        let mut seen = HashSet::new();
        for group in &self.policy_groups {
            group.validate()?;
            if !seen.insert(group.name.as_str()) {
                return Err(ConfigError::invalid_group(
                    group.name.clone(),
                    "duplicate group name",
                ));
            }
        }
        Ok(())
    }

    /// Returns the default configuration rendered as commented TOML.
    ///
    /// Used by `paygate config init` to seed a fresh installation.
    #[must_use]
    pub fn default_toml() -> String {
        r#"[server]
listen_addr = "127.0.0.1:8402"
resource_path = "/paid/resource"
price_usd = 0.01

[settlement]
facilitator_url = "https://facilitator.example.com"
# Payout address for incoming settlements (required).
pay_to = ""
network = "base"
scheme = "exact"

[ledger]
# "memory" (default) or "sqlite"
backend = "memory"
db_path = "~/.paygate/spend.db"

[audit]
enabled = false
directory = "~/.paygate/audit"

# [[policy_group]]
# name = "daily"
# blocked_recipients = []
# allowed_recipients = []
#
# [policy_group.outgoing_limits.global]
# max_total_usd = 10.0
# window_ms = 86400000
#
# Incoming per_endpoint keys match the URL the server reconstructs from the
# Host header, which is always "http://<host><path>" even behind a TLS
# terminator; outgoing keys match the request URL exactly as the agent
# supplies it.
# [policy_group.incoming_limits.per_endpoint."http://127.0.0.1:8402/paid/resource"]
# max_total_usd = 5.0
# window_ms = 86400000
#
# [policy_group.rate_limits]
# max_payments = 100
# window_ms = 60000
"#
        .to_string()
    }
}

/// Returns the default listen address.
fn default_listen_addr() -> String {
    "127.0.0.1:8402".to_string()
}

/// Returns the default protected resource path.
fn default_resource_path() -> String {
    "/paid/resource".to_string()
}

/// Returns the default declared price in USD.
const fn default_price_usd() -> f64 {
    0.01
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Address the HTTP server binds to.
    ///
    /// Default: `127.0.0.1:8402`
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Path of the single protected resource the paywall guards.
    ///
    /// Default: `/paid/resource`
    #[serde(default = "default_resource_path")]
    pub resource_path: String,

    /// Declared price of the protected resource in decimal USD.
    ///
    /// Converted once, at startup, to fixed-point base units.
    ///
    /// Default: `0.01`
    #[serde(default = "default_price_usd")]
    pub price_usd: f64,
}

impl ServerConfig {
    /// Declared price in base units.
    ///
    /// Falls back to zero for unvalidated configurations; [`Config::validate`]
    /// rejects prices that do not convert.
    #[must_use]
    pub fn price(&self) -> MicroUsd {
        MicroUsd::from_usd(self.price_usd).unwrap_or(MicroUsd::ZERO)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if MicroUsd::from_usd(self.price_usd).is_none() {
            return Err(ConfigError::invalid_amount(
                "server.price_usd",
                self.price_usd,
            ));
        }
        if self.resource_path.is_empty() || !self.resource_path.starts_with('/') {
            return Err(ConfigError::missing_field("server.resource_path"));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            resource_path: default_resource_path(),
            price_usd: default_price_usd(),
        }
    }
}

/// Returns the default facilitator URL.
fn default_facilitator_url() -> String {
    "https://facilitator.example.com".to_string()
}

/// Returns the default settlement network.
fn default_network() -> String {
    "base".to_string()
}

/// Returns the default settlement scheme.
fn default_scheme() -> String {
    "exact".to_string()
}

/// Settlement collaborator configuration.
///
/// The cryptographic challenge/verify/settle protocol itself is external;
/// this section only locates the facilitator and names the payout address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SettlementConfig {
    /// Base URL of the external settlement facilitator.
    #[serde(default = "default_facilitator_url")]
    pub facilitator_url: String,

    /// Payout address that incoming settlements are directed to.
    ///
    /// Required; an empty value is a fatal configuration error.
    #[serde(default)]
    pub pay_to: String,

    /// Settlement network identifier (must be one of
    /// [`SUPPORTED_NETWORKS`]).
    ///
    /// Default: `base`
    #[serde(default = "default_network")]
    pub network: String,

    /// Settlement scheme identifier.
    ///
    /// Default: `exact`
    #[serde(default = "default_scheme")]
    pub scheme: String,
}

impl SettlementConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.pay_to.is_empty() {
            return Err(ConfigError::missing_field("settlement.pay_to"));
        }
        if !SUPPORTED_NETWORKS.contains(&self.network.as_str()) {
            return Err(ConfigError::unsupported_network(self.network.clone()));
        }
        Ok(())
    }
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            facilitator_url: default_facilitator_url(),
            pay_to: String::new(),
            network: default_network(),
            scheme: default_scheme(),
        }
    }
}

/// Spend-ledger storage backend selector.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    /// In-process map; spend history does not survive restarts.
    #[default]
    Memory,
    /// `SQLite` file; spend history survives restarts.
    Sqlite,
}

/// Returns the default ledger database path.
fn default_db_path() -> String {
    "~/.paygate/spend.db".to_string()
}

/// Spend-ledger storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Storage backend.
    #[serde(default)]
    pub backend: LedgerBackend,

    /// Database file path (only used by the `sqlite` backend). Supports `~`
    /// expansion.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: LedgerBackend::default(),
            db_path: default_db_path(),
        }
    }
}

/// Returns the default audit log directory.
fn default_audit_directory() -> String {
    "~/.paygate/audit".to_string()
}

/// Audit log configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditConfig {
    /// Whether admission decisions are written to the tamper-evident audit
    /// log.
    #[serde(default)]
    pub enabled: bool,

    /// Directory holding the audit log and its HMAC key. Supports `~`
    /// expansion.
    #[serde(default = "default_audit_directory")]
    pub directory: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: default_audit_directory(),
        }
    }
}

/// A named, ordered unit of policy enforcement.
///
/// Each group bundles allow/block lists, scoped spending limits, and a rate
/// limit. Groups are evaluated in configuration order and the first
/// violation blocks the transfer regardless of later groups' opinions.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PolicyGroup {
    /// Unique group name, also used as the audit label.
    pub name: String,

    /// Scoped limits applied to outgoing transfers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outgoing_limits: Option<LimitsConfig>,

    /// Scoped limits applied to incoming transfers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incoming_limits: Option<LimitsConfig>,

    /// Addresses or domains allowed to receive outgoing transfers. Empty
    /// means no allow list is configured (default allow).
    #[serde(default)]
    pub allowed_recipients: Vec<String>,

    /// Addresses or domains blocked from receiving outgoing transfers.
    #[serde(default)]
    pub blocked_recipients: Vec<String>,

    /// Addresses or domains allowed to send incoming transfers. Empty means
    /// no allow list is configured (default allow).
    #[serde(default)]
    pub allowed_senders: Vec<String>,

    /// Addresses or domains blocked from sending incoming transfers.
    #[serde(default)]
    pub blocked_senders: Vec<String>,

    /// Rolling-window cap on transfer attempts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limits: Option<RateLimitConfig>,
}

impl PolicyGroup {
    /// Creates an empty policy group with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the outgoing limits.
    #[must_use]
    pub fn with_outgoing_limits(mut self, limits: LimitsConfig) -> Self {
        self.outgoing_limits = Some(limits);
        self
    }

    /// Sets the incoming limits.
    #[must_use]
    pub fn with_incoming_limits(mut self, limits: LimitsConfig) -> Self {
        self.incoming_limits = Some(limits);
        self
    }

    /// Sets the allowed recipients list.
    #[must_use]
    pub fn with_allowed_recipients(mut self, list: Vec<String>) -> Self {
        self.allowed_recipients = list;
        self
    }

    /// Sets the blocked recipients list.
    #[must_use]
    pub fn with_blocked_recipients(mut self, list: Vec<String>) -> Self {
        self.blocked_recipients = list;
        self
    }

    /// Sets the allowed senders list.
    #[must_use]
    pub fn with_allowed_senders(mut self, list: Vec<String>) -> Self {
        self.allowed_senders = list;
        self
    }

    /// Sets the blocked senders list.
    #[must_use]
    pub fn with_blocked_senders(mut self, list: Vec<String>) -> Self {
        self.blocked_senders = list;
        self
    }

    /// Sets the rate limits.
    #[must_use]
    pub const fn with_rate_limits(mut self, limits: RateLimitConfig) -> Self {
        self.rate_limits = Some(limits);
        self
    }

    /// The limits config governing transfers in `direction`, if any.
    #[must_use]
    pub const fn limits(&self, direction: Direction) -> Option<&LimitsConfig> {
        match direction {
            Direction::Outgoing => self.outgoing_limits.as_ref(),
            Direction::Incoming => self.incoming_limits.as_ref(),
        }
    }

    /// The allow list for `direction`. Empty means "not configured".
    #[must_use]
    pub fn allow_list(&self, direction: Direction) -> &[String] {
        match direction {
            Direction::Outgoing => &self.allowed_recipients,
            Direction::Incoming => &self.allowed_senders,
        }
    }

    /// The block list for `direction`.
    #[must_use]
    pub fn block_list(&self, direction: Direction) -> &[String] {
        match direction {
            Direction::Outgoing => &self.blocked_recipients,
            Direction::Incoming => &self.blocked_senders,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::invalid_group(
                String::new(),
                "group name must not be empty",
            ));
        }
        if let Some(rate) = &self.rate_limits {
            if rate.max_payments == 0 {
                return Err(ConfigError::invalid_group(
                    self.name.clone(),
                    "rate_limits.max_payments must be at least 1",
                ));
            }
            if rate.window_ms == 0 {
                return Err(ConfigError::invalid_group(
                    self.name.clone(),
                    "rate_limits.window_ms must be at least 1",
                ));
            }
        }
        for (side, limits) in [
            ("outgoing_limits", &self.outgoing_limits),
            ("incoming_limits", &self.incoming_limits),
        ] {
            if let Some(limits) = limits {
                limits.validate(&self.name, side)?;
            }
        }
        Ok(())
    }
}

/// Scoped spending limits for one direction.
///
/// The per-counterparty map is keyed by address or domain; the TOML field
/// accepts the direction-specific spellings `per_target` (outgoing) and
/// `per_sender` (incoming) as aliases.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LimitsConfig {
    /// Catch-all limit applied when no more specific scope matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global: Option<Limit>,

    /// Limits keyed by counterparty address or domain.
    #[serde(default, alias = "per_target", alias = "per_sender")]
    pub per_counterparty: HashMap<String, Limit>,

    /// Limits keyed by full resource URL, matched exactly.
    ///
    /// For the incoming direction the server reconstructs the URL as
    /// `http://<host><path>` from the Host header; keys must use that form
    /// (scheme included) even when TLS is terminated upstream.
    #[serde(default)]
    pub per_endpoint: HashMap<String, Limit>,
}

impl LimitsConfig {
    /// Creates an empty limits config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the global limit.
    #[must_use]
    pub fn with_global(mut self, limit: Limit) -> Self {
        self.global = Some(limit);
        self
    }

    /// Adds a per-counterparty limit keyed by address or domain.
    #[must_use]
    pub fn with_counterparty_limit(mut self, key: impl Into<String>, limit: Limit) -> Self {
        self.per_counterparty.insert(key.into(), limit);
        self
    }

    /// Adds a per-endpoint limit keyed by full resource URL.
    #[must_use]
    pub fn with_endpoint_limit(mut self, url: impl Into<String>, limit: Limit) -> Self {
        self.per_endpoint.insert(url.into(), limit);
        self
    }

    fn validate(&self, group: &str, side: &str) -> Result<(), ConfigError> {
        let mut check = |field: String, limit: &Limit| -> Result<(), ConfigError> {
            for (name, value) in [
                ("max_payment_usd", limit.max_payment_usd),
                ("max_total_usd", limit.max_total_usd),
            ] {
                if let Some(value) = value {
                    if MicroUsd::from_usd(value).is_none() {
                        return Err(ConfigError::invalid_amount(
                            format!("policy_group.{group}.{field}.{name}"),
                            value,
                        ));
                    }
                }
            }
            if limit.window_ms == Some(0) {
                return Err(ConfigError::invalid_group(
                    group.to_string(),
                    format!("{field}: window_ms must be at least 1"),
                ));
            }
            Ok(())
        };

        if let Some(limit) = &self.global {
            check(format!("{side}.global"), limit)?;
        }
        for (key, limit) in &self.per_counterparty {
            check(format!("{side}.per_counterparty.{key}"), limit)?;
        }
        for (url, limit) in &self.per_endpoint {
            check(format!("{side}.per_endpoint.{url}"), limit)?;
        }
        Ok(())
    }
}

/// A single scoped limit.
///
/// `max_payment_usd` bounds one transfer (stateless); `max_total_usd` bounds
/// the sum of transfers in the scope, over a rolling window of `window_ms`
/// milliseconds if present and over the process lifetime otherwise.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Limit {
    /// Maximum amount for a single transfer, in decimal USD.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payment_usd: Option<f64>,

    /// Maximum summed amount for the scope, in decimal USD.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_total_usd: Option<f64>,

    /// Rolling-window length for `max_total_usd`, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_ms: Option<u64>,
}

impl Limit {
    /// Creates an empty limit.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_payment_usd: None,
            max_total_usd: None,
            window_ms: None,
        }
    }

    /// Sets the per-payment cap.
    #[must_use]
    pub const fn with_max_payment_usd(mut self, usd: f64) -> Self {
        self.max_payment_usd = Some(usd);
        self
    }

    /// Sets the summed-total cap.
    #[must_use]
    pub const fn with_max_total_usd(mut self, usd: f64) -> Self {
        self.max_total_usd = Some(usd);
        self
    }

    /// Sets the rolling-window length.
    #[must_use]
    pub const fn with_window_ms(mut self, window_ms: u64) -> Self {
        self.window_ms = Some(window_ms);
        self
    }

    /// Per-payment cap in base units, if configured and convertible.
    #[must_use]
    pub fn max_payment(&self) -> Option<MicroUsd> {
        self.max_payment_usd.and_then(MicroUsd::from_usd)
    }

    /// Summed-total cap in base units, if configured and convertible.
    #[must_use]
    pub fn max_total(&self) -> Option<MicroUsd> {
        self.max_total_usd.and_then(MicroUsd::from_usd)
    }
}

/// Rolling-window cap on transfer attempts for a policy group.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum attempts within the window.
    pub max_payments: u32,

    /// Window length in milliseconds.
    pub window_ms: u64,
}

impl RateLimitConfig {
    /// Creates a rate limit config.
    #[must_use]
    pub const fn new(max_payments: u32, window_ms: u64) -> Self {
        Self {
            max_payments,
            window_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.settlement.pay_to = "0x209693Bc6afc0C5328bA36FaF03C514EF312287C".to_string();
        config
    }

    // =========================================================================
    // Defaults and parsing
    // =========================================================================

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.server.listen_addr, "127.0.0.1:8402");
        assert_eq!(config.server.resource_path, "/paid/resource");
        assert_eq!(config.settlement.network, "base");
        assert_eq!(config.settlement.scheme, "exact");
        assert_eq!(config.ledger.backend, LedgerBackend::Memory);
        assert!(!config.audit.enabled);
        assert!(config.policy_groups.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            [server]
            listen_addr = "0.0.0.0:9000"
            resource_path = "/reports/weather"
            price_usd = 0.25

            [settlement]
            facilitator_url = "https://settle.internal"
            pay_to = "0xPAYOUT"
            network = "base-sepolia"

            [ledger]
            backend = "sqlite"
            db_path = "/var/lib/paygate/spend.db"

            [[policy_group]]
            name = "daily"
            blocked_recipients = ["bad.example.com"]

            [policy_group.outgoing_limits.global]
            max_total_usd = 10.0
            window_ms = 86400000

            [policy_group.rate_limits]
            max_payments = 100
            window_ms = 60000
        "#;

        let config: Config = toml::from_str(toml_str).expect("valid TOML");
        assert_eq!(config.server.price_usd, 0.25);
        assert_eq!(config.ledger.backend, LedgerBackend::Sqlite);
        assert_eq!(config.policy_groups.len(), 1);

        let group = &config.policy_groups[0];
        assert_eq!(group.name, "daily");
        let limits = group.outgoing_limits.as_ref().unwrap();
        let global = limits.global.unwrap();
        assert_eq!(global.max_total().unwrap().micros(), 10_000_000);
        assert_eq!(global.window_ms, Some(86_400_000));
        assert_eq!(group.rate_limits.unwrap().max_payments, 100);
    }

    #[test]
    fn test_per_target_and_per_sender_aliases() {
        let toml_str = r#"
            [[policy_group]]
            name = "scoped"

            [policy_group.outgoing_limits.per_target."svc.example.com"]
            max_payment_usd = 5.0

            [policy_group.incoming_limits.per_sender."agent.example.org"]
            max_total_usd = 2.0
        "#;

        let config: Config = toml::from_str(toml_str).expect("valid TOML");
        let group = &config.policy_groups[0];
        assert!(group
            .outgoing_limits
            .as_ref()
            .unwrap()
            .per_counterparty
            .contains_key("svc.example.com"));
        assert!(group
            .incoming_limits
            .as_ref()
            .unwrap()
            .per_counterparty
            .contains_key("agent.example.org"));
    }

    #[test]
    fn test_default_toml_parses_and_mentions_required_field() {
        let rendered = Config::default_toml();
        let parsed: Config = toml::from_str(&rendered).expect("default TOML must parse");
        // The template leaves pay_to empty so validation forces the operator
        // to fill it in.
        assert!(parsed.validate().is_err());
        assert!(rendered.contains("pay_to"));
        // The template spells out the key form per_endpoint limits match
        // against, since the server always reconstructs http:// URLs.
        assert!(rendered.contains(r#"per_endpoint."http://"#));
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn test_validate_accepts_minimal_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_pay_to() {
        let config = Config::default();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { .. }));
    }

    #[test]
    fn test_validate_rejects_unsupported_network() {
        let mut config = valid_config();
        config.settlement.network = "mars".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedNetwork { .. }));
    }

    #[test]
    fn test_validate_rejects_negative_price() {
        let mut config = valid_config();
        config.server.price_usd = -0.5;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAmount { .. }));
    }

    #[test]
    fn test_validate_rejects_duplicate_group_names() {
        let mut config = valid_config();
        config.policy_groups.push(PolicyGroup::new("daily"));
        config.policy_groups.push(PolicyGroup::new("daily"));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_validate_rejects_empty_group_name() {
        let mut config = valid_config();
        config.policy_groups.push(PolicyGroup::new(""));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_rate_window() {
        let mut config = valid_config();
        config
            .policy_groups
            .push(PolicyGroup::new("burst").with_rate_limits(RateLimitConfig::new(10, 0)));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_negative_limit_amount() {
        let mut config = valid_config();
        config.policy_groups.push(
            PolicyGroup::new("bad").with_outgoing_limits(
                LimitsConfig::new().with_global(Limit::new().with_max_total_usd(-10.0)),
            ),
        );
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAmount { .. }));
    }

    #[test]
    fn test_block_and_allow_lists_may_overlap() {
        // Block precedence is enforced at evaluation time; an identifier in
        // both lists is a valid (if redundant) configuration.
        let mut config = valid_config();
        config.policy_groups.push(
            PolicyGroup::new("overlap")
                .with_allowed_recipients(vec!["svc.example.com".to_string()])
                .with_blocked_recipients(vec!["svc.example.com".to_string()]),
        );
        assert!(config.validate().is_ok());
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[test]
    fn test_direction_accessors() {
        let group = PolicyGroup::new("g")
            .with_allowed_recipients(vec!["a".to_string()])
            .with_blocked_senders(vec!["b".to_string()])
            .with_outgoing_limits(LimitsConfig::new().with_global(Limit::new()));

        assert_eq!(group.allow_list(Direction::Outgoing), ["a".to_string()]);
        assert_eq!(group.block_list(Direction::Incoming), ["b".to_string()]);
        assert!(group.limits(Direction::Outgoing).is_some());
        assert!(group.limits(Direction::Incoming).is_none());
    }

    #[test]
    fn test_limit_conversions() {
        let limit = Limit::new()
            .with_max_payment_usd(5.0)
            .with_max_total_usd(10.5)
            .with_window_ms(1000);
        assert_eq!(limit.max_payment().unwrap().micros(), 5_000_000);
        assert_eq!(limit.max_total().unwrap().micros(), 10_500_000);
        assert_eq!(limit.window_ms, Some(1000));
    }

    #[test]
    fn test_server_price_conversion() {
        let server = ServerConfig {
            price_usd: 0.01,
            ..ServerConfig::default()
        };
        assert_eq!(server.price().micros(), 10_000);
    }
}

//! Scope resolution for spending limits.
//!
//! A limits configuration carries up to three tiers of limits: per-endpoint
//! (keyed by full resource URL), per-counterparty (keyed by address or
//! domain), and a global catch-all. For each transfer exactly one tier
//! applies: the most specific one that matches. A more specific limit
//! shadows a looser general limit entirely rather than stacking with it.

use paygate_core::config::{Limit, LimitsConfig};
use paygate_core::types::TransferRequest;
use std::fmt;
use url::Url;

/// The resolved scope a spending limit applies to.
///
/// Doubles as the ledger bucketing key: totals are accumulated per scope,
/// so a per-counterparty limit and the global limit never share a running
/// total.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// The catch-all scope.
    Global,
    /// A specific counterparty, identified by address or domain.
    Counterparty(String),
    /// A specific resource URL.
    Endpoint(String),
}

impl Scope {
    /// Returns the ledger key for this scope.
    ///
    /// The literal `"global"` is reserved for the catch-all scope.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Global => "global",
            Self::Counterparty(id) | Self::Endpoint(id) => id,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::Counterparty(id) => write!(f, "counterparty {id}"),
            Self::Endpoint(url) => write!(f, "endpoint {url}"),
        }
    }
}

/// Resolves the most specific limit in `limits` matching `request`.
///
/// Tiers, most specific first:
///
/// 1. `per_endpoint` keyed by the full request URL
/// 2. `per_counterparty` keyed by the counterparty address
/// 3. `per_counterparty` keyed by the counterparty domain
/// 4. `global`
///
/// Key matching is ASCII case-insensitive. Returns `None` when no tier
/// matches (an empty limits table constrains nothing).
#[must_use]
pub fn find_most_specific_limit(
    limits: &LimitsConfig,
    request: &TransferRequest,
) -> Option<(Scope, Limit)> {
    if let Some(url) = &request.request_url {
        if let Some((key, limit)) = lookup(&limits.per_endpoint, url) {
            return Some((Scope::Endpoint(key), limit));
        }
    }
    if let Some(counterparty) = &request.counterparty {
        if let Some((key, limit)) = lookup(&limits.per_counterparty, counterparty) {
            return Some((Scope::Counterparty(key), limit));
        }
    }
    if let Some(domain) = &request.domain {
        if let Some((key, limit)) = lookup(&limits.per_counterparty, domain) {
            return Some((Scope::Counterparty(key), limit));
        }
    }
    limits.global.map(|limit| (Scope::Global, limit))
}

/// Case-insensitive map lookup returning the configured key spelling.
fn lookup(
    map: &std::collections::HashMap<String, Limit>,
    wanted: &str,
) -> Option<(String, Limit)> {
    map.iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(wanted))
        .map(|(key, limit)| (key.clone(), *limit))
}

/// Derives the counterparty domain from request headers.
///
/// The `Origin` header wins when both are present and parseable; `Referer`
/// is the fallback. Returns the lowercased host, or `None` when neither
/// header yields one.
#[must_use]
pub fn resolve_domain(origin: Option<&str>, referer: Option<&str>) -> Option<String> {
    origin
        .and_then(host_of)
        .or_else(|| referer.and_then(host_of))
}

fn host_of(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    url.host_str().map(str::to_ascii_lowercase)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn limit(usd: f64) -> Limit {
        Limit::new().with_max_payment_usd(usd)
    }

    // =========================================================================
    // find_most_specific_limit
    // =========================================================================

    #[test]
    fn test_endpoint_beats_counterparty_and_global() {
        let limits = LimitsConfig::new()
            .with_global(limit(1.0))
            .with_counterparty_limit("svc.example.com", limit(2.0))
            .with_endpoint_limit("https://svc.example.com/reports/weather", limit(3.0));

        let request = TransferRequest::outgoing(paygate_core::MicroUsd::from_micros(1))
            .with_counterparty("svc.example.com")
            .with_request_url("https://svc.example.com/reports/weather");

        let (scope, resolved) = find_most_specific_limit(&limits, &request).unwrap();
        assert_eq!(
            scope,
            Scope::Endpoint("https://svc.example.com/reports/weather".to_string())
        );
        assert_eq!(resolved.max_payment_usd, Some(3.0));
    }

    #[test]
    fn test_counterparty_address_beats_domain() {
        let limits = LimitsConfig::new()
            .with_counterparty_limit("0xABC", limit(2.0))
            .with_counterparty_limit("svc.example.com", limit(4.0));

        let request = TransferRequest::outgoing(paygate_core::MicroUsd::from_micros(1))
            .with_counterparty("0xABC")
            .with_domain("svc.example.com");

        let (scope, resolved) = find_most_specific_limit(&limits, &request).unwrap();
        assert_eq!(scope, Scope::Counterparty("0xABC".to_string()));
        assert_eq!(resolved.max_payment_usd, Some(2.0));
    }

    #[test]
    fn test_domain_matches_counterparty_tier() {
        let limits = LimitsConfig::new()
            .with_global(limit(1.0))
            .with_counterparty_limit("svc.example.com", limit(5.0));

        let request = TransferRequest::incoming(paygate_core::MicroUsd::from_micros(1))
            .with_domain("svc.example.com");

        let (scope, resolved) = find_most_specific_limit(&limits, &request).unwrap();
        assert_eq!(scope, Scope::Counterparty("svc.example.com".to_string()));
        assert_eq!(resolved.max_payment_usd, Some(5.0));
    }

    #[test]
    fn test_falls_back_to_global() {
        let limits = LimitsConfig::new()
            .with_global(limit(1.0))
            .with_counterparty_limit("other.example.com", limit(5.0));

        let request = TransferRequest::outgoing(paygate_core::MicroUsd::from_micros(1))
            .with_counterparty("svc.example.com");

        let (scope, _) = find_most_specific_limit(&limits, &request).unwrap();
        assert_eq!(scope, Scope::Global);
    }

    #[test]
    fn test_empty_limits_match_nothing() {
        let request = TransferRequest::outgoing(paygate_core::MicroUsd::from_micros(1))
            .with_counterparty("svc.example.com");
        assert!(find_most_specific_limit(&LimitsConfig::new(), &request).is_none());
    }

    #[test]
    fn test_lookup_is_case_insensitive_and_keeps_configured_spelling() {
        let limits = LimitsConfig::new().with_counterparty_limit("Svc.Example.Com", limit(2.0));

        let request = TransferRequest::outgoing(paygate_core::MicroUsd::from_micros(1))
            .with_counterparty("svc.example.com");

        let (scope, _) = find_most_specific_limit(&limits, &request).unwrap();
        assert_eq!(scope.key(), "Svc.Example.Com");
    }

    // =========================================================================
    // resolve_domain
    // =========================================================================

    #[test]
    fn test_origin_wins_over_referer() {
        let domain = resolve_domain(
            Some("https://agent.example.org"),
            Some("https://other.example.net/page"),
        );
        assert_eq!(domain.as_deref(), Some("agent.example.org"));
    }

    #[test]
    fn test_referer_used_when_origin_missing() {
        let domain = resolve_domain(None, Some("https://other.example.net/page?x=1"));
        assert_eq!(domain.as_deref(), Some("other.example.net"));
    }

    #[test]
    fn test_unparseable_origin_falls_back_to_referer() {
        let domain = resolve_domain(Some("not a url"), Some("https://fallback.example.com"));
        assert_eq!(domain.as_deref(), Some("fallback.example.com"));
    }

    #[test]
    fn test_no_headers_yields_none() {
        assert_eq!(resolve_domain(None, None), None);
    }

    #[test]
    fn test_host_is_lowercased() {
        let domain = resolve_domain(Some("https://AGENT.Example.ORG:8443/path"), None);
        assert_eq!(domain.as_deref(), Some("agent.example.org"));
    }

    // =========================================================================
    // Scope
    // =========================================================================

    #[test]
    fn test_scope_keys() {
        assert_eq!(Scope::Global.key(), "global");
        assert_eq!(Scope::Counterparty("0xABC".to_string()).key(), "0xABC");
        assert_eq!(
            Scope::Endpoint("https://a.example/b".to_string()).key(),
            "https://a.example/b"
        );
    }

    #[test]
    fn test_scope_display() {
        assert_eq!(Scope::Global.to_string(), "global");
        assert_eq!(
            Scope::Counterparty("0xABC".to_string()).to_string(),
            "counterparty 0xABC"
        );
    }
}

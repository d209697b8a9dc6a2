//! Fuzz target for policy evaluation.
//!
//! This fuzz target exercises the policy engine with arbitrary inputs to find
//! potential panics, logic errors, or unexpected behavior in policy
//! evaluation.
//!
//! # Running
//!
//! ```bash
//! cargo +nightly fuzz run policy_engine
//! ```
//!
//! # Security considerations
//!
//! The policy engine is the admission gate for real money. Fuzzing helps
//! ensure:
//! - No panics on unusual group configurations
//! - No crashes on unexpected transfer identifiers
//! - Recording after an allow never corrupts later evaluations

#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;
use paygate_core::config::{Limit, LimitsConfig, PolicyGroup, RateLimitConfig};
use paygate_core::types::{MicroUsd, TransferRequest};
use paygate_policy::clock::ManualClock;
use paygate_policy::engine::PolicyEvaluator;
use paygate_policy::ledger::SpendingLedger;
use paygate_policy::ratelimit::RateLimiter;
use paygate_policy::store::MemoryStore;
use std::sync::Arc;

/// Fuzz input representing a policy evaluation request.
///
/// Using `Arbitrary` allows the fuzzer to generate structured inputs
/// that are more likely to exercise interesting code paths.
#[derive(Debug, Arbitrary)]
struct PolicyFuzzInput {
    /// Transfer amount in base units.
    amount: u64,
    /// Whether the transfer is outgoing or incoming.
    outgoing: bool,
    /// Counterparty (indices into a predefined list, or arbitrary text).
    counterparty: Option<Identifier>,
    /// Sender domain.
    domain: Option<Identifier>,
    /// Resource URL.
    request_url: Option<String>,
    /// Allow list entries (indices into the predefined list).
    allow_indices: Vec<u8>,
    /// Block list entries (indices into the predefined list).
    block_indices: Vec<u8>,
    /// Per-payment cap in whole dollars, if any.
    max_payment: Option<u16>,
    /// Windowed total cap in whole dollars, if any.
    max_total: Option<u16>,
    /// Window length in milliseconds.
    window_ms: u32,
    /// Rate limit, if any: (max payments, window ms).
    rate_limit: Option<(u8, u32)>,
    /// Scoped limit for the first predefined counterparty.
    scoped_max_payment: Option<u16>,
    /// How many times to evaluate-and-record before the final check.
    rounds: u8,
    /// Clock advance between rounds.
    advance_ms: u32,
}

/// Either a well-known identifier or arbitrary text.
#[derive(Debug, Arbitrary)]
enum Identifier {
    Known(u8),
    Raw(String),
}

/// Predefined identifiers so allow/block lists sometimes actually match.
const PREDEFINED_IDENTIFIERS: [&str; 8] = [
    "svc.example.com",
    "api.example.org",
    "agent.example.net",
    "bad.example.com",
    "0x0000000000000000000000000000000000000001",
    "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
    "SVC.EXAMPLE.COM",
    "",
];

fn resolve(id: &Identifier) -> String {
    match id {
        Identifier::Known(i) => {
            PREDEFINED_IDENTIFIERS[(*i as usize) % PREDEFINED_IDENTIFIERS.len()].to_string()
        }
        Identifier::Raw(s) => s.clone(),
    }
}

fuzz_target!(|data: &[u8]| {
    // Try to parse structured input from fuzzer
    let mut unstructured = Unstructured::new(data);
    let Ok(input) = PolicyFuzzInput::arbitrary(&mut unstructured) else {
        return;
    };

    // Build a policy group from fuzz input
    let pick = |indices: &[u8]| -> Vec<String> {
        indices
            .iter()
            .take(8)
            .map(|&i| PREDEFINED_IDENTIFIERS[(i as usize) % PREDEFINED_IDENTIFIERS.len()].to_string())
            .collect()
    };

    let mut limit = Limit::new();
    if let Some(cap) = input.max_payment {
        limit = limit.with_max_payment_usd(f64::from(cap));
    }
    if let Some(cap) = input.max_total {
        limit = limit
            .with_max_total_usd(f64::from(cap))
            .with_window_ms(u64::from(input.window_ms));
    }

    let mut limits = LimitsConfig::new().with_global(limit);
    if let Some(cap) = input.scoped_max_payment {
        limits = limits.with_counterparty_limit(
            PREDEFINED_IDENTIFIERS[0],
            Limit::new().with_max_payment_usd(f64::from(cap)),
        );
    }

    let mut group = PolicyGroup::new("fuzz");
    group = if input.outgoing {
        group
            .with_outgoing_limits(limits)
            .with_allowed_recipients(pick(&input.allow_indices))
            .with_blocked_recipients(pick(&input.block_indices))
    } else {
        group
            .with_incoming_limits(limits)
            .with_allowed_senders(pick(&input.allow_indices))
            .with_blocked_senders(pick(&input.block_indices))
    };
    if let Some((max, window)) = input.rate_limit {
        group = group.with_rate_limits(RateLimitConfig::new(u32::from(max), u64::from(window)));
    }

    let clock = Arc::new(ManualClock::new(1_000_000));
    let ledger = SpendingLedger::new(Arc::new(MemoryStore::new()), clock.clone());
    let rate_limiter = RateLimiter::new(clock.clone());
    let evaluator = PolicyEvaluator::new(vec![group], ledger, rate_limiter);

    // Build the transfer from fuzz input
    let amount = MicroUsd::from_micros(input.amount);
    let mut request = if input.outgoing {
        TransferRequest::outgoing(amount)
    } else {
        TransferRequest::incoming(amount)
    };
    if let Some(counterparty) = &input.counterparty {
        request = request.with_counterparty(resolve(counterparty));
    }
    if let Some(domain) = &input.domain {
        request = request.with_domain(resolve(domain));
    }
    if let Some(url) = &input.request_url {
        request = request.with_request_url(url.clone());
    }

    // Evaluate-and-record repeatedly - this should never panic, and a
    // memory-backed store should never error.
    for _ in 0..input.rounds.min(8) {
        let verdict = evaluator.evaluate(&request).expect("memory store");
        let _ = verdict.is_allowed();
        let _ = verdict.is_denied();
        if verdict.is_allowed() {
            evaluator.record_settlement(&request);
        }
        clock.advance(u64::from(input.advance_ms));
    }

    let _ = evaluator.evaluate(&request).expect("memory store");
});

//! Settlement collaborator boundary.
//!
//! The gateway never verifies payment proofs itself; it hands the proposed
//! amount to a facilitator and learns only two things back: who paid and how
//! much actually settled. Everything else about the payment rail stays on
//! the other side of this trait.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use paygate_core::config::SettlementConfig;
use paygate_core::error::SettleError;
use paygate_core::types::MicroUsd;
use serde::{Deserialize, Serialize};

/// Response header carrying the base64-encoded settlement confirmation.
pub const SETTLEMENT_RESPONSE_HEADER: &str = "x-settlement-response";

/// What a completed settlement reveals to the policy layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementResult {
    /// Address of the payer, if the facilitator identified one.
    pub payer: Option<String>,

    /// Amount that actually settled, in base units.
    pub amount: MicroUsd,
}

/// Executes settlements against a payment facilitator.
#[async_trait]
pub trait Settler: Send + Sync {
    /// Settle a payment of `amount` and report the payer and realized
    /// amount.
    ///
    /// # Errors
    ///
    /// Returns [`SettleError::Rejected`] when the facilitator declines the
    /// payment, [`SettleError::Transport`] when it cannot be reached, and
    /// [`SettleError::InvalidResponse`] when its answer cannot be parsed.
    async fn settle(&self, amount: MicroUsd) -> Result<SettlementResult, SettleError>;
}

/// Request body sent to the facilitator's `/settle` endpoint.
#[derive(Debug, Serialize)]
struct SettleRequest<'a> {
    scheme: &'a str,
    network: &'a str,
    pay_to: &'a str,
    amount: MicroUsd,
}

/// Response body from the facilitator's `/settle` endpoint.
#[derive(Debug, Deserialize)]
struct SettleResponse {
    success: bool,
    #[serde(default)]
    payer: Option<String>,
    #[serde(default)]
    amount: Option<MicroUsd>,
    #[serde(default)]
    error: Option<String>,
}

/// HTTP settler talking to an x402-style facilitator.
#[derive(Debug, Clone)]
pub struct HttpSettler {
    client: reqwest::Client,
    config: SettlementConfig,
}

impl HttpSettler {
    /// Creates a settler for the facilitator named in `config`.
    #[must_use]
    pub fn new(config: SettlementConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn settle_url(&self) -> String {
        format!(
            "{}/settle",
            self.config.facilitator_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl Settler for HttpSettler {
    async fn settle(&self, amount: MicroUsd) -> Result<SettlementResult, SettleError> {
        let body = SettleRequest {
            scheme: &self.config.scheme,
            network: &self.config.network,
            pay_to: &self.config.pay_to,
            amount,
        };

        let response = self
            .client
            .post(self.settle_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| SettleError::transport(e.to_string()))?;

        let status = response.status();
        let parsed: SettleResponse = response
            .json()
            .await
            .map_err(|e| SettleError::invalid_response(format!("status {status}: {e}")))?;

        if !parsed.success {
            return Err(SettleError::rejected(
                parsed
                    .error
                    .unwrap_or_else(|| format!("facilitator declined (status {status})")),
            ));
        }

        Ok(SettlementResult {
            payer: parsed.payer,
            // A facilitator that omits the realized amount settled exactly
            // what was asked.
            amount: parsed.amount.unwrap_or(amount),
        })
    }
}

/// Scripted settler for tests: always answers the same way and counts calls.
#[derive(Debug)]
pub struct FixedSettler {
    outcome: FixedOutcome,
    calls: AtomicUsize,
}

#[derive(Debug, Clone)]
enum FixedOutcome {
    Accept { payer: Option<String> },
    Reject { reason: String },
    Unreachable,
}

impl FixedSettler {
    /// A settler that accepts every payment, attributing it to `payer`.
    #[must_use]
    pub fn accepting(payer: impl Into<String>) -> Self {
        Self {
            outcome: FixedOutcome::Accept {
                payer: Some(payer.into()),
            },
            calls: AtomicUsize::new(0),
        }
    }

    /// A settler that accepts every payment without identifying the payer.
    #[must_use]
    pub const fn accepting_anonymous() -> Self {
        Self {
            outcome: FixedOutcome::Accept { payer: None },
            calls: AtomicUsize::new(0),
        }
    }

    /// A settler that rejects every payment with `reason`.
    #[must_use]
    pub fn rejecting(reason: impl Into<String>) -> Self {
        Self {
            outcome: FixedOutcome::Reject {
                reason: reason.into(),
            },
            calls: AtomicUsize::new(0),
        }
    }

    /// A settler that fails with a transport error, as if the facilitator
    /// were down.
    #[must_use]
    pub const fn unreachable() -> Self {
        Self {
            outcome: FixedOutcome::Unreachable,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of settle calls received so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Settler for FixedSettler {
    async fn settle(&self, amount: MicroUsd) -> Result<SettlementResult, SettleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            FixedOutcome::Accept { payer } => Ok(SettlementResult {
                payer: payer.clone(),
                amount,
            }),
            FixedOutcome::Reject { reason } => Err(SettleError::rejected(reason.clone())),
            FixedOutcome::Unreachable => Err(SettleError::transport("connection refused")),
        }
    }
}

/// Encodes a settlement result as the base64 JSON header value.
#[must_use]
pub fn encode_receipt(result: &SettlementResult) -> String {
    // SettlementResult always serializes: two plain fields, no maps.
    let json = serde_json::to_string(result).unwrap_or_default();
    BASE64.encode(json)
}

/// Decodes a settlement confirmation header value.
///
/// Anything that fails to decode or parse degrades to `None`; a garbled
/// confirmation means "no payer information", never a failed request.
#[must_use]
pub fn decode_receipt(header_value: &str) -> Option<SettlementResult> {
    let bytes = BASE64.decode(header_value).ok()?;
    serde_json::from_slice(&bytes).ok()
}

//! Library facade for host agents.
//!
//! The HTTP paywall covers the incoming direction; agents embedding the
//! gateway as a library drive the outgoing direction through
//! [`PaymentGate`]: ask [`authorize_outgoing`](PaymentGate::authorize_outgoing)
//! before paying, then feed the settled amount back through
//! [`record_outgoing`](PaymentGate::record_outgoing). Both paths share the
//! same evaluator, ledger, and audit log as the server.

use std::sync::Arc;

use paygate_core::config::{Config, LedgerBackend};
use paygate_core::config_loader::expand_path;
use paygate_core::error::{ConfigError, PolicyError, StoreError};
use paygate_core::types::{TransferRequest, Verdict};
use paygate_policy::clock::SystemClock;
use paygate_policy::engine::PolicyEvaluator;
use paygate_policy::ledger::SpendingLedger;
use paygate_policy::ratelimit::RateLimiter;
use paygate_policy::store::{MemoryStore, SpendStore, SqliteStore};
use tracing::info;

use crate::audit::{AuditError, AuditEvent, AuditLogger, AuditOutcome};

/// Errors from constructing a [`PaymentGate`].
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// The configuration is invalid or paths cannot be expanded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The spend store could not be opened.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The audit log could not be initialized.
    #[error("Audit error: {0}")]
    Audit(#[from] AuditError),
}

/// The policy gateway assembled from configuration.
///
/// Cheap to clone; clones share the evaluator, ledger, and audit log.
#[derive(Clone)]
pub struct PaymentGate {
    evaluator: Arc<PolicyEvaluator>,
    audit: Option<Arc<AuditLogger>>,
}

impl PaymentGate {
    /// Assembles the gateway from a validated [`Config`].
    ///
    /// Picks the spend store backend, wires the ledger, rate limiter, and
    /// evaluator, and opens the audit log when enabled.
    ///
    /// # Errors
    ///
    /// Returns [`GateError`] if paths cannot be expanded, the SQLite store
    /// cannot be opened, or the audit key is missing or malformed.
    pub fn from_config(config: &Config) -> Result<Self, GateError> {
        config.validate()?;

        let store: Arc<dyn SpendStore> = match config.ledger.backend {
            LedgerBackend::Memory => Arc::new(MemoryStore::new()),
            LedgerBackend::Sqlite => {
                let db_path = expand_path(&config.ledger.db_path)?;
                if let Some(parent) = db_path.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        ConfigError::io(format!("Failed to create {}", parent.display()), e)
                    })?;
                }
                info!(db_path = %db_path.display(), "opening spend ledger");
                Arc::new(SqliteStore::new(&db_path)?)
            }
        };

        let clock = Arc::new(SystemClock);
        let ledger = SpendingLedger::new(store, clock.clone());
        let rate_limiter = RateLimiter::new(clock);
        let evaluator = Arc::new(PolicyEvaluator::new(
            config.policy_groups.clone(),
            ledger,
            rate_limiter,
        ));

        let audit = if config.audit.enabled {
            let audit_dir = expand_path(&config.audit.directory)?;
            Some(Arc::new(AuditLogger::from_config(&audit_dir)?))
        } else {
            None
        };

        Ok(Self { evaluator, audit })
    }

    /// Builds a gate directly from parts, bypassing configuration.
    #[must_use]
    pub const fn new(evaluator: Arc<PolicyEvaluator>, audit: Option<Arc<AuditLogger>>) -> Self {
        Self { evaluator, audit }
    }

    /// The shared policy evaluator.
    #[must_use]
    pub fn evaluator(&self) -> Arc<PolicyEvaluator> {
        Arc::clone(&self.evaluator)
    }

    /// The shared audit logger, if auditing is enabled.
    #[must_use]
    pub fn audit(&self) -> Option<Arc<AuditLogger>> {
        self.audit.clone()
    }

    /// Asks every policy group whether an outgoing payment may proceed.
    ///
    /// The decision is written to the audit log. Nothing is recorded
    /// against spending totals until [`record_outgoing`](Self::record_outgoing).
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] if a spend-store read fails; callers must
    /// treat that as a denial.
    pub fn authorize_outgoing(&self, request: &TransferRequest) -> Result<Verdict, PolicyError> {
        let verdict = self.evaluator.evaluate(request)?;

        let outcome = match &verdict {
            Verdict::Allowed => AuditOutcome::Allowed,
            Verdict::Denied { group, reason } => AuditOutcome::Denied {
                rule: group.clone(),
                reason: reason.clone(),
            },
        };
        self.audit_event(request, outcome);

        Ok(verdict)
    }

    /// Records a settled outgoing payment into every matching group's ledger.
    pub fn record_outgoing(&self, request: &TransferRequest) {
        self.evaluator.record_settlement(request);
        self.audit_event(request, AuditOutcome::Settled);
    }

    fn audit_event(&self, request: &TransferRequest, outcome: AuditOutcome) {
        if let Some(logger) = &self.audit {
            let event = AuditEvent {
                direction: request.direction,
                counterparty: request.counterparty.clone(),
                domain: request.domain.clone(),
                request_url: request.request_url.clone(),
                amount: request.amount,
                outcome,
            };
            if let Err(e) = logger.log_event(event) {
                tracing::warn!(error = %e, "failed to write audit entry");
            }
        }
    }
}

impl std::fmt::Debug for PaymentGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentGate")
            .field("groups", &self.evaluator.groups().len())
            .field("audit_enabled", &self.audit.is_some())
            .finish_non_exhaustive()
    }
}

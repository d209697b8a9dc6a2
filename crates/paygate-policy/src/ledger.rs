//! The spending ledger: windowed running totals per enforcement scope.
//!
//! The ledger sits between the policy evaluator and a [`SpendStore`]
//! backend. Admission asks it whether a prospective amount fits under a
//! total limit; recording appends the settled amount after the fact.
//!
//! A transfer is admitted exactly when `current + amount <= limit`; a
//! transfer that lands precisely on the limit passes, and a later
//! zero-headroom request is denied.

use crate::clock::Clock;
use crate::store::{LedgerKey, SpendStore};
use paygate_core::config::Limit;
use paygate_core::error::StoreError;
use paygate_core::types::MicroUsd;
use std::sync::Arc;

/// Outcome of a total-limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitCheck {
    /// Whether the prospective amount fits under the limit.
    pub allowed: bool,
    /// Running total in the scope before the prospective amount.
    pub current_total: MicroUsd,
    /// Human-readable denial reason; `None` when allowed.
    pub reason: Option<String>,
}

impl LimitCheck {
    fn allowed(current_total: MicroUsd) -> Self {
        Self {
            allowed: true,
            current_total,
            reason: None,
        }
    }
}

/// Windowed spending totals over a pluggable store.
///
/// Cheap to clone; clones share the store and clock.
#[derive(Clone)]
pub struct SpendingLedger {
    store: Arc<dyn SpendStore>,
    clock: Arc<dyn Clock>,
}

impl SpendingLedger {
    /// Creates a ledger over `store`, reading time from `clock`.
    #[must_use]
    pub fn new(store: Arc<dyn SpendStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Checks whether adding `amount` under `key` stays within the total
    /// limit in `limit`.
    ///
    /// A limit with no `max_total_usd` constrains nothing here (the
    /// per-payment cap is checked statelessly by the evaluator). Expired
    /// entries are pruned from the store as a side effect of windowed
    /// checks; lifetime limits never prune.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store query fails. Callers treat this
    /// as a failed admission (fail closed).
    pub fn check_limit(
        &self,
        key: &LedgerKey,
        limit: &Limit,
        amount: MicroUsd,
    ) -> Result<LimitCheck, StoreError> {
        let Some(max_total) = limit.max_total() else {
            return Ok(LimitCheck::allowed(MicroUsd::ZERO));
        };

        let current = self.windowed_total(key, limit.window_ms, true)?;

        if current.saturating_add(amount) <= max_total {
            return Ok(LimitCheck::allowed(current));
        }

        let window = limit
            .window_ms
            .map_or_else(|| "lifetime".to_string(), |w| format!("{w}ms window"));
        Ok(LimitCheck {
            allowed: false,
            current_total: current,
            reason: Some(format!(
                "total limit exceeded for policy group {group} ({scope} scope, {window}): \
                 current total {current} USD + requested {amount} USD > limit {max_total} USD",
                group = key.group,
                scope = key.scope,
            )),
        })
    }

    /// Records a settled amount under `key` at the current time.
    ///
    /// Zero-amount settlements carry no spending information and are
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store write fails.
    pub fn record(&self, key: &LedgerKey, amount: MicroUsd) -> Result<(), StoreError> {
        if amount.is_zero() {
            return Ok(());
        }
        self.store.append(key, amount, self.clock.now_ms())
    }

    /// Returns the running total under `key` for the given window
    /// (`None` = lifetime). Unwritten keys read as zero.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store query fails.
    pub fn current_total(
        &self,
        key: &LedgerKey,
        window_ms: Option<u64>,
    ) -> Result<MicroUsd, StoreError> {
        self.windowed_total(key, window_ms, false)
    }

    /// Removes all recorded history.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store delete fails.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.clear()
    }

    fn windowed_total(
        &self,
        key: &LedgerKey,
        window_ms: Option<u64>,
        prune: bool,
    ) -> Result<MicroUsd, StoreError> {
        let cutoff = match window_ms {
            Some(window) => {
                let cutoff = self.clock.now_ms().saturating_sub(window);
                // Pruning below the key's own window cutoff can never drop an
                // entry a future query for this key would still count.
                if prune && cutoff > 0 {
                    self.store.prune(key, cutoff)?;
                }
                cutoff
            }
            None => 0,
        };
        Ok(self.store.total_since(key, cutoff)?.unwrap_or(MicroUsd::ZERO))
    }
}

impl std::fmt::Debug for SpendingLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpendingLedger").finish_non_exhaustive()
    }
}

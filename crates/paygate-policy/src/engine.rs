//! Policy evaluation over configured groups.
//!
//! The evaluator walks policy groups in configuration order and runs each
//! group's checks against a transfer: block list, allow list, rate limit,
//! then the scoped spending limits. The first violation denies the transfer
//! and later groups are not consulted. A transfer is allowed only when every
//! group allows it.
//!
//! Store failures during evaluation propagate as errors rather than
//! degrading to an allow: admission fails closed.

use crate::ledger::SpendingLedger;
use crate::ratelimit::RateLimiter;
use crate::scope::find_most_specific_limit;
use crate::store::LedgerKey;
use paygate_core::config::PolicyGroup;
use paygate_core::error::PolicyError;
use paygate_core::types::{TransferRequest, Verdict};
use tracing::{debug, warn};

/// Which rule within a group denied a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialRule {
    /// Counterparty appears on the block list.
    BlockList,
    /// An allow list is configured and the counterparty is not on it.
    AllowList,
    /// The rolling-window attempt cap was reached.
    RateLimit,
    /// A single transfer exceeds the per-payment cap.
    PaymentLimit,
    /// The windowed running total would exceed the cap.
    TotalLimit,
}

impl DenialRule {
    /// Stable rule identifier, used in logs and audit records.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BlockList => "block_list",
            Self::AllowList => "allow_list",
            Self::RateLimit => "rate_limit",
            Self::PaymentLimit => "payment_limit",
            Self::TotalLimit => "total_limit",
        }
    }
}

/// Outcome of evaluating one policy group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupCheckResult {
    /// The group has no objection.
    Allowed,
    /// The group denies the transfer.
    Denied {
        /// Rule that fired.
        rule: DenialRule,
        /// Human-readable reason, naming the group.
        reason: String,
    },
}

/// Evaluates transfers against configured policy groups.
///
/// Cheap to clone; clones share the ledger and rate limiter state.
#[derive(Debug, Clone)]
pub struct PolicyEvaluator {
    groups: Vec<PolicyGroup>,
    ledger: SpendingLedger,
    rate_limiter: RateLimiter,
}

impl PolicyEvaluator {
    /// Creates an evaluator over `groups`, in their configured order.
    #[must_use]
    pub fn new(groups: Vec<PolicyGroup>, ledger: SpendingLedger, rate_limiter: RateLimiter) -> Self {
        Self {
            groups,
            ledger,
            rate_limiter,
        }
    }

    /// The groups this evaluator enforces.
    #[must_use]
    pub fn groups(&self) -> &[PolicyGroup] {
        &self.groups
    }

    /// The ledger this evaluator reads totals from.
    #[must_use]
    pub const fn ledger(&self) -> &SpendingLedger {
        &self.ledger
    }

    /// Evaluates `request` against every group, in configuration order.
    ///
    /// Short-circuits on the first denial. Rate-limit slots consumed by a
    /// transfer that a later spending check denies stay consumed; the
    /// attempt happened.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] if a spend-store query fails. Callers must
    /// treat this as a denial (fail closed), not an allow.
    pub fn evaluate(&self, request: &TransferRequest) -> Result<Verdict, PolicyError> {
        for group in &self.groups {
            match self.check_group(group, request)? {
                GroupCheckResult::Allowed => {}
                GroupCheckResult::Denied { rule, reason } => {
                    debug!(
                        group = %group.name,
                        rule = rule.as_str(),
                        %reason,
                        "transfer denied"
                    );
                    return Ok(Verdict::Denied {
                        group: group.name.clone(),
                        reason,
                    });
                }
            }
        }
        Ok(Verdict::Allowed)
    }

    /// Records a settled transfer in every group's resolved scope.
    ///
    /// Recording happens after value has already moved, so a store failure
    /// here is logged and swallowed (fail open); a later admission will see
    /// a slightly stale total rather than the settlement being refused
    /// retroactively.
    pub fn record_settlement(&self, request: &TransferRequest) {
        for group in &self.groups {
            let Some(limits) = group.limits(request.direction) else {
                continue;
            };
            let Some((scope, _)) = find_most_specific_limit(limits, request) else {
                continue;
            };
            let key = LedgerKey::new(&group.name, scope.key(), request.direction);
            if let Err(error) = self.ledger.record(&key, request.amount) {
                warn!(
                    group = %group.name,
                    scope = %scope,
                    %error,
                    "failed to record settlement in spending ledger"
                );
            }
        }
    }

    /// Runs one group's checks against `request`.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] if the spend store fails.
    pub fn check_group(
        &self,
        group: &PolicyGroup,
        request: &TransferRequest,
    ) -> Result<GroupCheckResult, PolicyError> {
        // Block list wins over everything, including the allow list.
        if let Some(blocked) = match_in_list(group.block_list(request.direction), request) {
            return Ok(GroupCheckResult::Denied {
                rule: DenialRule::BlockList,
                reason: format!("{blocked} is blocked by policy group {}", group.name),
            });
        }

        let allow_list = group.allow_list(request.direction);
        if !allow_list.is_empty() && match_in_list(allow_list, request).is_none() {
            let who = request
                .counterparty
                .as_deref()
                .or(request.domain.as_deref())
                .unwrap_or("unidentified counterparty");
            return Ok(GroupCheckResult::Denied {
                rule: DenialRule::AllowList,
                reason: format!("{who} is not in allowed list for policy group {}", group.name),
            });
        }

        // The rate bucket is keyed by the same scope the spending limits
        // resolve to, falling back to the catch-all.
        let resolved = group
            .limits(request.direction)
            .and_then(|limits| find_most_specific_limit(limits, request));
        let rate_scope = resolved
            .as_ref()
            .map_or("global", |(scope, _)| scope.key())
            .to_string();

        if let Some(rate) = &group.rate_limits {
            if !self
                .rate_limiter
                .check_and_record(&group.name, &rate_scope, rate)
            {
                return Ok(GroupCheckResult::Denied {
                    rule: DenialRule::RateLimit,
                    reason: format!(
                        "rate limit exceeded for policy group {}: more than {} payments in {}ms",
                        group.name, rate.max_payments, rate.window_ms
                    ),
                });
            }
        }

        let Some((scope, limit)) = resolved else {
            return Ok(GroupCheckResult::Allowed);
        };

        if let Some(max_payment) = limit.max_payment() {
            if request.amount > max_payment {
                return Ok(GroupCheckResult::Denied {
                    rule: DenialRule::PaymentLimit,
                    reason: format!(
                        "payment limit exceeded for policy group {group} ({scope}): \
                         requested {amount} USD > limit {max_payment} USD",
                        group = group.name,
                        amount = request.amount,
                    ),
                });
            }
        }

        let key = LedgerKey::new(&group.name, scope.key(), request.direction);
        let check = self.ledger.check_limit(&key, &limit, request.amount)?;
        if !check.allowed {
            return Ok(GroupCheckResult::Denied {
                rule: DenialRule::TotalLimit,
                reason: check
                    .reason
                    .unwrap_or_else(|| format!("total limit exceeded for policy group {}", group.name)),
            });
        }

        Ok(GroupCheckResult::Allowed)
    }
}

/// Finds the first of the request's identifiers present in `list`.
///
/// Matching is ASCII case-insensitive; both the counterparty address and
/// the derived domain are tried.
fn match_in_list(list: &[String], request: &TransferRequest) -> Option<String> {
    [request.counterparty.as_deref(), request.domain.as_deref()]
        .into_iter()
        .flatten()
        .find(|id| list.iter().any(|entry| entry.eq_ignore_ascii_case(id)))
        .map(str::to_string)
}

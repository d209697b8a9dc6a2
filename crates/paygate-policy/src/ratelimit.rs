//! Rolling-window rate limiting on transfer attempts.
//!
//! Counts attempts, not settlements: a transfer that clears the rate check
//! consumes a slot even if a spending check later denies it. Attempts that
//! are themselves rate-denied consume nothing, so a burst cannot lock a
//! scope out past its window.

use crate::clock::Clock;
use dashmap::DashMap;
use paygate_core::config::RateLimitConfig;
use std::collections::VecDeque;
use std::sync::Arc;

/// Bucket identifier: one attempt history per group and scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RateKey {
    group: String,
    scope: String,
}

/// Rolling-window attempt counter.
///
/// Cheap to clone; clones share the underlying buckets.
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<DashMap<RateKey, VecDeque<u64>>>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Creates a rate limiter reading time from `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            buckets: Arc::new(DashMap::new()),
            clock,
        }
    }

    /// Checks the bucket for `group`/`scope` against `config` and, when
    /// under the cap, records this attempt.
    ///
    /// Returns `true` when the attempt is admitted. The prune, check, and
    /// append happen under the bucket's entry lock, so two racing attempts
    /// cannot both take the last slot.
    #[must_use]
    pub fn check_and_record(&self, group: &str, scope: &str, config: &RateLimitConfig) -> bool {
        let key = RateKey {
            group: group.to_string(),
            scope: scope.to_string(),
        };
        let now = self.clock.now_ms();
        let cutoff = now.saturating_sub(config.window_ms);

        let mut bucket = self.buckets.entry(key).or_default();

        while bucket.front().is_some_and(|&ts| ts < cutoff) {
            bucket.pop_front();
        }

        if bucket.len() >= config.max_payments as usize {
            return false;
        }

        bucket.push_back(now);
        true
    }

    /// Number of live attempts in the bucket for `group`/`scope`.
    #[must_use]
    pub fn attempts(&self, group: &str, scope: &str, window_ms: u64) -> usize {
        let key = RateKey {
            group: group.to_string(),
            scope: scope.to_string(),
        };
        let cutoff = self.clock.now_ms().saturating_sub(window_ms);
        self.buckets
            .get(&key)
            .map_or(0, |bucket| bucket.iter().filter(|&&ts| ts >= cutoff).count())
    }

    /// Drops all attempt history.
    pub fn clear(&self) {
        self.buckets.clear();
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("buckets", &self.buckets.len())
            .finish_non_exhaustive()
    }
}

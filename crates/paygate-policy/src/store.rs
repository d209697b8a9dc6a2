//! Spend-history storage backends.
//!
//! The spending ledger appends one entry per settled transfer and asks for
//! windowed totals when admitting new ones. Two backends implement the
//! [`SpendStore`] trait:
//!
//! - [`MemoryStore`]: a sharded in-process map; history is lost on restart
//! - [`SqliteStore`]: `SQLite` persistence with connection pooling via
//!   `r2d2` and LRU caching of totals
//!
//! Both are `Send + Sync` and safe to share across request handlers.

use dashmap::DashMap;
use lru::LruCache;
use paygate_core::error::StoreError;
use paygate_core::types::{Direction, MicroUsd};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default cache capacity (maximum number of ledger keys to cache).
const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Cache TTL in seconds.
const CACHE_TTL_SECS: u64 = 60;

/// Identifies one running total in the ledger.
///
/// Totals are bucketed per policy group, per resolved scope, per direction.
/// The same counterparty therefore accumulates independently under two
/// different groups, and a group's per-counterparty total never bleeds into
/// its global total.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LedgerKey {
    /// Policy group name.
    pub group: String,
    /// Resolved scope key (`"global"`, a counterparty, or a URL).
    pub scope: String,
    /// Transfer direction.
    pub direction: Direction,
}

impl LedgerKey {
    /// Creates a ledger key.
    #[must_use]
    pub fn new(group: impl Into<String>, scope: impl Into<String>, direction: Direction) -> Self {
        Self {
            group: group.into(),
            scope: scope.into(),
            direction,
        }
    }
}

/// A single settled transfer in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpendingEntry {
    /// Settled amount.
    pub amount: MicroUsd,
    /// Settlement time, milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

/// Append-only spend history with windowed total queries.
pub trait SpendStore: Send + Sync {
    /// Appends a settled amount under `key` at `timestamp_ms`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend write fails.
    fn append(&self, key: &LedgerKey, amount: MicroUsd, timestamp_ms: u64)
        -> Result<(), StoreError>;

    /// Sums entries under `key` with `timestamp_ms >= cutoff_ms`.
    ///
    /// Returns `Ok(None)` when nothing was ever recorded under `key`, which
    /// callers treat as a zero total. A cutoff of `0` sums the whole
    /// lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend query fails.
    fn total_since(&self, key: &LedgerKey, cutoff_ms: u64) -> Result<Option<MicroUsd>, StoreError>;

    /// Physically removes entries under `key` older than `cutoff_ms`,
    /// returning how many were removed.
    ///
    /// Safe only at a cutoff no later than every future query's cutoff for
    /// this key; the ledger guarantees that by pruning at the key's own
    /// window.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend delete fails.
    fn prune(&self, key: &LedgerKey, cutoff_ms: u64) -> Result<usize, StoreError>;

    /// Removes all history.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend delete fails.
    fn clear(&self) -> Result<(), StoreError>;
}

// ============================================================================
// MemoryStore
// ============================================================================

/// In-process spend store backed by a sharded concurrent map.
///
/// The default backend. Totals are exact at every instant, but history does
/// not survive a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<LedgerKey, Vec<SpendingEntry>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SpendStore for MemoryStore {
    fn append(
        &self,
        key: &LedgerKey,
        amount: MicroUsd,
        timestamp_ms: u64,
    ) -> Result<(), StoreError> {
        self.entries.entry(key.clone()).or_default().push(SpendingEntry {
            amount,
            timestamp_ms,
        });
        Ok(())
    }

    fn total_since(&self, key: &LedgerKey, cutoff_ms: u64) -> Result<Option<MicroUsd>, StoreError> {
        Ok(self.entries.get(key).map(|entries| {
            entries
                .iter()
                .filter(|e| e.timestamp_ms >= cutoff_ms)
                .fold(MicroUsd::ZERO, |acc, e| acc.saturating_add(e.amount))
        }))
    }

    fn prune(&self, key: &LedgerKey, cutoff_ms: u64) -> Result<usize, StoreError> {
        let Some(mut entries) = self.entries.get_mut(key) else {
            return Ok(0);
        };
        let before = entries.len();
        entries.retain(|e| e.timestamp_ms >= cutoff_ms);
        Ok(before - entries.len())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.entries.clear();
        Ok(())
    }
}

// ============================================================================
// SqliteStore
// ============================================================================

/// Cache entry: the cutoff a total was computed at, the total, and when it
/// was computed.
type CacheEntry = (u64, Option<MicroUsd>, Instant);

/// Spend store backed by `SQLite`.
///
/// History survives restarts. Totals are served from an LRU cache for up to
/// [`CACHE_TTL_SECS`] seconds. A cached total only answers queries at the
/// exact cutoff it was computed for, so lifetime and windowed totals for the
/// same key never contaminate each other; every append invalidates the
/// affected key so new spending is always visible immediately.
///
/// # Thread Safety
///
/// The connection pool handles concurrent database access, and the LRU
/// cache is protected by a mutex.
pub struct SqliteStore {
    /// Connection pool for `SQLite` database access.
    pool: Pool<SqliteConnectionManager>,
    /// LRU cache of total queries, protected by a mutex.
    cache: Mutex<LruCache<LedgerKey, CacheEntry>>,
}

impl SqliteStore {
    /// Opens (or creates) a file-based store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the database cannot be opened or
    /// initialized.
    pub fn new(db_path: &Path) -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::file(db_path);
        Self::from_manager(manager, 10)
    }

    /// Creates an in-memory store, primarily for tests.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the database cannot be initialized.
    pub fn in_memory() -> Result<Self, StoreError> {
        // Every pooled connection to ":memory:" would get its own database,
        // so the in-memory store is pinned to a single connection.
        let manager = SqliteConnectionManager::memory();
        Self::from_manager(manager, 1)
    }

    fn from_manager(manager: SqliteConnectionManager, max_size: u32) -> Result<Self, StoreError> {
        let pool = Pool::builder()
            .max_size(max_size)
            .build(manager)
            .map_err(|e| StoreError::backend(e.to_string()))?;

        let store = Self {
            pool,
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(DEFAULT_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            )),
        };

        store.init_schema()?;
        Ok(store)
    }

    /// Gets a connection from the pool.
    fn get_conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StoreError> {
        self.pool
            .get()
            .map_err(|e| StoreError::backend(e.to_string()))
    }

    /// Initializes the database schema.
    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.get_conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS spend_ledger (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                group_name TEXT NOT NULL,
                scope TEXT NOT NULL,
                direction TEXT NOT NULL,
                amount_micros INTEGER NOT NULL,
                timestamp_ms INTEGER NOT NULL
            )",
            [],
        )
        .map_err(|e| StoreError::backend(e.to_string()))?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_key_timestamp
             ON spend_ledger(group_name, scope, direction, timestamp_ms)",
            [],
        )
        .map_err(|e| StoreError::backend(e.to_string()))?;

        Ok(())
    }

    /// Invalidates the cached total for `key`.
    fn invalidate(&self, key: &LedgerKey) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.pop(key);
        }
    }
}

impl SpendStore for SqliteStore {
    fn append(
        &self,
        key: &LedgerKey,
        amount: MicroUsd,
        timestamp_ms: u64,
    ) -> Result<(), StoreError> {
        let conn = self.get_conn()?;

        let amount_micros = i64::try_from(amount.micros())
            .map_err(|_| StoreError::backend("amount exceeds storable range"))?;
        let timestamp = i64::try_from(timestamp_ms)
            .map_err(|_| StoreError::backend("timestamp exceeds storable range"))?;

        conn.execute(
            "INSERT INTO spend_ledger (group_name, scope, direction, amount_micros, timestamp_ms)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                key.group,
                key.scope,
                key.direction.as_str(),
                amount_micros,
                timestamp
            ],
        )
        .map_err(|e| StoreError::backend(e.to_string()))?;

        self.invalidate(key);
        Ok(())
    }

    fn total_since(&self, key: &LedgerKey, cutoff_ms: u64) -> Result<Option<MicroUsd>, StoreError> {
        // Check cache first. A hit requires the same cutoff: a total summed
        // since one cutoff says nothing about a query since another.
        if let Ok(mut cache) = self.cache.lock() {
            if let Some((cached_cutoff, total, computed_at)) = cache.get(key) {
                if *cached_cutoff == cutoff_ms
                    && computed_at.elapsed() < Duration::from_secs(CACHE_TTL_SECS)
                {
                    return Ok(*total);
                }
            }
        }

        // Cache miss or expired, query database
        let conn = self.get_conn()?;
        let cutoff = i64::try_from(cutoff_ms).unwrap_or(i64::MAX);

        let mut stmt = conn
            .prepare(
                "SELECT amount_micros FROM spend_ledger
                 WHERE group_name = ?1 AND scope = ?2 AND direction = ?3
                   AND timestamp_ms >= ?4",
            )
            .map_err(|e| StoreError::backend(e.to_string()))?;

        let amounts = stmt
            .query_map(
                params![key.group, key.scope, key.direction.as_str(), cutoff],
                |row| row.get::<_, i64>(0),
            )
            .map_err(|e| StoreError::backend(e.to_string()))?;

        let mut total = MicroUsd::ZERO;
        let mut any_in_window = false;
        for amount_result in amounts {
            let amount = amount_result.map_err(|e| StoreError::backend(e.to_string()))?;
            let amount = u64::try_from(amount)
                .map_err(|_| StoreError::backend("negative amount in ledger"))?;
            total = total.saturating_add(MicroUsd::from_micros(amount));
            any_in_window = true;
        }

        // An empty window still counts as "written" when the key has older
        // (or pruned-out) history.
        let result = if any_in_window {
            Some(total)
        } else {
            let written: bool = conn
                .query_row(
                    "SELECT EXISTS(
                        SELECT 1 FROM spend_ledger
                        WHERE group_name = ?1 AND scope = ?2 AND direction = ?3
                    )",
                    params![key.group, key.scope, key.direction.as_str()],
                    |row| row.get(0),
                )
                .map_err(|e| StoreError::backend(e.to_string()))?;
            written.then_some(MicroUsd::ZERO)
        };

        // Update cache
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key.clone(), (cutoff_ms, result, Instant::now()));
        }

        Ok(result)
    }

    fn prune(&self, key: &LedgerKey, cutoff_ms: u64) -> Result<usize, StoreError> {
        let conn = self.get_conn()?;
        let cutoff = i64::try_from(cutoff_ms).unwrap_or(i64::MAX);

        let removed = conn
            .execute(
                "DELETE FROM spend_ledger
                 WHERE group_name = ?1 AND scope = ?2 AND direction = ?3
                   AND timestamp_ms < ?4",
                params![key.group, key.scope, key.direction.as_str(), cutoff],
            )
            .map_err(|e| StoreError::backend(e.to_string()))?;

        self.invalidate(key);
        Ok(removed)
    }

    fn clear(&self) -> Result<(), StoreError> {
        let conn = self.get_conn()?;
        conn.execute("DELETE FROM spend_ledger", [])
            .map_err(|e| StoreError::backend(e.to_string()))?;

        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used, clippy::redundant_clone)]

    use super::*;
    use tempfile::tempdir;

    fn usd(micros: u64) -> MicroUsd {
        MicroUsd::from_micros(micros)
    }

    fn key(group: &str, scope: &str) -> LedgerKey {
        LedgerKey::new(group, scope, Direction::Outgoing)
    }

    // =========================================================================
    // MemoryStore
    // =========================================================================

    #[test]
    fn test_memory_append_and_total() {
        let store = MemoryStore::new();
        let k = key("daily", "global");

        store.append(&k, usd(100), 1_000).unwrap();
        store.append(&k, usd(250), 2_000).unwrap();

        let total = store.total_since(&k, 0).unwrap();
        assert_eq!(total, Some(usd(350)));
    }

    #[test]
    fn test_memory_unwritten_key_is_none() {
        let store = MemoryStore::new();
        assert_eq!(store.total_since(&key("daily", "global"), 0).unwrap(), None);
    }

    #[test]
    fn test_memory_cutoff_is_inclusive() {
        let store = MemoryStore::new();
        let k = key("daily", "global");

        store.append(&k, usd(100), 1_000).unwrap();
        store.append(&k, usd(200), 2_000).unwrap();

        assert_eq!(store.total_since(&k, 1_000).unwrap(), Some(usd(300)));
        assert_eq!(store.total_since(&k, 1_001).unwrap(), Some(usd(200)));
        assert_eq!(store.total_since(&k, 2_001).unwrap(), Some(usd(0)));
    }

    #[test]
    fn test_memory_keys_are_independent() {
        let store = MemoryStore::new();
        let a = key("daily", "global");
        let b = key("daily", "svc.example.com");
        let c = LedgerKey::new("daily", "global", Direction::Incoming);

        store.append(&a, usd(100), 1_000).unwrap();

        assert_eq!(store.total_since(&a, 0).unwrap(), Some(usd(100)));
        assert_eq!(store.total_since(&b, 0).unwrap(), None);
        assert_eq!(store.total_since(&c, 0).unwrap(), None);
    }

    #[test]
    fn test_memory_prune() {
        let store = MemoryStore::new();
        let k = key("daily", "global");

        store.append(&k, usd(100), 1_000).unwrap();
        store.append(&k, usd(200), 2_000).unwrap();
        store.append(&k, usd(300), 3_000).unwrap();

        let removed = store.prune(&k, 2_000).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.total_since(&k, 0).unwrap(), Some(usd(500)));

        // A fully pruned key still reads as written.
        let removed = store.prune(&k, 10_000).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.total_since(&k, 0).unwrap(), Some(usd(0)));
    }

    #[test]
    fn test_memory_clear() {
        let store = MemoryStore::new();
        let k = key("daily", "global");
        store.append(&k, usd(100), 1_000).unwrap();

        store.clear().unwrap();
        assert_eq!(store.total_since(&k, 0).unwrap(), None);
    }

    #[test]
    fn test_memory_concurrent_appends() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(MemoryStore::new());
        let mut handles = vec![];

        for _ in 0..10 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    store
                        .append(&key("daily", "global"), usd(1), 1_000)
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(
            store.total_since(&key("daily", "global"), 0).unwrap(),
            Some(usd(1_000))
        );
    }

    // =========================================================================
    // SqliteStore
    // =========================================================================

    #[test]
    fn test_sqlite_append_and_total() {
        let store = SqliteStore::in_memory().unwrap();
        let k = key("daily", "global");

        store.append(&k, usd(100), 1_000).unwrap();
        store.append(&k, usd(250), 2_000).unwrap();

        assert_eq!(store.total_since(&k, 0).unwrap(), Some(usd(350)));
    }

    #[test]
    fn test_sqlite_unwritten_key_is_none() {
        let store = SqliteStore::in_memory().unwrap();
        assert_eq!(store.total_since(&key("daily", "global"), 0).unwrap(), None);
    }

    #[test]
    fn test_sqlite_cache_invalidation_on_append() {
        let store = SqliteStore::in_memory().unwrap();
        let k = key("daily", "global");

        store.append(&k, usd(100), 1_000).unwrap();
        assert_eq!(store.total_since(&k, 0).unwrap(), Some(usd(100)));

        // The cached total must not survive a new append.
        store.append(&k, usd(200), 2_000).unwrap();
        assert_eq!(store.total_since(&k, 0).unwrap(), Some(usd(300)));
    }

    #[test]
    fn test_sqlite_cached_total_is_cutoff_specific() {
        let store = SqliteStore::in_memory().unwrap();
        let k = key("daily", "global");

        store.append(&k, usd(100), 1_000).unwrap();
        store.append(&k, usd(200), 5_000).unwrap();

        // Seed the cache with a windowed total, then ask for the lifetime
        // total: the narrower cached value must not answer it.
        assert_eq!(store.total_since(&k, 5_000).unwrap(), Some(usd(200)));
        assert_eq!(store.total_since(&k, 0).unwrap(), Some(usd(300)));

        // And the other way round.
        assert_eq!(store.total_since(&k, 5_000).unwrap(), Some(usd(200)));
    }

    #[test]
    fn test_sqlite_keys_are_independent() {
        let store = SqliteStore::in_memory().unwrap();
        let a = key("daily", "global");
        let b = key("burst", "global");

        store.append(&a, usd(100), 1_000).unwrap();

        assert_eq!(store.total_since(&a, 0).unwrap(), Some(usd(100)));
        assert_eq!(store.total_since(&b, 0).unwrap(), None);
    }

    #[test]
    fn test_sqlite_prune() {
        let store = SqliteStore::in_memory().unwrap();
        let k = key("daily", "global");

        store.append(&k, usd(100), 1_000).unwrap();
        store.append(&k, usd(200), 2_000).unwrap();

        let removed = store.prune(&k, 2_000).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.total_since(&k, 0).unwrap(), Some(usd(200)));
    }

    #[test]
    fn test_sqlite_persistence() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("spend.db");
        let k = key("daily", "global");

        {
            let store = SqliteStore::new(&db_path).unwrap();
            store.append(&k, usd(500), 1_000).unwrap();
        }

        {
            let store = SqliteStore::new(&db_path).unwrap();
            assert_eq!(store.total_since(&k, 0).unwrap(), Some(usd(500)));
        }
    }

    #[test]
    fn test_sqlite_clear() {
        let store = SqliteStore::in_memory().unwrap();
        let k = key("daily", "global");
        store.append(&k, usd(100), 1_000).unwrap();

        store.clear().unwrap();
        assert_eq!(store.total_since(&k, 0).unwrap(), None);
    }

    #[test]
    fn test_sqlite_concurrent_appends() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let mut handles = vec![];

        for _ in 0..10 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                store
                    .append(&key("daily", "global"), usd(10), 1_000)
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(
            store.total_since(&key("daily", "global"), 0).unwrap(),
            Some(usd(100))
        );
    }
}

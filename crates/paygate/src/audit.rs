//! Tamper-evident audit logging for admission decisions and settlements.
//!
//! Entries are stored in JSONL format and chained with HMAC-SHA256: each
//! entry's HMAC covers its own fields concatenated with the previous entry's
//! HMAC, so any edit to historical entries invalidates every later HMAC.
//! The key lives in a separate file (`audit.key`, 32 raw bytes or 64 hex
//! characters) next to the log directory.
//!
//! The log rotates when it exceeds a size threshold; rotated files are gzip
//! compressed. The chain continues across rotations.
//!
//! ```no_run
//! use paygate::audit::{AuditEvent, AuditLogger, AuditOutcome};
//! use paygate_core::types::{Direction, MicroUsd};
//! use std::path::Path;
//!
//! let key = [0u8; 32]; // use a random key in production
//! let logger = AuditLogger::new(Path::new("/var/log/paygate"), &key)
//!     .expect("audit logger");
//!
//! logger
//!     .log_event(AuditEvent {
//!         direction: Direction::Incoming,
//!         counterparty: Some("0xabc".to_string()),
//!         domain: Some("svc.example.com".to_string()),
//!         request_url: None,
//!         amount: MicroUsd::from_usd(0.01).unwrap(),
//!         outcome: AuditOutcome::Allowed,
//!     })
//!     .expect("log event");
//!
//! assert!(logger.verify_chain().expect("verify").valid);
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::Utc;
use flate2::write::GzEncoder;
use flate2::Compression;
use hmac::{Hmac, Mac};
use paygate_core::types::{Direction, MicroUsd};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Maximum file size before rotation (10 MB).
const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Name of the audit log file.
const AUDIT_LOG_FILENAME: &str = "audit.jsonl";

/// Name of the HMAC key file.
const AUDIT_KEY_FILENAME: &str = "audit.key";

/// Fixed "previous HMAC" for the first entry in a chain.
const INITIAL_HMAC: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// One audit log entry in JSONL form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditEntry {
    /// Monotonically increasing sequence number; gaps mean deleted entries.
    pub seq: u64,

    /// ISO 8601 timestamp when the event occurred.
    pub timestamp: String,

    /// Transfer direction ("incoming" or "outgoing").
    pub direction: String,

    /// Counterparty address, if known at the time of the event.
    pub counterparty: Option<String>,

    /// Counterparty domain, if known.
    pub domain: Option<String>,

    /// Resource URL the event relates to, if any.
    pub request_url: Option<String>,

    /// Amount as a decimal USD string.
    pub amount: String,

    /// Outcome: "allowed", "denied:{rule}:{reason}", or "settled".
    pub outcome: String,

    /// HMAC-SHA256 over this entry's fields and the previous entry's HMAC.
    pub hmac: String,
}

/// Input describing an admission decision or settlement to log.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    /// Transfer direction.
    pub direction: Direction,

    /// Counterparty address, if known.
    pub counterparty: Option<String>,

    /// Counterparty domain, if known.
    pub domain: Option<String>,

    /// Resource URL, if any.
    pub request_url: Option<String>,

    /// Transfer amount.
    pub amount: MicroUsd,

    /// What happened.
    pub outcome: AuditOutcome,
}

/// Outcome of the event being audited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditOutcome {
    /// Admission passed every policy group.
    Allowed,

    /// Admission was denied.
    Denied {
        /// Policy group or rule that produced the denial.
        rule: String,
        /// Human-readable denial reason.
        reason: String,
    },

    /// A settlement completed and was recorded into the ledger.
    Settled,
}

impl AuditOutcome {
    fn as_audit_string(&self) -> String {
        match self {
            Self::Allowed => "allowed".to_string(),
            Self::Denied { rule, reason } => format!("denied:{rule}:{reason}"),
            Self::Settled => "settled".to_string(),
        }
    }
}

/// Result of verifying the HMAC chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyResult {
    /// Whether the entire chain is valid.
    pub valid: bool,

    /// Number of entries successfully verified.
    pub entries_checked: u64,

    /// Sequence number of the first invalid entry, if any.
    pub first_invalid_seq: Option<u64>,

    /// Description of the verification failure, if any.
    pub error_message: Option<String>,
}

impl VerifyResult {
    const fn success(entries_checked: u64) -> Self {
        Self {
            valid: true,
            entries_checked,
            first_invalid_seq: None,
            error_message: None,
        }
    }

    fn failure(entries_checked: u64, first_invalid_seq: u64, message: impl Into<String>) -> Self {
        Self {
            valid: false,
            entries_checked,
            first_invalid_seq: Some(first_invalid_seq),
            error_message: Some(message.into()),
        }
    }
}

/// Errors from audit logging operations.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// I/O error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize or deserialize an entry.
    #[error("Failed to serialize entry: {0}")]
    Serialization(String),

    /// HMAC key file not found or unreadable.
    #[error("Failed to read audit key")]
    KeyNotFound,

    /// Invalid key format or length.
    #[error("Invalid audit key: {0}")]
    InvalidKey(String),

    /// The stored chain failed verification.
    #[error("Chain verification failed at seq {seq}: {message}")]
    ChainBroken {
        /// Sequence number where verification failed.
        seq: u64,
        /// Description of the failure.
        message: String,
    },

    /// Log rotation failed.
    #[error("Log rotation failed: {0}")]
    RotationFailed(String),

    /// Mutex poisoned by a panicking writer.
    #[error("Lock error: {0}")]
    LockError(String),
}

/// Thread-safe audit logger with HMAC chain integrity.
///
/// Sequence numbers advance atomically; the chain head is guarded by a
/// mutex so concurrent writers serialize on HMAC computation.
pub struct AuditLogger {
    log_dir: PathBuf,
    log_path: PathBuf,
    hmac_key: [u8; 32],
    current_seq: AtomicU64,
    last_hmac: Mutex<String>,
    max_file_size: u64,
}

impl AuditLogger {
    /// Create an audit logger writing under `log_dir/logs/`.
    ///
    /// An existing log file is read back to restore the chain state; a
    /// corrupted chain fails construction rather than being silently
    /// extended.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] if the directory cannot be created, the
    /// existing log cannot be read, or its chain is broken.
    pub fn new(log_dir: &Path, hmac_key: &[u8; 32]) -> Result<Self, AuditError> {
        let logs_subdir = log_dir.join("logs");
        fs::create_dir_all(&logs_subdir)?;

        let log_path = logs_subdir.join(AUDIT_LOG_FILENAME);
        let (current_seq, last_hmac) = Self::restore_state(&log_path, hmac_key)?;

        Ok(Self {
            log_dir: logs_subdir,
            log_path,
            hmac_key: *hmac_key,
            current_seq: AtomicU64::new(current_seq),
            last_hmac: Mutex::new(last_hmac),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        })
    }

    /// Create an audit logger reading its key from `base_dir/audit.key`.
    ///
    /// The key file must contain exactly 32 raw bytes or 64 hex characters.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::KeyNotFound`] when the key file is absent and
    /// [`AuditError::InvalidKey`] on a malformed key.
    pub fn from_config(base_dir: &Path) -> Result<Self, AuditError> {
        let key_path = base_dir.join(AUDIT_KEY_FILENAME);

        let key_data = fs::read(&key_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AuditError::KeyNotFound
            } else {
                AuditError::Io(e)
            }
        })?;

        let hmac_key = Self::parse_key(&key_data)?;
        Self::new(base_dir, &hmac_key)
    }

    /// Append an event to the log.
    ///
    /// Stamps the entry with the current time and next sequence number,
    /// chains the HMAC, and flushes the line to disk. Safe to call from
    /// multiple threads.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] if serialization, the write, or a needed
    /// rotation fails.
    #[allow(clippy::significant_drop_tightening)]
    pub fn log_event(&self, event: AuditEvent) -> Result<(), AuditError> {
        // Rotation runs before taking the chain lock to keep the hold short.
        self.rotate_if_needed()?;

        let mut last_hmac_guard = self
            .last_hmac
            .lock()
            .map_err(|e| AuditError::LockError(e.to_string()))?;

        let seq = self.current_seq.fetch_add(1, Ordering::SeqCst);
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();

        let mut entry = AuditEntry {
            seq,
            timestamp,
            direction: event.direction.as_str().to_string(),
            counterparty: event.counterparty,
            domain: event.domain,
            request_url: event.request_url,
            amount: event.amount.to_string(),
            outcome: event.outcome.as_audit_string(),
            hmac: String::new(),
        };

        entry.hmac = compute_hmac(&self.hmac_key, &entry, &last_hmac_guard);

        let json =
            serde_json::to_string(&entry).map_err(|e| AuditError::Serialization(e.to_string()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        writeln!(file, "{json}")?;
        file.flush()?;

        *last_hmac_guard = entry.hmac;
        Ok(())
    }

    /// Verify the HMAC chain over the current log file.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] if the file cannot be read or an entry cannot
    /// be deserialized. A broken chain is reported through the returned
    /// [`VerifyResult`], not as an error.
    pub fn verify_chain(&self) -> Result<VerifyResult, AuditError> {
        if !self.log_path.exists() {
            return Ok(VerifyResult::success(0));
        }

        let file = File::open(&self.log_path)?;
        let reader = BufReader::new(file);

        let mut prev_hmac = INITIAL_HMAC.to_string();
        let mut entries_checked: u64 = 0;
        let mut expected_seq: Option<u64> = None;

        for (line_num, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }

            let entry: AuditEntry = serde_json::from_str(&line)
                .map_err(|e| AuditError::Serialization(format!("Line {}: {}", line_num + 1, e)))?;

            // After rotation the file starts mid-chain, so only consecutive
            // gaps within this file are flagged.
            if let Some(expected) = expected_seq {
                if entry.seq != expected {
                    return Ok(VerifyResult::failure(
                        entries_checked,
                        entry.seq,
                        format!("Sequence mismatch: expected {expected}, got {}", entry.seq),
                    ));
                }
            }

            if entries_checked > 0 {
                let expected_hmac = compute_hmac(&self.hmac_key, &entry, &prev_hmac);
                if entry.hmac != expected_hmac {
                    return Ok(VerifyResult::failure(
                        entries_checked,
                        entry.seq,
                        "HMAC mismatch: entry may have been tampered with",
                    ));
                }
            } else {
                // The first entry in the file chains either to INITIAL_HMAC
                // (fresh log) or to an entry that was rotated away; with only
                // this file available its own HMAC is taken on trust and the
                // chain is verified from here forward.
                let from_initial = compute_hmac(&self.hmac_key, &entry, INITIAL_HMAC);
                if entry.seq == 0 && entry.hmac != from_initial {
                    return Ok(VerifyResult::failure(
                        entries_checked,
                        entry.seq,
                        "HMAC mismatch: entry may have been tampered with",
                    ));
                }
            }

            prev_hmac = entry.hmac;
            entries_checked += 1;
            expected_seq = Some(entry.seq + 1);
        }

        Ok(VerifyResult::success(entries_checked))
    }

    /// Set the maximum file size before rotation.
    #[must_use]
    pub const fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    /// Restore sequence and chain head from an existing log file.
    fn restore_state(log_path: &Path, hmac_key: &[u8; 32]) -> Result<(u64, String), AuditError> {
        if !log_path.exists() {
            return Ok((0, INITIAL_HMAC.to_string()));
        }

        let file = File::open(log_path)?;
        let reader = BufReader::new(file);

        let mut last_seq: u64 = 0;
        let mut last_hmac = INITIAL_HMAC.to_string();
        let mut prev_hmac = INITIAL_HMAC.to_string();
        let mut found_entries = false;

        for line_result in reader.lines() {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }

            let entry: AuditEntry = serde_json::from_str(&line)
                .map_err(|e| AuditError::Serialization(e.to_string()))?;

            // Only entries past the first in this file can be checked; the
            // first may chain to a rotated-away predecessor.
            if found_entries || entry.seq == 0 {
                let expected_hmac = compute_hmac(hmac_key, &entry, &prev_hmac);
                if entry.hmac != expected_hmac {
                    return Err(AuditError::ChainBroken {
                        seq: entry.seq,
                        message: "HMAC verification failed during state restore".to_string(),
                    });
                }
            }

            last_seq = entry.seq;
            last_hmac.clone_from(&entry.hmac);
            prev_hmac = entry.hmac;
            found_entries = true;
        }

        if found_entries {
            Ok((last_seq + 1, last_hmac))
        } else {
            Ok((0, INITIAL_HMAC.to_string()))
        }
    }

    /// Parse an HMAC key from raw bytes or a hex string.
    fn parse_key(data: &[u8]) -> Result<[u8; 32], AuditError> {
        if data.len() == 32 {
            let mut key = [0u8; 32];
            key.copy_from_slice(data);
            return Ok(key);
        }

        let hex_str = String::from_utf8_lossy(data);
        let hex_str = hex_str.trim();

        if hex_str.len() == 64 {
            let bytes = hex::decode(hex_str)
                .map_err(|e| AuditError::InvalidKey(format!("Invalid hex: {e}")))?;
            if bytes.len() == 32 {
                let mut key = [0u8; 32];
                key.copy_from_slice(&bytes);
                return Ok(key);
            }
        }

        Err(AuditError::InvalidKey(format!(
            "Key must be 32 bytes or 64 hex characters, got {} bytes",
            data.len()
        )))
    }

    /// Rotate and gzip the log file once it exceeds the size threshold.
    fn rotate_if_needed(&self) -> Result<(), AuditError> {
        let metadata = match fs::metadata(&self.log_path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(AuditError::Io(e)),
        };

        if metadata.len() < self.max_file_size {
            return Ok(());
        }

        let mut rotation_num = 1;
        loop {
            let candidate = self
                .log_dir
                .join(format!("{AUDIT_LOG_FILENAME}.{rotation_num}.gz"));
            if !candidate.exists() {
                break;
            }
            rotation_num += 1;
        }

        let rotated_path = self
            .log_dir
            .join(format!("{AUDIT_LOG_FILENAME}.{rotation_num}.gz"));

        let content = fs::read(&self.log_path)
            .map_err(|e| AuditError::RotationFailed(format!("Failed to read log: {e}")))?;

        let gz_file = File::create(&rotated_path)
            .map_err(|e| AuditError::RotationFailed(format!("Failed to create gz file: {e}")))?;
        let mut encoder = GzEncoder::new(BufWriter::new(gz_file), Compression::default());
        encoder
            .write_all(&content)
            .map_err(|e| AuditError::RotationFailed(format!("Failed to write gz: {e}")))?;
        encoder
            .finish()
            .map_err(|e| AuditError::RotationFailed(format!("Failed to finish gz: {e}")))?;

        // Truncate rather than delete: the HMAC chain continues in place.
        File::create(&self.log_path)
            .map_err(|e| AuditError::RotationFailed(format!("Failed to truncate log: {e}")))?;

        tracing::info!(rotated_to = %rotated_path.display(), "Audit log rotated");
        Ok(())
    }
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger")
            .field("log_path", &self.log_path)
            .field("current_seq", &self.current_seq.load(Ordering::Relaxed))
            .field("max_file_size", &self.max_file_size)
            .finish_non_exhaustive()
    }
}

/// Canonical HMAC over an entry's fields joined with `||` plus the previous
/// HMAC.
fn compute_hmac(key: &[u8; 32], entry: &AuditEntry, prev_hmac: &str) -> String {
    let data = format!(
        "{}||{}||{}||{}||{}||{}||{}||{}||{}",
        entry.seq,
        entry.timestamp,
        entry.direction,
        entry.counterparty.as_deref().unwrap_or(""),
        entry.domain.as_deref().unwrap_or(""),
        entry.request_url.as_deref().unwrap_or(""),
        entry.amount,
        entry.outcome,
        prev_hmac
    );

    // HMAC-SHA256 accepts keys of any length, so new_from_slice cannot fail
    // for a 32-byte key.
    let mut mac = HmacSha256::new_from_slice(key)
        .unwrap_or_else(|_| unreachable!("HMAC-SHA256 accepts any key length"));
    mac.update(data.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

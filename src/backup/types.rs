// Backup System Types - records, expirations and operation reports

use crate::store::KeySnapshot;
use crate::{BackupError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `PTTL` reply for a key without expiry
pub const PTTL_NO_EXPIRY: i64 = -1;

/// `PTTL` reply for a key that does not exist
pub const PTTL_KEY_MISSING: i64 = -2;

/// Expiration state of a key, as reported by `PTTL`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Key has no expiry
    Persistent,
    /// Key did not exist when the TTL was read
    Missing,
    /// Key expires after this many milliseconds
    ExpiresIn(u64),
}

impl Ttl {
    /// Interpret a raw `PTTL` reply. Negative values other than the two
    /// sentinels are treated as no expiry.
    pub fn from_pttl(raw: i64) -> Self {
        match raw {
            PTTL_KEY_MISSING => Ttl::Missing,
            ms if ms >= 0 => Ttl::ExpiresIn(ms as u64),
            _ => Ttl::Persistent,
        }
    }

    /// The raw `PTTL` value this state was read from
    pub fn as_pttl(self) -> i64 {
        match self {
            Ttl::Persistent => PTTL_NO_EXPIRY,
            Ttl::Missing => PTTL_KEY_MISSING,
            Ttl::ExpiresIn(ms) => ms.min(i64::MAX as u64) as i64,
        }
    }

    /// TTL argument for `RESTORE`: `0` for a persistent key, otherwise the
    /// stored lifetime counted from the moment of restore.
    pub fn restore_millis(self) -> u64 {
        match self {
            Ttl::ExpiresIn(ms) => ms,
            Ttl::Persistent | Ttl::Missing => 0,
        }
    }
}

/// One key in a backup file: base64 dump payload plus raw `PTTL`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    /// Standard base64 of the `DUMP` payload
    pub value: String,
    /// Raw `PTTL` at capture time
    #[serde(default)]
    pub ttl: i64,
}

impl BackupRecord {
    /// Encode a captured snapshot
    pub fn from_snapshot(snapshot: &KeySnapshot) -> Self {
        Self {
            value: STANDARD.encode(&snapshot.payload),
            ttl: snapshot.pttl,
        }
    }

    /// Decode the dump payload
    pub fn payload(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(self.value.as_bytes())
            .map_err(|e| BackupError::Parse(format!("Invalid base64 payload: {}", e)))
    }

    /// Expiration recorded for this key
    pub fn expiration(&self) -> Ttl {
        Ttl::from_pttl(self.ttl)
    }
}

/// Outcome of a backup pass
#[derive(Debug, Clone)]
pub struct BackupReport {
    /// Pattern the keys were scanned with
    pub pattern: String,
    /// Every key the scan produced, in scan order
    pub keys: Vec<String>,
    /// Records written to the backup file
    pub captured: usize,
    /// Keys that vanished or failed to dump and were left out of the file
    pub skipped: Vec<String>,
    /// Backup file location
    pub path: PathBuf,
}

impl BackupReport {
    /// Number of keys processed
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }
}

/// A key that could not be restored
#[derive(Debug)]
pub struct KeyFailure {
    /// Key name
    pub key: String,
    /// Why it failed
    pub error: BackupError,
}

/// Outcome of a restore pass
#[derive(Debug, Default)]
pub struct RestoreReport {
    /// Keys written to the store
    pub restored: usize,
    /// Keys whose record could not be decoded or was rejected by the store
    pub failures: Vec<KeyFailure>,
    /// Records ignored because their key does not match the pattern
    pub skipped: Vec<String>,
}

impl RestoreReport {
    /// Number of failed keys
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Whether every attempted key was restored
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Collapse into the restored count, or a partial-failure error
    pub fn into_result(self) -> Result<usize> {
        if self.failures.is_empty() {
            Ok(self.restored)
        } else {
            Err(BackupError::PartialFailure {
                succeeded: self.restored,
                failed: self.failures.len(),
            })
        }
    }
}

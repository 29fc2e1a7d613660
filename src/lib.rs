//! # store-backup
//!
//! Pattern-based backup, restore and clear for Redis keyspaces, plus a thin
//! wrapper around the MongoDB database tools.
//!
//! ## Overview
//!
//! A Redis backup captures every key matching a glob pattern with `DUMP` and
//! `PTTL`, and writes the results to one JSON file per pattern. Restoring
//! replays each record with `RESTORE ... REPLACE`. Values are opaque, so any
//! Redis type survives the round trip byte-for-byte.
//!
//! ## Quick Start
//!
//! ```rust
//! use store_backup::backup::KeyValueBackupManager;
//! use store_backup::store::MemoryStore;
//!
//! # async fn example() -> store_backup::Result<()> {
//! let store = MemoryStore::new();
//! store.set("session:1", b"a".to_vec());
//!
//! let manager = KeyValueBackupManager::new(Box::new(store.clone()));
//! let report = manager.backup("session:*", "./backups").await?;
//! assert_eq!(report.key_count(), 1);
//!
//! manager.clear("session:*").await?;
//! manager.restore("session:*", "./backups").await?;
//! assert_eq!(store.get("session:1"), Some(b"a".to_vec()));
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`backup`]: scanner, record serializer, file codec, bulk mutator and manager
//! - [`store`]: the `KeyValueStore` seam with Redis and in-memory implementations
//! - [`mongo`]: MongoDB backup/restore through `mongodump`/`mongorestore`
//! - [`pattern`]: Redis-compatible glob matching
//! - [`config`]: connection defaults and tunables
//! - [`logging`]: tracing subscriber setup

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

use thiserror::Error;

/// Result type for backup operations
pub type Result<T> = std::result::Result<T, BackupError>;

/// Main error type for backup operations
#[derive(Error, Debug)]
pub enum BackupError {
    /// Store unreachable or connection lost; aborts the whole operation
    #[error("Connection error: {0}")]
    Connection(String),

    /// Backup file, backup directory or key missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Corrupt backup JSON or malformed base64 payload
    #[error("Parse error: {0}")]
    Parse(String),

    /// Store rejected a command (bad dump payload, version mismatch, ...)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Some keys of a multi-key operation failed
    #[error("Partial failure: {succeeded} succeeded, {failed} failed")]
    PartialFailure {
        /// Keys that were applied
        succeeded: usize,
        /// Keys that failed
        failed: usize,
    },

    /// Local filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// External database tool missing or exited unsuccessfully
    #[error("External tool error: {0}")]
    ExternalTool(String),
}

impl BackupError {
    /// Whether the error must abort a multi-key operation instead of being
    /// recorded against a single key.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BackupError::Connection(_))
    }
}

impl From<redis::RedisError> for BackupError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error()
            || err.is_connection_refusal()
            || err.is_connection_dropped()
            || err.is_timeout()
        {
            BackupError::Connection(err.to_string())
        } else {
            BackupError::Protocol(err.to_string())
        }
    }
}

/// Key-pattern backup engine
pub mod backup;

/// Store access
pub mod store;

/// MongoDB database backup through external tools
pub mod mongo;

/// Glob pattern matching
pub mod pattern;

/// Configuration defaults
pub mod config;

/// Logging setup
pub mod logging;

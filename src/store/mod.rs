//! Store access for the backup engine
//!
//! [`KeyValueStore`] is the seam between the backup engine and a concrete
//! key-value server. It exposes only the primitives the engine needs: paged
//! pattern scans, dump-with-TTL capture, and batched delete/restore.

mod memory;
pub mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

use crate::Result;
use async_trait::async_trait;

/// Cursor value that starts a scan and signals a completed cycle.
pub const SCAN_START: u64 = 0;

/// One page of a cursor-based scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor to pass to the next call; [`SCAN_START`] once the cycle is done
    pub cursor: u64,
    /// Raw key names in this page, possibly empty even mid-scan
    pub keys: Vec<Vec<u8>>,
}

/// A key's native serialized value and its remaining lifetime, captured together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySnapshot {
    /// Opaque `DUMP` payload
    pub payload: Vec<u8>,
    /// Raw `PTTL` reply: milliseconds, `-1` for no expiry, `-2` for no key
    pub pttl: i64,
}

/// A decoded record ready to be written back to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreEntry {
    /// Target key
    pub key: String,
    /// Opaque `DUMP` payload
    pub payload: Vec<u8>,
    /// Expiration in milliseconds from now; `0` restores a persistent key
    pub ttl_ms: u64,
}

/// Primitives the backup engine needs from a key-value store.
///
/// Scans and deletes work on raw key bytes, so keys that are not UTF-8 can
/// still be cleared. The outer `Result` of the batch operations reports
/// connection-level failures; the inner per-key results are in the same
/// order as the input.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch one page of keys matching `pattern`, starting at `cursor`
    async fn scan_page(&self, cursor: u64, pattern: &str) -> Result<ScanPage>;

    /// Capture a key's dump payload and TTL, or `None` if the key does not exist
    async fn dump(&self, key: &str) -> Result<Option<KeySnapshot>>;

    /// Delete keys in one round trip; each result is whether a key was removed
    async fn delete_many(&self, keys: &[Vec<u8>]) -> Result<Vec<Result<bool>>>;

    /// Restore entries in one round trip, replacing existing keys
    async fn restore_many(&self, entries: &[RestoreEntry]) -> Result<Vec<Result<()>>>;

    /// Check that the store is reachable
    async fn ping(&self) -> Result<()>;
}

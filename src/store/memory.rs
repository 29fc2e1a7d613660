use super::{KeySnapshot, KeyValueStore, RestoreEntry, ScanPage, SCAN_START};
use crate::pattern::glob_match;
use crate::{BackupError, Result};
use async_trait::async_trait;
use dashmap::DashSet;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Version tag written into every dump payload
const DUMP_VERSION: u16 = 11;

const CHECKSUM_LEN: usize = 8;

const DEFAULT_PAGE_SIZE: usize = 10;

struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |deadline| deadline > now)
    }

    fn pttl(&self, now: Instant) -> i64 {
        match self.expires_at {
            Some(deadline) => deadline.saturating_duration_since(now).as_millis() as i64,
            None => -1,
        }
    }
}

/// In-process key-value store with Redis-like scan, dump and restore semantics.
///
/// Scans page through the sorted keyspace with a positional cursor, so pages
/// may be empty before the cycle completes. Dump payloads carry a version tag
/// and checksum, and `restore_many` rejects payloads that fail verification.
#[derive(Clone)]
pub struct MemoryStore {
    entries: Arc<RwLock<BTreeMap<String, Entry>>>,
    failing_dumps: Arc<DashSet<String>>,
    page_size: usize,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(BTreeMap::new())),
            failing_dumps: Arc::new(DashSet::new()),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Number of keyspace slots visited per scan page
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Set a persistent key
    pub fn set(&self, key: impl Into<String>, value: Vec<u8>) {
        self.entries.write().insert(
            key.into(),
            Entry {
                value,
                expires_at: None,
            },
        );
    }

    /// Set a key that expires after `ttl`
    pub fn set_with_ttl(&self, key: impl Into<String>, value: Vec<u8>, ttl: Duration) {
        self.entries.write().insert(
            key.into(),
            Entry {
                value,
                expires_at: Some(Instant::now() + ttl),
            },
        );
    }

    /// Current value of a live key
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let now = Instant::now();
        self.entries
            .read()
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
    }

    /// Remaining lifetime in milliseconds, `-1` without expiry, `-2` if absent
    pub fn pttl(&self, key: &str) -> i64 {
        let now = Instant::now();
        match self.entries.read().get(key) {
            Some(entry) if entry.is_live(now) => entry.pttl(now),
            _ => -2,
        }
    }

    /// Live keys in sorted order
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        self.entries
            .read()
            .iter()
            .filter(|(_, entry)| entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.keys().len()
    }

    /// Whether the store holds no live keys
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make every subsequent `dump` of `key` fail with a protocol error
    pub fn fail_dump_for(&self, key: impl Into<String>) {
        self.failing_dumps.insert(key.into());
    }

    /// Encode a value the way this store's `dump` does
    pub fn encode_payload(value: &[u8]) -> Vec<u8> {
        let mut payload = Vec::with_capacity(value.len() + 2 + CHECKSUM_LEN);
        payload.extend_from_slice(value);
        payload.extend_from_slice(&DUMP_VERSION.to_le_bytes());
        let checksum = Sha256::digest(&payload);
        payload.extend_from_slice(&checksum[..CHECKSUM_LEN]);
        payload
    }

    fn decode_payload(payload: &[u8]) -> Result<Vec<u8>> {
        let rejected = || BackupError::Protocol("DUMP payload version or checksum are wrong".to_string());

        if payload.len() < 2 + CHECKSUM_LEN {
            return Err(rejected());
        }
        let (body, checksum) = payload.split_at(payload.len() - CHECKSUM_LEN);
        if Sha256::digest(body)[..CHECKSUM_LEN] != *checksum {
            return Err(rejected());
        }
        let (value, version) = body.split_at(body.len() - 2);
        if u16::from_le_bytes([version[0], version[1]]) != DUMP_VERSION {
            return Err(rejected());
        }
        Ok(value.to_vec())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn scan_page(&self, cursor: u64, pattern: &str) -> Result<ScanPage> {
        let now = Instant::now();
        let entries = self.entries.read();
        let start = cursor as usize;

        let keys = entries
            .iter()
            .skip(start)
            .take(self.page_size)
            .filter(|(key, entry)| entry.is_live(now) && glob_match(pattern, key))
            .map(|(key, _)| key.clone().into_bytes())
            .collect();

        let end = start + self.page_size;
        let next = if end >= entries.len() {
            SCAN_START
        } else {
            end as u64
        };

        Ok(ScanPage { cursor: next, keys })
    }

    async fn dump(&self, key: &str) -> Result<Option<KeySnapshot>> {
        if self.failing_dumps.contains(key) {
            return Err(BackupError::Protocol(format!("DUMP failed for key {}", key)));
        }

        let now = Instant::now();
        Ok(self
            .entries
            .read()
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| KeySnapshot {
                payload: Self::encode_payload(&entry.value),
                pttl: entry.pttl(now),
            }))
    }

    async fn delete_many(&self, keys: &[Vec<u8>]) -> Result<Vec<Result<bool>>> {
        let now = Instant::now();
        let mut entries = self.entries.write();
        Ok(keys
            .iter()
            .map(|key| {
                // Only UTF-8 keys can be stored here
                let removed = std::str::from_utf8(key)
                    .ok()
                    .and_then(|key| entries.remove(key))
                    .map_or(false, |entry| entry.is_live(now));
                Ok(removed)
            })
            .collect())
    }

    async fn restore_many(&self, entries: &[RestoreEntry]) -> Result<Vec<Result<()>>> {
        let now = Instant::now();
        let mut store = self.entries.write();
        Ok(entries
            .iter()
            .map(|entry| {
                let value = Self::decode_payload(&entry.payload)?;
                let expires_at = (entry.ttl_ms > 0).then(|| now + Duration::from_millis(entry.ttl_ms));
                store.insert(entry.key.clone(), Entry { value, expires_at });
                Ok(())
            })
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

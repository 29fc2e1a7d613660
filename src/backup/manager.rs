// Key-Value Backup Manager - backup, clear and restore by key pattern

use super::codec::{self, BackupFile};
use super::mutator::BulkMutator;
use super::scanner::collect_keys;
use super::serializer::capture;
use super::types::{BackupReport, RestoreReport};
use crate::config::{default_capture_concurrency, ensure_dir, RedisConfig};
use crate::pattern::glob_match;
use crate::store::{KeyValueStore, RedisStore};
use crate::Result;
use futures::stream::{self, StreamExt};
use std::path::Path;
use tracing::{error, info, warn};

/// Orchestrates pattern backups, clears and restores against one store.
///
/// The manager owns its store handle for its whole lifetime; there is no
/// shared or global connection.
pub struct KeyValueBackupManager {
    store: Box<dyn KeyValueStore>,
    capture_concurrency: usize,
}

impl KeyValueBackupManager {
    /// Manager over `store`
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self {
            store,
            capture_concurrency: default_capture_concurrency(),
        }
    }

    /// Connect to Redis and build a manager with the configured tunables
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let store = RedisStore::connect(config).await?;
        Ok(Self::new(Box::new(store)).with_capture_concurrency(config.capture_concurrency))
    }

    /// Limit how many keys are captured at the same time
    pub fn with_capture_concurrency(mut self, concurrency: usize) -> Self {
        self.capture_concurrency = concurrency.max(1);
        self
    }

    /// The underlying store
    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    /// Back up every key matching `pattern` into `backup_dir`.
    ///
    /// Keys that vanish, fail to dump, or are not UTF-8 (the file is JSON)
    /// are logged and left out of the file; they still appear in the returned
    /// key list.
    pub async fn backup(&self, pattern: &str, backup_dir: impl AsRef<Path>) -> Result<BackupReport> {
        let store = self.store.as_ref();
        let scanned = collect_keys(store, pattern).await?;
        info!(pattern = %pattern, key_count = scanned.len(), "Found {} keys for pattern", scanned.len());

        let mut keys = Vec::with_capacity(scanned.len());
        let mut capturable = Vec::with_capacity(scanned.len());
        let mut skipped = Vec::new();
        for raw in scanned {
            match String::from_utf8(raw) {
                Ok(key) => {
                    keys.push(key.clone());
                    capturable.push(key);
                }
                Err(e) => {
                    let shown = String::from_utf8_lossy(e.as_bytes()).into_owned();
                    warn!(pattern = %pattern, key = %shown, "Skipping key that is not valid UTF-8");
                    keys.push(shown.clone());
                    skipped.push(shown);
                }
            }
        }

        let captures: Vec<_> = stream::iter(capturable)
            .map(|key| async move {
                let outcome = capture(store, &key).await;
                (key, outcome)
            })
            .buffer_unordered(self.capture_concurrency)
            .collect()
            .await;

        let mut file = BackupFile::new();
        for (key, outcome) in captures {
            match outcome {
                Ok(Some(record)) => file.insert(key, record),
                Ok(None) => {
                    warn!(pattern = %pattern, key = %key, "Key vanished before it could be dumped");
                    skipped.push(key);
                }
                Err(e) if e.is_fatal() => {
                    error!(pattern = %pattern, key = %key, error = %e, "Backup aborted");
                    return Err(e);
                }
                Err(e) => {
                    error!(pattern = %pattern, key = %key, error = %e, "Error dumping key");
                    skipped.push(key);
                }
            }
        }
        skipped.sort();
        skipped.dedup();

        let backup_dir = ensure_dir(backup_dir).await?;
        let path = codec::backup_path(&backup_dir, pattern);
        if let Err(e) = codec::write_backup_file(&path, &file).await {
            error!(pattern = %pattern, path = %path.display(), error = %e, "Error saving backup file");
            return Err(e);
        }

        info!(
            pattern = %pattern,
            path = %path.display(),
            captured = file.len(),
            skipped = skipped.len(),
            "Backup written"
        );

        Ok(BackupReport {
            pattern: pattern.to_string(),
            keys,
            captured: file.len(),
            skipped,
            path,
        })
    }

    /// Delete every key matching `pattern`, returning how many were removed
    pub async fn clear(&self, pattern: &str) -> Result<usize> {
        let keys = collect_keys(self.store.as_ref(), pattern).await?;
        info!(pattern = %pattern, key_count = keys.len(), "Found {} keys for pattern", keys.len());
        self.clear_keys(&keys).await
    }

    /// Delete exactly `keys`, returning how many were removed
    pub async fn clear_keys<K: AsRef<[u8]>>(&self, keys: &[K]) -> Result<usize> {
        BulkMutator::new(self.store.as_ref()).delete_many(keys).await
    }

    /// Restore the backup file for `pattern` from `backup_dir`.
    ///
    /// A missing file is logged and returned as `NotFound` before anything is
    /// written. Records whose key does not match `pattern` are skipped, since
    /// distinct patterns can map to the same file.
    pub async fn restore(&self, pattern: &str, backup_dir: impl AsRef<Path>) -> Result<RestoreReport> {
        let path = codec::backup_path(backup_dir, pattern);

        let file = match codec::read_backup_file(&path).await {
            Ok(file) => file,
            Err(e) => {
                error!(pattern = %pattern, path = %path.display(), error = %e, "Error reading backup file");
                return Err(e);
            }
        };

        let mut skipped = Vec::new();
        let mut records = Vec::with_capacity(file.len());
        for (key, record) in file {
            if glob_match(pattern, &key) {
                records.push((key, record));
            } else {
                warn!(pattern = %pattern, key = %key, "Skipping record that does not match pattern");
                skipped.push(key);
            }
        }

        let mut report = BulkMutator::new(self.store.as_ref())
            .restore_many(records)
            .await?;
        report.skipped = skipped;

        info!(
            pattern = %pattern,
            path = %path.display(),
            restored = report.restored,
            failed = report.failed(),
            skipped = report.skipped.len(),
            "Restore completed"
        );

        Ok(report)
    }
}

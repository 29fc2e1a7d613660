// Bulk Mutator - batched delete and restore with per-key outcomes

use super::serializer::replay_entry;
use super::types::{BackupRecord, KeyFailure, RestoreReport};
use crate::store::KeyValueStore;
use crate::{BackupError, Result};
use tracing::{debug, error, info};

/// Issues delete and restore batches against a store, one round trip per call.
///
/// A failing key never aborts its siblings; only connection-level errors end
/// the call early.
pub struct BulkMutator<'a> {
    store: &'a dyn KeyValueStore,
}

impl<'a> BulkMutator<'a> {
    /// Mutator over `store`
    pub fn new(store: &'a dyn KeyValueStore) -> Self {
        Self { store }
    }

    /// Delete `keys`, returning how many existed and were removed.
    ///
    /// Keys are raw bytes, so names that are not UTF-8 can be deleted too.
    pub async fn delete_many<K: AsRef<[u8]>>(&self, keys: &[K]) -> Result<usize> {
        if keys.is_empty() {
            info!("No keys to delete.");
            return Ok(0);
        }

        let keys: Vec<Vec<u8>> = keys.iter().map(|key| key.as_ref().to_vec()).collect();
        let results = self.store.delete_many(&keys).await?;
        check_result_count(keys.len(), results.len())?;

        let mut deleted = 0;
        for (key, result) in keys.iter().zip(results) {
            let key = String::from_utf8_lossy(key);
            match result {
                Ok(true) => deleted += 1,
                Ok(false) => debug!(key = %key, "Key already absent"),
                Err(e) => error!(key = %key, error = %e, "Failed to delete key"),
            }
        }

        info!(deleted, requested = keys.len(), "Deleted {}/{} keys", deleted, keys.len());
        Ok(deleted)
    }

    /// Restore `records`, replacing existing keys.
    ///
    /// Records that fail to decode are reported without reaching the store;
    /// the rest go out in a single batch.
    pub async fn restore_many<I>(&self, records: I) -> Result<RestoreReport>
    where
        I: IntoIterator<Item = (String, BackupRecord)>,
    {
        let mut report = RestoreReport::default();
        let mut entries = Vec::new();

        for (key, record) in records {
            match replay_entry(&key, &record) {
                Ok(entry) => entries.push(entry),
                Err(error) => {
                    error!(key = %key, error = %error, "Error preparing key for restore");
                    report.failures.push(KeyFailure { key, error });
                }
            }
        }

        if entries.is_empty() {
            return Ok(report);
        }

        let results = self.store.restore_many(&entries).await?;
        check_result_count(entries.len(), results.len())?;

        for (entry, result) in entries.into_iter().zip(results) {
            match result {
                Ok(()) => report.restored += 1,
                Err(error) => {
                    error!(key = %entry.key, error = %error, "RESTORE error for key");
                    report.failures.push(KeyFailure {
                        key: entry.key,
                        error,
                    });
                }
            }
        }

        Ok(report)
    }
}

fn check_result_count(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(BackupError::Protocol(format!(
            "Store returned {} results for {} commands",
            actual, expected
        )));
    }
    Ok(())
}

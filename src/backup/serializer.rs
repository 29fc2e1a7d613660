// Key Serializer - capture a key into a backup record and decode it back

use super::types::BackupRecord;
use crate::store::{KeyValueStore, RestoreEntry};
use crate::Result;
use tracing::debug;

/// Capture `key` as a backup record.
///
/// Returns `Ok(None)` when the key no longer exists, which happens when a
/// concurrent writer deletes it between the scan and the dump.
pub async fn capture(store: &dyn KeyValueStore, key: &str) -> Result<Option<BackupRecord>> {
    let snapshot = match store.dump(key).await? {
        Some(snapshot) => snapshot,
        None => return Ok(None),
    };

    debug!(
        key = %key,
        payload_len = snapshot.payload.len(),
        pttl = snapshot.pttl,
        "Captured key"
    );
    Ok(Some(BackupRecord::from_snapshot(&snapshot)))
}

/// Decode a record into the entry that recreates `key`.
///
/// A positive stored TTL expires the key that many milliseconds after the
/// restore; time elapsed since the backup is not subtracted. Anything else
/// restores a persistent key.
pub fn replay_entry(key: &str, record: &BackupRecord) -> Result<RestoreEntry> {
    Ok(RestoreEntry {
        key: key.to_string(),
        payload: record.payload()?,
        ttl_ms: record.expiration().restore_millis(),
    })
}

// Pattern Scanner - lazy key enumeration over a cursor-based scan

use crate::store::{KeyValueStore, SCAN_START};
use crate::{BackupError, Result};
use futures::stream::{self, Stream, TryStreamExt};

/// Lazily enumerate keys matching `pattern`.
///
/// Pages are fetched on demand, so at most one page is held in memory. The
/// scan ends when the store hands back the start cursor again; empty pages
/// along the way do not end it. Keys the server reports more than once
/// (possible while it resizes its tables) are yielded more than once. Keys
/// are raw bytes, as the server stores them.
pub fn scan_keys<'a>(
    store: &'a dyn KeyValueStore,
    pattern: &'a str,
) -> impl Stream<Item = Result<Vec<u8>>> + Send + 'a {
    stream::try_unfold(Some(SCAN_START), move |cursor: Option<u64>| async move {
        let cursor = match cursor {
            Some(cursor) => cursor,
            None => return Ok(None),
        };

        let page = store.scan_page(cursor, pattern).await?;
        let next = (page.cursor != SCAN_START).then_some(page.cursor);
        let keys = stream::iter(page.keys.into_iter().map(Ok::<Vec<u8>, BackupError>));
        Ok::<_, BackupError>(Some((keys, next)))
    })
    .try_flatten()
}

/// Run a scan to completion and collect every key
pub async fn collect_keys(store: &dyn KeyValueStore, pattern: &str) -> Result<Vec<Vec<u8>>> {
    scan_keys(store, pattern).try_collect().await
}

use super::{KeySnapshot, KeyValueStore, RestoreEntry, ScanPage};
use crate::config::RedisConfig;
use crate::{BackupError, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use redis::aio::ConnectionManager;
use redis::{Client, RedisResult, Value};
use tracing::debug;

/// Redis-backed store using a multiplexed connection manager.
///
/// The manager is cheap to clone and safe to use from concurrent tasks, so
/// every call works on its own clone instead of serializing behind a lock.
#[derive(Clone)]
pub struct RedisStore {
    connection_manager: ConnectionManager,
    scan_count: Option<usize>,
}

impl RedisStore {
    /// Connect to the server named by `config.redis_url`
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.redis_url.as_str())
            .map_err(|e| BackupError::Connection(format!("Invalid Redis URL: {}", e)))?;

        let connection_manager = ConnectionManager::new(client).await.map_err(|e| {
            BackupError::Connection(format!("Failed to connect to Redis: {}", e))
        })?;

        Ok(Self {
            connection_manager,
            scan_count: config.scan_count,
        })
    }

    fn connection(&self) -> ConnectionManager {
        self.connection_manager.clone()
    }

    /// Send one request per command over the shared multiplexed connection.
    ///
    /// Requests are written back to back without waiting for replies, so a
    /// batch still costs about one round trip, but every command gets its own
    /// reply. Replies come back in command order.
    async fn send_each(&self, commands: Vec<redis::Cmd>) -> Vec<RedisResult<Value>> {
        stream::iter(commands)
            .map(|cmd| {
                let mut conn = self.connection();
                async move {
                    let reply: RedisResult<Value> = cmd.query_async(&mut conn).await;
                    reply
                }
            })
            .buffered(MAX_IN_FLIGHT)
            .collect()
            .await
    }
}

/// Upper bound on requests awaiting a reply during one batch
const MAX_IN_FLIGHT: usize = 1024;

/// Turn per-command replies into per-key results.
///
/// A connection-level error fails the whole batch; any other error stays with
/// its key.
fn per_key_results<T>(
    replies: Vec<RedisResult<Value>>,
    decode: impl Fn(Value) -> Result<T>,
) -> Result<Vec<Result<T>>> {
    let mut results = Vec::with_capacity(replies.len());
    for reply in replies {
        match reply {
            Ok(value) => results.push(decode(value)),
            Err(e) => {
                let err = BackupError::from(e);
                if err.is_fatal() {
                    return Err(err);
                }
                results.push(Err(err));
            }
        }
    }
    Ok(results)
}

fn decode_del(value: Value) -> Result<bool> {
    let removed: i64 = redis::from_redis_value(&value)?;
    Ok(removed > 0)
}

fn decode_restore(value: Value) -> Result<()> {
    let status: String = redis::from_redis_value(&value)?;
    if status == "OK" {
        Ok(())
    } else {
        Err(BackupError::Protocol(format!("Unexpected RESTORE reply: {}", status)))
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn scan_page(&self, cursor: u64, pattern: &str) -> Result<ScanPage> {
        let mut cmd = redis::cmd("SCAN");
        cmd.arg(cursor).arg("MATCH").arg(pattern);
        if let Some(count) = self.scan_count {
            cmd.arg("COUNT").arg(count);
        }

        let mut conn = self.connection();
        let (next, keys): (u64, Vec<Vec<u8>>) = cmd.query_async(&mut conn).await?;

        debug!(cursor, next, page_len = keys.len(), "SCAN page");
        Ok(ScanPage { cursor: next, keys })
    }

    async fn dump(&self, key: &str) -> Result<Option<KeySnapshot>> {
        let mut conn = self.connection();
        // MULTI/EXEC so the payload and TTL describe the same version of the key
        let (payload, pttl): (Option<Vec<u8>>, i64) = redis::pipe()
            .atomic()
            .cmd("DUMP")
            .arg(key)
            .cmd("PTTL")
            .arg(key)
            .query_async(&mut conn)
            .await?;

        Ok(payload.map(|payload| KeySnapshot { payload, pttl }))
    }

    async fn delete_many(&self, keys: &[Vec<u8>]) -> Result<Vec<Result<bool>>> {
        let commands = keys
            .iter()
            .map(|key| {
                let mut cmd = redis::cmd("DEL");
                cmd.arg(&key[..]);
                cmd
            })
            .collect();

        per_key_results(self.send_each(commands).await, decode_del)
    }

    async fn restore_many(&self, entries: &[RestoreEntry]) -> Result<Vec<Result<()>>> {
        let commands = entries.iter().map(restore_command).collect();
        per_key_results(self.send_each(commands).await, decode_restore)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(BackupError::Protocol(format!("Unexpected PING reply: {}", pong)))
        }
    }
}

fn restore_command(entry: &RestoreEntry) -> redis::Cmd {
    let mut cmd = redis::cmd("RESTORE");
    cmd.arg(&entry.key)
        .arg(entry.ttl_ms)
        .arg(&entry.payload[..])
        .arg("REPLACE");
    cmd
}

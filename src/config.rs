//! Connection defaults and tunables
//!
//! The CLI fills these from flags, falling back to the environment variables
//! named below and then to the defaults.

use crate::Result;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Default Redis connection URL (`REDIS_URL`)
pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379/0";

/// Default MongoDB connection URI (`MONGODB_URI`)
pub const DEFAULT_MONGO_URI: &str = "mongodb://localhost:27017/";

/// Default backup directory (`BACKUP_DIR`)
pub const DEFAULT_BACKUP_DIR: &str = "backups";

/// Default log level (`LOG_LEVEL`)
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default log file (`LOG_FILE`). An empty value disables file logging.
pub const DEFAULT_LOG_FILE: &str = "debug.log";

/// Default `SCAN ... COUNT` hint
pub const DEFAULT_SCAN_COUNT: usize = 1000;

/// Redis configuration for the backup manager
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Connection URL
    pub redis_url: String,
    /// `COUNT` hint per scan page; `None` leaves it to the server
    pub scan_count: Option<usize>,
    /// Maximum number of keys captured concurrently during a backup
    pub capture_concurrency: usize,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            redis_url: DEFAULT_REDIS_URL.to_string(),
            scan_count: Some(DEFAULT_SCAN_COUNT),
            capture_concurrency: default_capture_concurrency(),
        }
    }
}

impl RedisConfig {
    /// Configuration for the given URL with default tunables
    pub fn new(redis_url: impl Into<String>) -> Self {
        Self {
            redis_url: redis_url.into(),
            ..Self::default()
        }
    }

    /// Set the `SCAN ... COUNT` hint
    pub fn with_scan_count(mut self, count: Option<usize>) -> Self {
        self.scan_count = count.filter(|c| *c > 0);
        self
    }

    /// Set the capture concurrency; at least one capture always runs
    pub fn with_capture_concurrency(mut self, concurrency: usize) -> Self {
        self.capture_concurrency = concurrency.max(1);
        self
    }
}

/// Captures are I/O bound, so allow several in flight per core
pub fn default_capture_concurrency() -> usize {
    (num_cpus::get() * 4).max(1)
}

/// Paths of the external MongoDB tools
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MongoTools {
    /// `mongodump` executable
    pub dump: PathBuf,
    /// `mongorestore` executable
    pub restore: PathBuf,
    /// `mongosh` executable, used to drop databases
    pub shell: PathBuf,
}

impl Default for MongoTools {
    fn default() -> Self {
        Self {
            dump: PathBuf::from("mongodump"),
            restore: PathBuf::from("mongorestore"),
            shell: PathBuf::from("mongosh"),
        }
    }
}

/// MongoDB configuration
#[derive(Debug, Clone)]
pub struct MongoConfig {
    /// Connection URI
    pub mongo_uri: String,
    /// External tool locations
    pub tools: MongoTools,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            mongo_uri: DEFAULT_MONGO_URI.to_string(),
            tools: MongoTools::default(),
        }
    }
}

impl MongoConfig {
    /// Configuration for the given URI with tools looked up on `PATH`
    pub fn new(mongo_uri: impl Into<String>) -> Self {
        Self {
            mongo_uri: mongo_uri.into(),
            ..Self::default()
        }
    }

    /// Override the tool locations
    pub fn with_tools(mut self, tools: MongoTools) -> Self {
        self.tools = tools;
        self
    }
}

/// Create `path` and any missing parents, returning it
pub async fn ensure_dir(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    fs::create_dir_all(path).await?;
    Ok(path.to_path_buf())
}

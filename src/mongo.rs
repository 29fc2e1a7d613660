// MongoDB Backup Manager - database dumps through the MongoDB database tools

use crate::config::{ensure_dir, MongoConfig, MongoTools};
use crate::{BackupError, Result};
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::process::Command;
use tracing::{error, info};

/// Backs up, restores and drops whole MongoDB databases.
///
/// Dumps live at `backup_dir/<database name>/` in the layout `mongodump`
/// produces.
pub struct MongoBackupManager {
    mongo_uri: String,
    tools: MongoTools,
}

impl MongoBackupManager {
    /// Manager for `mongo_uri` with tools looked up on `PATH`
    pub fn new(mongo_uri: impl Into<String>) -> Self {
        Self::from_config(MongoConfig::new(mongo_uri))
    }

    /// Manager from a full configuration
    pub fn from_config(config: MongoConfig) -> Self {
        Self {
            mongo_uri: config.mongo_uri,
            tools: config.tools,
        }
    }

    /// Dump database `name` into `backup_dir`, replacing an earlier dump
    pub async fn backup(&self, name: &str, backup_dir: impl AsRef<Path>) -> Result<PathBuf> {
        let backup_dir = backup_dir.as_ref();
        let target = backup_dir.join(name);

        match fs::remove_dir_all(&target).await {
            Ok(()) => info!(database = %name, path = %target.display(), "Removed previous dump"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(BackupError::Io(e)),
        }
        ensure_dir(backup_dir).await?;

        run_tool(&self.tools.dump, dump_args(&self.mongo_uri, name, backup_dir)).await?;

        info!(database = %name, path = %target.display(), "MongoDB backup completed");
        Ok(target)
    }

    /// Restore database `name` from `backup_dir`, dropping existing collections
    pub async fn restore(&self, name: &str, backup_dir: impl AsRef<Path>) -> Result<()> {
        let source = backup_dir.as_ref().join(name);

        if !fs::try_exists(&source).await.unwrap_or(false) {
            error!(database = %name, path = %source.display(), "Backup directory not found");
            return Err(BackupError::NotFound(format!(
                "Backup directory not found: {}",
                source.display()
            )));
        }

        run_tool(&self.tools.restore, restore_args(&self.mongo_uri, name, &source)).await?;

        info!(database = %name, path = %source.display(), "MongoDB restore completed");
        Ok(())
    }

    /// Drop database `name`
    pub async fn clear(&self, name: &str) -> Result<()> {
        run_tool(&self.tools.shell, drop_args(&self.mongo_uri, name)?).await?;

        info!(database = %name, "Dropped MongoDB database");
        Ok(())
    }
}

fn dump_args(uri: &str, name: &str, out_dir: &Path) -> Vec<OsString> {
    vec![
        "--uri".into(),
        uri.into(),
        "--db".into(),
        name.into(),
        "--out".into(),
        out_dir.into(),
    ]
}

fn restore_args(uri: &str, name: &str, source: &Path) -> Vec<OsString> {
    vec![
        "--uri".into(),
        uri.into(),
        "--db".into(),
        name.into(),
        "--drop".into(),
        source.into(),
    ]
}

fn drop_args(uri: &str, name: &str) -> Result<Vec<OsString>> {
    // JSON string literals are valid JavaScript string literals
    let quoted = serde_json::to_string(name)
        .map_err(|e| BackupError::Parse(format!("Invalid database name: {}", e)))?;

    Ok(vec![
        uri.into(),
        "--quiet".into(),
        "--eval".into(),
        format!("db.getSiblingDB({}).dropDatabase()", quoted).into(),
    ])
}

async fn run_tool(program: &Path, args: Vec<OsString>) -> Result<()> {
    let tool = program.display().to_string();

    let output = Command::new(program)
        .args(&args)
        .output()
        .await
        .map_err(|e| {
            let reason = if e.kind() == ErrorKind::NotFound {
                "not installed or not on PATH".to_string()
            } else {
                e.to_string()
            };
            error!(tool = %tool, error = %e, "Failed to start MongoDB tool");
            BackupError::ExternalTool(format!("Failed to execute '{}': {}", tool, reason))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!(tool = %tool, status = %output.status, stderr = %stderr.trim(), "MongoDB tool failed");
        return Err(BackupError::ExternalTool(format!(
            "'{}' exited with {}: {}",
            tool,
            output.status,
            stderr.trim()
        )));
    }

    Ok(())
}

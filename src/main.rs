//! store-backup CLI
//!
//! Backs up, clears and restores Redis keys by glob pattern, and MongoDB
//! databases by name.
//!
//! ```text
//! store-backup redis backup --pattern 'session:*'
//! store-backup redis restore --prefix 'session:*' --backup-dir ./backups
//! store-backup mongo backup --name shop
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use store_backup::backup::KeyValueBackupManager;
use store_backup::config::{
    default_capture_concurrency, MongoConfig, RedisConfig, DEFAULT_BACKUP_DIR, DEFAULT_LOG_FILE,
    DEFAULT_LOG_LEVEL, DEFAULT_MONGO_URI, DEFAULT_REDIS_URL, DEFAULT_SCAN_COUNT,
};
use store_backup::logging::{init_logging, log_file_path};
use store_backup::mongo::MongoBackupManager;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "store-backup")]
#[command(about = "Backup, clear and restore Redis keys by pattern and MongoDB databases", long_about = None)]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    log_level: String,

    /// Also append logs to this file (empty to disable)
    #[arg(long, global = true, env = "LOG_FILE", default_value = DEFAULT_LOG_FILE)]
    log_file: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Redis key-pattern operations
    #[command(subcommand)]
    Redis(RedisCommands),

    /// MongoDB database operations
    #[command(subcommand)]
    Mongo(MongoCommands),
}

#[derive(Subcommand)]
enum RedisCommands {
    /// Write every key matching the pattern to a backup file
    Backup(RedisArgs),
    /// Delete every key matching the pattern
    Clear(RedisArgs),
    /// Recreate keys from the pattern's backup file
    Restore(RedisArgs),
}

#[derive(Subcommand)]
enum MongoCommands {
    /// Dump the database with mongodump
    Backup(MongoArgs),
    /// Drop the database
    Clear(MongoArgs),
    /// Restore the database with mongorestore
    Restore(MongoArgs),
}

#[derive(Args)]
struct RedisArgs {
    /// Key pattern, e.g. 'session:*'
    #[arg(long, alias = "prefix")]
    pattern: String,

    /// Directory holding backup files
    #[arg(long, env = "BACKUP_DIR", default_value = DEFAULT_BACKUP_DIR)]
    backup_dir: PathBuf,

    /// Redis connection URL
    #[arg(long, env = "REDIS_URL", default_value = DEFAULT_REDIS_URL)]
    redis_url: String,

    /// COUNT hint per SCAN page (0 lets the server decide)
    #[arg(long, default_value_t = DEFAULT_SCAN_COUNT)]
    scan_count: usize,

    /// Keys captured concurrently during backup
    #[arg(long)]
    concurrency: Option<usize>,
}

impl RedisArgs {
    fn config(&self) -> RedisConfig {
        RedisConfig::new(&self.redis_url)
            .with_scan_count(Some(self.scan_count))
            .with_capture_concurrency(self.concurrency.unwrap_or_else(default_capture_concurrency))
    }
}

#[derive(Args)]
struct MongoArgs {
    /// Database name
    #[arg(long)]
    name: String,

    /// Directory holding database dumps
    #[arg(long, env = "BACKUP_DIR", default_value = DEFAULT_BACKUP_DIR)]
    backup_dir: PathBuf,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = DEFAULT_MONGO_URI)]
    mongo_uri: String,
}

impl MongoArgs {
    fn manager(&self) -> MongoBackupManager {
        MongoBackupManager::from_config(MongoConfig::new(&self.mongo_uri))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli.log_level, log_file_path(&cli.log_file)) {
        eprintln!("Failed to initialize logging: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let message = format!("{:#}", e);
            error!(error = %message, "Command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Redis(command) => run_redis(command).await,
        Commands::Mongo(command) => run_mongo(command).await,
    }
}

async fn run_redis(command: RedisCommands) -> Result<()> {
    match command {
        RedisCommands::Backup(args) => {
            let manager = connect(&args).await?;
            let report = manager
                .backup(&args.pattern, &args.backup_dir)
                .await
                .with_context(|| format!("Backup of pattern '{}' failed", args.pattern))?;
            info!(
                pattern = %args.pattern,
                path = %report.path.display(),
                matched = report.key_count(),
                captured = report.captured,
                skipped = report.skipped.len(),
                "Backed up {} keys for pattern {}",
                report.key_count(),
                args.pattern
            );
        }
        RedisCommands::Clear(args) => {
            let manager = connect(&args).await?;
            let deleted = manager
                .clear(&args.pattern)
                .await
                .with_context(|| format!("Clear of pattern '{}' failed", args.pattern))?;
            info!(pattern = %args.pattern, "Deleted {} keys for pattern {}", deleted, args.pattern);
        }
        RedisCommands::Restore(args) => {
            let manager = connect(&args).await?;
            let report = manager
                .restore(&args.pattern, &args.backup_dir)
                .await
                .with_context(|| format!("Restore of pattern '{}' failed", args.pattern))?;
            info!(
                pattern = %args.pattern,
                restored = report.restored,
                failed = report.failed(),
                skipped = report.skipped.len(),
                "Restored {} keys for pattern {}",
                report.restored,
                args.pattern
            );
            report
                .into_result()
                .with_context(|| format!("Restore of pattern '{}' was incomplete", args.pattern))?;
        }
    }
    Ok(())
}

async fn connect(args: &RedisArgs) -> Result<KeyValueBackupManager> {
    KeyValueBackupManager::connect(&args.config())
        .await
        .with_context(|| format!("Could not connect to Redis at {}", args.redis_url))
}

async fn run_mongo(command: MongoCommands) -> Result<()> {
    match command {
        MongoCommands::Backup(args) => {
            let path = args
                .manager()
                .backup(&args.name, &args.backup_dir)
                .await
                .with_context(|| format!("Backup of database '{}' failed", args.name))?;
            info!(database = %args.name, path = %path.display(), "Backed up database {}", args.name);
        }
        MongoCommands::Clear(args) => {
            args.manager()
                .clear(&args.name)
                .await
                .with_context(|| format!("Drop of database '{}' failed", args.name))?;
        }
        MongoCommands::Restore(args) => {
            args.manager()
                .restore(&args.name, &args.backup_dir)
                .await
                .with_context(|| format!("Restore of database '{}' failed", args.name))?;
        }
    }
    Ok(())
}

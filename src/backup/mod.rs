// Key-Pattern Backup - scan, capture, persist and replay keys by glob pattern

pub mod codec;
pub mod manager;
pub mod mutator;
pub mod scanner;
pub mod serializer;
pub mod types;

pub use codec::{backup_path, filename_for, BackupFile};
pub use manager::KeyValueBackupManager;
pub use mutator::BulkMutator;
pub use scanner::{collect_keys, scan_keys};
pub use serializer::{capture, replay_entry};
pub use types::{BackupRecord, BackupReport, KeyFailure, RestoreReport, Ttl};

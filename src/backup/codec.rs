// Backup File Codec - pattern-derived filenames and JSON backup files

use super::types::BackupRecord;
use crate::{BackupError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

lazy_static! {
    /// Runs of characters that are not safe in a filename
    static ref UNSAFE_RUN: Regex = Regex::new(r"[^A-Za-z0-9._-]+").unwrap();
}

/// Longest sanitized stem kept before a hash suffix is added
pub const MAX_STEM_LEN: usize = 64;

/// Stem used when nothing of the pattern survives sanitizing
pub const PLACEHOLDER_STEM: &str = "pattern";

const HASH_SUFFIX_LEN: usize = 8;

/// Derive the backup filename for `pattern`.
///
/// Unsafe character runs become a single `_`, and leading or trailing `_`
/// are stripped. Stems over [`MAX_STEM_LEN`] characters are truncated and
/// suffixed with a short SHA-1 of the full pattern, so long patterns that
/// share a prefix still get distinct files.
pub fn filename_for(pattern: &str) -> String {
    let sanitized = UNSAFE_RUN.replace_all(pattern, "_");
    let mut stem = sanitized.trim_matches('_').to_string();

    if stem.is_empty() {
        stem = PLACEHOLDER_STEM.to_string();
    }

    if stem.len() > MAX_STEM_LEN {
        let digest = format!("{:x}", Sha1::digest(pattern.as_bytes()));
        // The stem is ASCII-only here, so byte truncation is safe
        stem.truncate(MAX_STEM_LEN);
        stem.push('_');
        stem.push_str(&digest[..HASH_SUFFIX_LEN]);
    }

    format!("{}.json", stem)
}

/// Location of the backup file for `pattern` inside `backup_dir`
pub fn backup_path(backup_dir: impl AsRef<Path>, pattern: &str) -> PathBuf {
    backup_dir.as_ref().join(filename_for(pattern))
}

/// Contents of one backup file: key name to record, in sorted key order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackupFile {
    records: BTreeMap<String, BackupRecord>,
}

impl BackupFile {
    /// Empty backup file
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the record for `key`
    pub fn insert(&mut self, key: impl Into<String>, record: BackupRecord) {
        self.records.insert(key.into(), record);
    }

    /// Record for `key`
    pub fn get(&self, key: &str) -> Option<&BackupRecord> {
        self.records.get(key)
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the file holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Key names in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.records.keys()
    }

    /// Records in sorted key order
    pub fn iter(&self) -> btree_map::Iter<'_, String, BackupRecord> {
        self.records.iter()
    }
}

impl IntoIterator for BackupFile {
    type Item = (String, BackupRecord);
    type IntoIter = btree_map::IntoIter<String, BackupRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl FromIterator<(String, BackupRecord)> for BackupFile {
    fn from_iter<I: IntoIterator<Item = (String, BackupRecord)>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

/// Serialize a backup file to pretty-printed JSON
pub fn encode(file: &BackupFile) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(file)
        .map_err(|e| BackupError::Parse(format!("Failed to serialize backup file: {}", e)))
}

/// Parse a backup file from JSON
pub fn decode(bytes: &[u8]) -> Result<BackupFile> {
    serde_json::from_slice(bytes)
        .map_err(|e| BackupError::Parse(format!("Failed to parse backup file: {}", e)))
}

/// Write `file` to `path`, replacing any existing file.
///
/// The data goes to a temporary sibling first and is renamed into place, so
/// a crash mid-write never leaves a truncated backup behind.
pub async fn write_backup_file(path: &Path, file: &BackupFile) -> Result<()> {
    let data = encode(file)?;

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            BackupError::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("Invalid backup path: {}", path.display()),
            ))
        })?;
    let temp_path = path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

    let written = async {
        let mut temp = fs::File::create(&temp_path).await?;
        temp.write_all(&data).await?;
        temp.sync_all().await?;
        fs::rename(&temp_path, path).await
    }
    .await;

    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path).await;
        return Err(BackupError::Io(e));
    }

    Ok(())
}

/// Read the backup file at `path`
pub async fn read_backup_file(path: &Path) -> Result<BackupFile> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(BackupError::NotFound(format!(
                "Backup file not found: {}",
                path.display()
            )))
        }
        Err(e) => return Err(BackupError::Io(e)),
    };

    decode(&bytes)
}

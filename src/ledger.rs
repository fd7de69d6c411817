//! Persisted work ledgers.
//!
//! Three small JSON files carry state between runs: the change ledger
//! (key -> content path, insertion-ordered), the delete ledger (list of
//! keys) and the failure ledger (same shape as the change ledger). A missing
//! or undecodable ledger is reinitialized to its empty structure rather than
//! failing the run; only an unreadable file for other reasons is fatal.
//!
//! `backup_and_clear` snapshots to a `.bak` sibling before truncating, so a
//! crash mid-run can lose at most what the backup still holds.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Result, SyncError};

/// Pending upserts: `name@revision/organization` -> content path.
/// Re-adding an existing key overwrites the path (latest write wins).
#[derive(Debug, Clone)]
pub struct ChangeLedger {
    path: PathBuf,
}

/// Pending deletes: a list of key strings, duplicates tolerated.
#[derive(Debug, Clone)]
pub struct DeleteLedger {
    path: PathBuf,
}

/// Keys that failed a prior run, mapped to their original content path.
/// The first recorded failure persists until a successful retry clears it.
#[derive(Debug, Clone)]
pub struct FailureLedger {
    path: PathBuf,
}

impl ChangeLedger {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<IndexMap<String, String>> {
        load_or_init(&self.path, IndexMap::new)
    }

    pub fn backup_and_clear(&self) -> Result<()> {
        backup_and_clear(&self.path, &IndexMap::<String, String>::new())
    }
}

impl DeleteLedger {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Vec<String>> {
        load_or_init(&self.path, Vec::new)
    }

    pub fn backup_and_clear(&self) -> Result<()> {
        backup_and_clear(&self.path, &Vec::<String>::new())
    }
}

impl FailureLedger {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<IndexMap<String, String>> {
        load_or_init(&self.path, IndexMap::new)
    }

    /// Record a failed key. Insert-if-absent: a retry of an already-failed
    /// key keeps the original entry.
    pub fn record(&self, key: &str, location: &str) -> Result<()> {
        let mut failures = self.load()?;
        if !failures.contains_key(key) {
            failures.insert(key.to_string(), location.to_string());
        }
        write_json(&self.path, &failures)
    }

    pub fn backup_and_clear(&self) -> Result<()> {
        backup_and_clear(&self.path, &IndexMap::<String, String>::new())
    }
}

fn load_or_init<T>(path: &Path, empty: fn() -> T) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    match fs_err::read(path) {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(value),
            Err(err) => {
                tracing::warn!(
                    ledger = %path.display(),
                    error = %err,
                    "ledger undecodable, reinitializing empty"
                );
                let value = empty();
                write_json(path, &value)?;
                Ok(value)
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            let value = empty();
            write_json(path, &value)?;
            Ok(value)
        }
        Err(err) => Err(SyncError::Ledger {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }),
    }
}

fn backup_and_clear<T: Serialize>(path: &Path, empty: &T) -> Result<()> {
    let backup = backup_path(path);
    // The copy must land before the live file is truncated.
    fs_err::copy(path, &backup).map_err(|err| SyncError::Ledger {
        path: path.to_path_buf(),
        reason: format!("backup to {} failed: {err}", backup.display()),
    })?;
    write_json(path, empty)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value).map_err(|err| SyncError::Ledger {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    fs_err::write(path, bytes).map_err(|err| SyncError::Ledger {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map_or_else(
        || std::ffi::OsString::from("ledger"),
        std::ffi::OsStr::to_os_string,
    );
    name.push(".bak");
    path.with_file_name(name)
}

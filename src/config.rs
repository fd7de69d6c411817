//! Pipeline configuration.
//!
//! One `Config` is constructed at process start and handed by reference into
//! every component constructor. Nothing in the crate reads ambient global
//! state.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root of the authoritative module file corpus, scanned by the
    /// reconciler.
    pub corpus_dir: PathBuf,
    /// Directory holding the upstream-extracted JSON statement trees,
    /// one `name@revision.json` per module.
    pub ytree_dir: PathBuf,

    /// Change ledger: JSON object of `name@revision/organization` -> path.
    pub change_ledger: PathBuf,
    /// Delete ledger: JSON array of key strings.
    pub delete_ledger: PathBuf,
    /// Failure ledger: same shape as the change ledger, first failure wins.
    pub failure_ledger: PathBuf,

    /// Primary run-lock marker (scheduled sweep trigger).
    pub lock_file: PathBuf,
    /// Secondary run-lock marker (cron trigger), held until finalize.
    pub cron_lock_file: PathBuf,

    /// Catalog lookup endpoint used when a ledger entry's content path is
    /// absent locally.
    pub catalog_api_url: String,
    /// Base URL of the index engine.
    pub engine_url: String,

    /// Merge the failure ledger back into the work set at run start.
    /// Off by default: failed entries accumulate until retried explicitly.
    #[serde(default)]
    pub retry_failed: bool,

    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Additional attempts after the first, for transient engine faults.
    #[serde(default = "default_http_retries")]
    pub http_retries: u32,
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_http_retries() -> u32 {
    2
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = fs_err::read(path).map_err(|err| SyncError::Config {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        serde_json::from_slice(&bytes).map_err(|err| SyncError::Config {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_file_applies_defaults() {
        let dir = tempfile::tempdir().expect("tmp");
        let path = dir.path().join("config.json");
        fs_err::write(
            &path,
            serde_json::json!({
                "corpus_dir": "/var/modules",
                "ytree_dir": "/var/ytrees",
                "change_ledger": "/var/cache/changes.json",
                "delete_ledger": "/var/cache/deletes.json",
                "failure_ledger": "/var/cache/changes.json.failed",
                "lock_file": "/var/run/sync.lock",
                "cron_lock_file": "/var/run/sync-cron.lock",
                "catalog_api_url": "https://catalog.example.org/api",
                "engine_url": "http://localhost:9200"
            })
            .to_string(),
        )
        .expect("write config");

        let config = Config::from_file(&path).expect("load");
        assert!(!config.retry_failed);
        assert_eq!(config.http_timeout_secs, 30);
        assert_eq!(config.http_retries, 2);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = Config::from_file(Path::new("/nonexistent/config.json"))
            .expect_err("should fail");
        assert!(matches!(err, SyncError::Config { .. }));
    }
}

//! Cooperative run lock.
//!
//! Two marker files serialize synchronizer invocations across process and
//! cron boundaries: the sweep marker (released early, once the ledgers are
//! drained) and the cron marker (held until finalize). Either marker
//! existing blocks a new run. Presence is the lock; the JSON owner record
//! inside each marker is diagnostic only, so an operator can judge whether a
//! marker left by a crashed run is stale. Stale markers are never
//! auto-cleared: two runs racing on the same ledger files is worse than a
//! deferred sweep.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Diagnostic payload written into each marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockOwner {
    pub pid: u32,
    pub acquired_at: String,
}

#[derive(Debug)]
pub struct RunLock {
    sweep: PathBuf,
    cron: PathBuf,
}

impl RunLock {
    #[must_use]
    pub fn new(sweep: impl Into<PathBuf>, cron: impl Into<PathBuf>) -> Self {
        Self {
            sweep: sweep.into(),
            cron: cron.into(),
        }
    }

    /// Try to take both markers.
    ///
    /// Returns `Ok(false)` if either marker already exists; not an error,
    /// another run owns the ledgers. A marker-creation IO failure removes
    /// any marker this call did create and surfaces as `Err`, so a failed
    /// acquisition never leaves a permanent false lock behind.
    pub fn acquire(&self) -> Result<bool> {
        if self.sweep.exists() || self.cron.exists() {
            return Ok(false);
        }
        let owner = LockOwner {
            pid: std::process::id(),
            acquired_at: Utc::now().to_rfc3339(),
        };
        match create_marker(&self.sweep, &owner) {
            Ok(true) => {}
            Ok(false) => return Ok(false),
            Err(err) => return Err(err),
        }
        match create_marker(&self.cron, &owner) {
            Ok(true) => Ok(true),
            Ok(false) => {
                remove_marker(&self.sweep);
                Ok(false)
            }
            Err(err) => {
                remove_marker(&self.sweep);
                Err(err)
            }
        }
    }

    /// Release only the sweep marker. Called once the ledgers are safely
    /// drained, so a fresh ingestion run may start writing a new ledger
    /// while this run finishes applying the drained one.
    pub fn release_sweep(&self) {
        remove_marker(&self.sweep);
    }

    /// Release both markers. Idempotent; absent markers are ignored.
    pub fn release(&self) {
        remove_marker(&self.sweep);
        remove_marker(&self.cron);
    }

    #[must_use]
    pub fn is_held(&self) -> bool {
        self.sweep.exists() || self.cron.exists()
    }

    /// Owner record of whichever marker exists, for staleness diagnosis.
    #[must_use]
    pub fn inspect(&self) -> Option<LockOwner> {
        for marker in [&self.sweep, &self.cron] {
            if let Ok(bytes) = fs_err::read(marker) {
                if let Ok(owner) = serde_json::from_slice(&bytes) {
                    return Some(owner);
                }
            }
        }
        None
    }
}

/// Returns `Ok(false)` when the marker already exists (lost the race).
fn create_marker(path: &Path, owner: &LockOwner) -> Result<bool> {
    let result = fs_err::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path);
    let mut file = match result {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(err) => {
            return Err(SyncError::Lock {
                reason: format!("{}: {err}", path.display()),
            });
        }
    };
    let payload = serde_json::to_vec(owner).map_err(|err| SyncError::Lock {
        reason: err.to_string(),
    })?;
    file.write_all(&payload).map_err(|err| SyncError::Lock {
        reason: format!("{}: {err}", path.display()),
    })?;
    Ok(true)
}

fn remove_marker(path: &Path) {
    if let Err(err) = fs_err::remove_file(path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::error!(marker = %path.display(), error = %err, "lock marker removal failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_in(dir: &Path) -> RunLock {
        RunLock::new(dir.join("sync.lock"), dir.join("sync-cron.lock"))
    }

    #[test]
    fn acquire_creates_both_markers() {
        let dir = tempfile::tempdir().expect("tmp");
        let lock = lock_in(dir.path());

        assert!(lock.acquire().expect("acquire"));
        assert!(dir.path().join("sync.lock").exists());
        assert!(dir.path().join("sync-cron.lock").exists());
        assert!(lock.is_held());

        let owner = lock.inspect().expect("owner record");
        assert_eq!(owner.pid, std::process::id());
    }

    #[test]
    fn second_acquire_is_refused_not_errored() {
        let dir = tempfile::tempdir().expect("tmp");
        let lock = lock_in(dir.path());
        assert!(lock.acquire().expect("first"));
        assert!(!lock.acquire().expect("second"));
    }

    #[test]
    fn either_marker_alone_blocks() {
        let dir = tempfile::tempdir().expect("tmp");
        let lock = lock_in(dir.path());
        fs_err::write(dir.path().join("sync-cron.lock"), b"{}").expect("plant marker");
        assert!(!lock.acquire().expect("acquire"));
        // The sweep marker must not have been created on the refused path.
        assert!(!dir.path().join("sync.lock").exists());
    }

    #[test]
    fn release_removes_both_and_is_idempotent() {
        let dir = tempfile::tempdir().expect("tmp");
        let lock = lock_in(dir.path());
        assert!(lock.acquire().expect("acquire"));
        lock.release();
        assert!(!lock.is_held());
        lock.release();
        assert!(lock.acquire().expect("reacquire"));
    }

    #[test]
    fn release_sweep_keeps_cron_marker() {
        let dir = tempfile::tempdir().expect("tmp");
        let lock = lock_in(dir.path());
        assert!(lock.acquire().expect("acquire"));
        lock.release_sweep();
        assert!(!dir.path().join("sync.lock").exists());
        assert!(dir.path().join("sync-cron.lock").exists());
        assert!(lock.is_held());
    }

    #[test]
    fn failed_creation_cleans_up_partial_state() {
        let dir = tempfile::tempdir().expect("tmp");
        // Cron marker path points into a directory that does not exist, so
        // its creation fails after the sweep marker was already created.
        let lock = RunLock::new(
            dir.path().join("sync.lock"),
            dir.path().join("no-such-dir").join("sync-cron.lock"),
        );
        let err = lock.acquire().expect_err("should fail");
        assert!(matches!(err, SyncError::Lock { .. }));
        assert!(!dir.path().join("sync.lock").exists());
    }
}

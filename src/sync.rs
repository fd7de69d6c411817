//! Index synchronizer.
//!
//! One run drains the change and delete ledgers and applies them to the
//! engine. The protocol is linear: lock, load, empty-check, engine init,
//! backup-and-clear (after which the sweep marker is released so ingestion
//! may start a fresh ledger), deletes, upserts, finalize. Deletes for a run
//! are fully applied before its upserts begin, so a key deleted and re-added
//! in the same window ends the run present. One item's failure never aborts
//! the batch: it is logged, recorded into the failure ledger, and skipped.

use std::path::Path;

use indexmap::IndexMap;

use crate::config::Config;
use crate::engine::{Index, IndexEngine};
use crate::error::Result;
use crate::key::ModuleKey;
use crate::ledger::{ChangeLedger, DeleteLedger, FailureLedger};
use crate::lock::RunLock;
use crate::resolve::ContentSource;
use crate::transform::ModuleTransform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub processed: usize,
    pub failed: usize,
    pub deleted: usize,
}

#[derive(Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// Another run owns the markers; nothing was read or written.
    Locked,
    /// Both ledgers were empty; the engine was not touched.
    NoChanges,
    Completed(RunSummary),
}

pub struct Synchronizer<'a, E, S, T> {
    config: &'a Config,
    engine: &'a E,
    source: &'a S,
    transform: &'a T,
}

impl<'a, E, S, T> Synchronizer<'a, E, S, T>
where
    E: IndexEngine,
    S: ContentSource,
    T: ModuleTransform,
{
    #[must_use]
    pub fn new(config: &'a Config, engine: &'a E, source: &'a S, transform: &'a T) -> Self {
        Self {
            config,
            engine,
            source,
            transform,
        }
    }

    /// Execute one synchronizer run.
    ///
    /// Fatal errors release the markers this run created before
    /// propagating; failure to acquire the lock is a clean
    /// [`RunOutcome::Locked`], not an error.
    pub fn run(&self) -> Result<RunOutcome> {
        let lock = RunLock::new(&self.config.lock_file, &self.config.cron_lock_file);
        if !lock.acquire()? {
            tracing::warn!("run lock held by another invocation, nothing to do");
            return Ok(RunOutcome::Locked);
        }
        match self.run_locked(&lock) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                lock.release();
                Err(err)
            }
        }
    }

    fn run_locked(&self, lock: &RunLock) -> Result<RunOutcome> {
        let change_ledger = ChangeLedger::new(&self.config.change_ledger);
        let delete_ledger = DeleteLedger::new(&self.config.delete_ledger);
        let failure_ledger = FailureLedger::new(&self.config.failure_ledger);

        let mut changes = change_ledger.load()?;
        let deletes = delete_ledger.load()?;
        let retries = if self.config.retry_failed {
            failure_ledger.load()?
        } else {
            IndexMap::new()
        };

        if changes.is_empty() && deletes.is_empty() && retries.is_empty() {
            tracing::info!("no modules added or removed, nothing to do");
            lock.release();
            return Ok(RunOutcome::NoChanges);
        }

        self.ensure_indices()?;

        tracing::info!("backing up and clearing ledgers");
        delete_ledger.backup_and_clear()?;
        change_ledger.backup_and_clear()?;
        if self.config.retry_failed {
            failure_ledger.backup_and_clear()?;
            for (key, location) in retries {
                // A fresh change-ledger entry for the same key wins over the
                // stale failure record.
                if !changes.contains_key(&key) {
                    changes.insert(key, location);
                }
            }
        }
        // The ledgers are drained; ingestion may begin a fresh ledger while
        // this run applies the drained one.
        lock.release_sweep();

        let deleted = self.apply_deletes(&deletes);
        let (processed, failed) = self.apply_upserts(&changes, &failure_ledger)?;

        lock.release();
        tracing::info!(processed, failed, deleted, "synchronizer run finished");
        Ok(RunOutcome::Completed(RunSummary {
            processed,
            failed,
            deleted,
        }))
    }

    /// Step 4: every index must exist before documents flow. Idempotent.
    fn ensure_indices(&self) -> Result<()> {
        tracing::info!("initializing search indices");
        for index in Index::ALL {
            if self.engine.index_exists(index)? {
                continue;
            }
            self.engine.create_index(index)?;
            tracing::info!(index = %index, "index created");
        }
        Ok(())
    }

    fn apply_deletes(&self, deletes: &[String]) -> usize {
        let mut deleted = 0;
        for raw in deletes {
            let key = match ModuleKey::parse(raw) {
                Ok(key) => key,
                Err(err) => {
                    tracing::warn!(entry = raw.as_str(), error = %err, "skipping malformed delete entry");
                    continue;
                }
            };
            tracing::info!(module.key = %key, "deleting module from all indices");
            let mut ok = true;
            for index in Index::ALL {
                if let Err(err) = self.engine.delete_by_key(index, &key) {
                    tracing::error!(module.key = %key, index = %index, error = %err, "delete failed");
                    ok = false;
                }
            }
            if ok {
                deleted += 1;
            }
        }
        deleted
    }

    fn apply_upserts(
        &self,
        changes: &IndexMap<String, String>,
        failure_ledger: &FailureLedger,
    ) -> Result<(usize, usize)> {
        let total = changes.len();
        let mut processed = 0;
        let mut failed = 0;
        for (position, (raw_key, location)) in changes.iter().enumerate() {
            match self.apply_change(raw_key, location, position + 1, total) {
                Ok(()) => processed += 1,
                Err(err) => {
                    tracing::error!(
                        module.key = raw_key.as_str(),
                        error = %err,
                        "module failed, recording for retry"
                    );
                    failure_ledger.record(raw_key, location)?;
                    failed += 1;
                }
            }
        }
        Ok((processed, failed))
    }

    fn apply_change(&self, raw_key: &str, location: &str, position: usize, total: usize) -> Result<()> {
        let key = ModuleKey::parse(raw_key)?;
        tracing::info!(
            module = %key.name_revision(),
            position,
            total,
            "indexing module"
        );
        let path = Path::new(location);
        self.source.ensure_local(&key, path)?;
        let documents = self.transform.transform(&key, path)?;
        for document in &documents {
            self.engine.upsert(document.target(), document)?;
        }
        Ok(())
    }
}

//! Corpus-vs-index reconciliation.
//!
//! An offline audit for silent data loss: any corpus file that is neither
//! retrievable from the primary index nor recorded in the change or failure
//! ledger has fallen through the pipeline unnoticed. The reconciler only
//! reports: blind re-indexing of a gap can mask an upstream ingestion bug,
//! so repair stays a separately-gated action driven by the report.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::Config;
use crate::engine::{Index, IndexEngine};
use crate::error::{Result, SyncError};
use crate::key::{ModuleKey, validate_revision};
use crate::ledger::{ChangeLedger, FailureLedger};

#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Corpus files with no index document and no ledger entry.
    pub missing: Vec<PathBuf>,
    pub scanned: usize,
    /// Files whose key is recorded in a ledger (in flight or known-failed).
    pub known_pending: usize,
    pub indexed: usize,
}

pub struct Reconciler<'a, E> {
    config: &'a Config,
    engine: &'a E,
}

impl<'a, E: IndexEngine> Reconciler<'a, E> {
    #[must_use]
    pub fn new(config: &'a Config, engine: &'a E) -> Self {
        Self { config, engine }
    }

    pub fn run(&self) -> Result<ReconcileReport> {
        let changes = ChangeLedger::new(&self.config.change_ledger).load()?;
        let failures = FailureLedger::new(&self.config.failure_ledger).load()?;
        // Ledger keys carry the organization; corpus filenames do not, so
        // membership is compared on the normalized name@revision composite.
        let known: HashSet<String> = changes
            .keys()
            .chain(failures.keys())
            .filter_map(|raw| ModuleKey::parse(raw).ok())
            .map(|key| key.name_revision())
            .collect();

        let mut report = ReconcileReport::default();
        for entry in WalkDir::new(&self.config.corpus_dir) {
            let entry = entry.map_err(|err| SyncError::Io(std::io::Error::other(err)))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some((name, revision)) = module_file_key(entry.path()) else {
                continue;
            };
            report.scanned += 1;

            let name_revision = format!("{name}@{revision}");
            if known.contains(&name_revision) {
                report.known_pending += 1;
                continue;
            }
            let key = ModuleKey {
                name,
                revision,
                organization: String::new(),
            };
            if self
                .engine
                .get_by_key(Index::Modules, &key)?
                .is_some()
            {
                report.indexed += 1;
                continue;
            }
            tracing::warn!(
                module = name_revision.as_str(),
                path = %entry.path().display(),
                "module missing from index and ledgers"
            );
            report.missing.push(entry.path().to_path_buf());
        }

        tracing::info!(
            scanned = report.scanned,
            indexed = report.indexed,
            known_pending = report.known_pending,
            missing = report.missing.len(),
            "reconciliation finished"
        );
        Ok(report)
    }
}

/// Derive (name, normalized revision) from a `name@revision.yang` corpus
/// filename. A file without a revision component gets the unset sentinel.
fn module_file_key(path: &Path) -> Option<(String, String)> {
    if path.extension().is_none_or(|ext| ext != "yang") {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    match stem.split_once('@') {
        Some((name, revision)) if !name.is_empty() => {
            Some((name.to_string(), validate_revision(revision)))
        }
        Some(_) => None,
        None => Some((stem.to_string(), validate_revision(""))),
    }
}

//! Crate-wide error type and `Result` alias.
//!
//! Errors fall into three tiers that are expressed at the call sites rather
//! than in the type: process-fatal (propagated with `?` out of the run),
//! item-level (logged, recorded into the failure ledger, batch continues) and
//! best-effort no-ops (absent-document deletes, index-already-exists).

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Ledger file exists but cannot be read or reinitialized.
    #[error("ledger {path:?} unusable: {reason}")]
    Ledger { path: PathBuf, reason: String },

    #[error("config {path:?} unreadable: {reason}")]
    Config { path: PathBuf, reason: String },

    /// Lock marker creation itself failed. Distinct from "already locked",
    /// which is reported as `acquire() == false`, not as an error.
    #[error("lock marker could not be created: {reason}")]
    Lock { reason: String },

    #[error("invalid module key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// Index engine transport or protocol fault that survived the retry
    /// budget.
    #[error("index engine: {reason}")]
    Engine { reason: String },

    #[error("index engine returned status {status} for {context}")]
    EngineStatus { status: u16, context: String },

    /// The recorded content path is absent and the remote catalog lookup
    /// could not materialize it. Always item-level.
    #[error("unable to retrieve content of {key}: {reason}")]
    ContentUnavailable { key: String, reason: String },

    /// Statement-tree transform failed for one module. Always item-level.
    #[error("transform failed for {key}: {reason}")]
    Transform { key: String, reason: String },
}

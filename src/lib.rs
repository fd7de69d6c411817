#![deny(clippy::all, clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::module_name_repetitions)]
//
// Documentation lints: internal/self-documenting functions don't need
// extensive docs; public APIs still carry proper documentation.
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
//
// Batch-pipeline orchestration naturally produces long linear functions;
// breaking the run protocol up would hurt readability.
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::return_self_not_must_use)]
//
// Trait impls keep Result signatures even where an implementation cannot
// currently fail, so error conditions can be added without breaking the API.
#![allow(clippy::unnecessary_wraps)]

//! Change-ledger-driven index synchronization for a module catalog.
//!
//! An upstream ingestion process records pending work into small JSON
//! ledgers: a change ledger (module key -> content path) and a delete ledger
//! (list of keys). The [`sync::Synchronizer`] drains both in one locked,
//! linear run (deletes before upserts, per-item failure isolation into a
//! failure ledger, ledger backup before truncation) and applies the result
//! to an external multi-index search engine behind the
//! [`engine::IndexEngine`] trait. The [`reconcile::Reconciler`] is the
//! read-only audit that catches anything the pipeline silently lost.

/// The yindex-sync crate version (matches `Cargo.toml`).
pub const YINDEX_SYNC_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod config;
pub mod engine;
pub mod error;
pub mod key;
pub mod ledger;
pub mod lock;
mod net;
pub mod reconcile;
pub mod resolve;
pub mod sync;
pub mod transform;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use engine::{
    AutocompleteDocument, HttpIndexEngine, Index, IndexDocument, IndexEngine, ModuleDocument,
    StatementDocument,
};
pub use error::{Result, SyncError};
pub use key::{ModuleKey, UNSET_REVISION, validate_revision};
pub use ledger::{ChangeLedger, DeleteLedger, FailureLedger};
pub use lock::{LockOwner, RunLock};
pub use reconcile::{ReconcileReport, Reconciler};
pub use resolve::{CatalogContentSource, ContentSource};
pub use sync::{RunOutcome, RunSummary, Synchronizer};
pub use transform::{JsonTreeTransform, ModuleTransform, ModuleTree, StatementNode, build_documents};

//! Index engine capability surface.
//!
//! The synchronizer and reconciler talk to the search engine only through
//! [`IndexEngine`]. The index set is a closed enum so adding an index is a
//! compile-time-checked change at every call site, and every document
//! variant carries the full module key so it can be located for update or
//! delete later.

mod http;

pub use http::HttpIndexEngine;

use std::fmt;

use serde::Serialize;

use crate::error::Result;
use crate::key::ModuleKey;

/// The fixed set of indices the pipeline maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Index {
    /// Primary catalog index, one document per module.
    Modules,
    /// Denormalized per-statement index ("yindex").
    Statements,
    /// Typeahead completion index.
    Autocomplete,
}

impl Index {
    pub const ALL: [Index; 3] = [Index::Modules, Index::Statements, Index::Autocomplete];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Index::Modules => "modules",
            Index::Statements => "yindex",
            Index::Autocomplete => "autocomplete",
        }
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Catalog document for the primary index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleDocument {
    pub name: String,
    pub revision: String,
    pub organization: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Hash of the raw module text, for drift detection.
    pub content_hash: String,
}

/// One denormalized statement row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementDocument {
    pub name: String,
    pub revision: String,
    pub organization: String,
    /// Slash-joined path from the module root to this statement.
    pub path: String,
    /// Statement keyword (`container`, `leaf`, ...).
    pub statement: String,
    pub argument: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Name-completion document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AutocompleteDocument {
    pub name: String,
    pub revision: String,
    pub organization: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum IndexDocument {
    Module(ModuleDocument),
    Statement(StatementDocument),
    Autocomplete(AutocompleteDocument),
}

impl IndexDocument {
    #[must_use]
    pub fn target(&self) -> Index {
        match self {
            IndexDocument::Module(_) => Index::Modules,
            IndexDocument::Statement(_) => Index::Statements,
            IndexDocument::Autocomplete(_) => Index::Autocomplete,
        }
    }

    #[must_use]
    pub fn key(&self) -> ModuleKey {
        let (name, revision, organization) = match self {
            IndexDocument::Module(d) => (&d.name, &d.revision, &d.organization),
            IndexDocument::Statement(d) => (&d.name, &d.revision, &d.organization),
            IndexDocument::Autocomplete(d) => (&d.name, &d.revision, &d.organization),
        };
        ModuleKey {
            name: name.clone(),
            revision: revision.clone(),
            organization: organization.clone(),
        }
    }

    /// Stable engine document id. Statement ids append the statement path so
    /// a module's rows are individually addressable; re-upserting a module
    /// overwrites rather than duplicates.
    #[must_use]
    pub fn doc_id(&self) -> String {
        let key = self.key();
        let base = format!("{}@{}:{}", key.name, key.revision, key.organization);
        match self {
            IndexDocument::Statement(d) => format!("{base}:{}", d.path.replace('/', ".")),
            _ => base,
        }
    }
}

/// Capability surface over the external search engine.
///
/// Every operation must be safe against an index that does not yet exist:
/// reads report "absent" (`false`, `None`, `0`), deletes are no-ops, and no
/// transport fault propagates uncaught for that case. `get_by_key` with an
/// empty organization matches on name and revision alone (the reconciler
/// derives keys from filenames, which carry no organization).
pub trait IndexEngine {
    fn index_exists(&self, index: Index) -> Result<bool>;
    fn create_index(&self, index: Index) -> Result<()>;
    fn upsert(&self, index: Index, document: &IndexDocument) -> Result<()>;
    fn delete_by_key(&self, index: Index, key: &ModuleKey) -> Result<()>;
    fn get_by_key(&self, index: Index, key: &ModuleKey) -> Result<Option<serde_json::Value>>;
    fn count(&self, index: Index) -> Result<u64>;
}

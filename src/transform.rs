//! Module-to-document transform.
//!
//! The upstream extractor writes one JSON statement tree per module into the
//! ytree directory. The transform turns a resolved module (raw text plus
//! tree) into the full document set: one catalog document, one autocomplete
//! document, and one statement document per node of the tree. Module trees
//! nest tens of thousands of statements deep in the worst case, so the
//! flattening walks an explicit worklist instead of recursing.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::config::Config;
use crate::engine::{AutocompleteDocument, IndexDocument, ModuleDocument, StatementDocument};
use crate::error::{Result, SyncError};
use crate::key::ModuleKey;

#[derive(Debug, Clone, Deserialize)]
pub struct StatementNode {
    /// Statement keyword (`container`, `leaf`, `rpc`, ...).
    pub statement: String,
    pub argument: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub children: Vec<StatementNode>,
}

/// Root of an extracted statement tree file.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleTree {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub statements: Vec<StatementNode>,
}

pub trait ModuleTransform {
    /// Produce the index document set for one resolved module.
    fn transform(&self, key: &ModuleKey, content_path: &Path) -> Result<Vec<IndexDocument>>;
}

/// Transform backed by upstream-extracted JSON trees.
#[derive(Debug)]
pub struct JsonTreeTransform {
    ytree_dir: PathBuf,
}

impl JsonTreeTransform {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            ytree_dir: config.ytree_dir.clone(),
        }
    }

    fn read_tree(&self, key: &ModuleKey) -> Result<ModuleTree> {
        let path = self.ytree_dir.join(format!("{}.json", key.name_revision()));
        let failed = |reason: String| SyncError::Transform {
            key: key.to_string(),
            reason,
        };
        let bytes = fs_err::read(&path).map_err(|err| failed(err.to_string()))?;
        serde_json::from_slice(&bytes)
            .map_err(|err| failed(format!("{}: {err}", path.display())))
    }
}

impl ModuleTransform for JsonTreeTransform {
    fn transform(&self, key: &ModuleKey, content_path: &Path) -> Result<Vec<IndexDocument>> {
        let raw = fs_err::read(content_path).map_err(|err| SyncError::Transform {
            key: key.to_string(),
            reason: err.to_string(),
        })?;
        let content_hash = blake3::hash(&raw).to_hex().to_string();
        let tree = self.read_tree(key)?;
        Ok(build_documents(key, &tree, content_hash))
    }
}

/// Flatten a statement tree into the per-module document set.
///
/// Depth-first over an explicit stack; a pathological chain of nested
/// statements costs heap, not call frames.
#[must_use]
pub fn build_documents(key: &ModuleKey, tree: &ModuleTree, content_hash: String) -> Vec<IndexDocument> {
    let mut documents = vec![
        IndexDocument::Module(ModuleDocument {
            name: key.name.clone(),
            revision: key.revision.clone(),
            organization: key.organization.clone(),
            description: tree.description.clone(),
            content_hash,
        }),
        IndexDocument::Autocomplete(AutocompleteDocument {
            name: key.name.clone(),
            revision: key.revision.clone(),
            organization: key.organization.clone(),
        }),
    ];

    let mut stack: Vec<(&StatementNode, String)> = tree
        .statements
        .iter()
        .rev()
        .map(|node| (node, key.name.clone()))
        .collect();
    while let Some((node, parent_path)) = stack.pop() {
        let path = format!("{parent_path}/{}", node.argument);
        documents.push(IndexDocument::Statement(StatementDocument {
            name: key.name.clone(),
            revision: key.revision.clone(),
            organization: key.organization.clone(),
            path: path.clone(),
            statement: node.statement.clone(),
            argument: node.argument.clone(),
            description: node.description.clone(),
        }));
        for child in node.children.iter().rev() {
            stack.push((child, path.clone()));
        }
    }
    documents
}

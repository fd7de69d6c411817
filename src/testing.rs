//! In-memory fakes shared by the unit tests.
#![allow(clippy::must_use_candidate)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use indexmap::IndexMap;
use serde_json::Value;

use crate::config::Config;
use crate::engine::{Index, IndexDocument, IndexEngine};
use crate::error::{Result, SyncError};
use crate::key::ModuleKey;
use crate::resolve::ContentSource;
use crate::transform::{ModuleTransform, ModuleTree, build_documents};

pub(crate) fn test_config(root: &Path) -> Config {
    Config {
        corpus_dir: root.join("corpus"),
        ytree_dir: root.join("ytrees"),
        change_ledger: root.join("changes.json"),
        delete_ledger: root.join("deletes.json"),
        failure_ledger: root.join("changes.json.failed"),
        lock_file: root.join("sync.lock"),
        cron_lock_file: root.join("sync-cron.lock"),
        catalog_api_url: "http://127.0.0.1:1/api".to_string(),
        engine_url: "http://127.0.0.1:1".to_string(),
        retry_failed: false,
        http_timeout_secs: 1,
        http_retries: 0,
    }
}

#[derive(Default)]
struct MemoryEngineState {
    created: HashSet<Index>,
    documents: HashMap<Index, IndexMap<String, Value>>,
}

/// Engine fake mirroring the adapter contract: reads against an absent
/// index report "absent", deletes are idempotent.
#[derive(Default)]
pub(crate) struct MemoryEngine {
    state: Mutex<MemoryEngineState>,
}

impl MemoryEngine {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn document_count(&self, index: Index) -> usize {
        let state = self.state.lock().expect("engine state");
        state.documents.get(&index).map_or(0, IndexMap::len)
    }
}

fn matches_key(value: &Value, key: &ModuleKey) -> bool {
    value["name"] == key.name.as_str()
        && value["revision"] == key.revision.as_str()
        && (key.organization.is_empty() || value["organization"] == key.organization.as_str())
}

impl IndexEngine for MemoryEngine {
    fn index_exists(&self, index: Index) -> Result<bool> {
        Ok(self.state.lock().expect("engine state").created.contains(&index))
    }

    fn create_index(&self, index: Index) -> Result<()> {
        self.state.lock().expect("engine state").created.insert(index);
        Ok(())
    }

    fn upsert(&self, index: Index, document: &IndexDocument) -> Result<()> {
        let value = serde_json::to_value(document).expect("serialize document");
        self.state
            .lock()
            .expect("engine state")
            .documents
            .entry(index)
            .or_default()
            .insert(document.doc_id(), value);
        Ok(())
    }

    fn delete_by_key(&self, index: Index, key: &ModuleKey) -> Result<()> {
        let mut state = self.state.lock().expect("engine state");
        if let Some(documents) = state.documents.get_mut(&index) {
            documents.retain(|_, value| !matches_key(value, key));
        }
        Ok(())
    }

    fn get_by_key(&self, index: Index, key: &ModuleKey) -> Result<Option<Value>> {
        let state = self.state.lock().expect("engine state");
        Ok(state
            .documents
            .get(&index)
            .and_then(|documents| documents.values().find(|value| matches_key(value, key)))
            .cloned())
    }

    fn count(&self, index: Index) -> Result<u64> {
        Ok(self.document_count(index) as u64)
    }
}

/// Engine whose every call fails, for fatal-initialization tests.
pub(crate) struct FailingEngine;

impl IndexEngine for FailingEngine {
    fn index_exists(&self, _index: Index) -> Result<bool> {
        Err(SyncError::Engine {
            reason: "engine unreachable".to_string(),
        })
    }

    fn create_index(&self, _index: Index) -> Result<()> {
        Err(SyncError::Engine {
            reason: "engine unreachable".to_string(),
        })
    }

    fn upsert(&self, _index: Index, _document: &IndexDocument) -> Result<()> {
        Err(SyncError::Engine {
            reason: "engine unreachable".to_string(),
        })
    }

    fn delete_by_key(&self, _index: Index, _key: &ModuleKey) -> Result<()> {
        Err(SyncError::Engine {
            reason: "engine unreachable".to_string(),
        })
    }

    fn get_by_key(&self, _index: Index, _key: &ModuleKey) -> Result<Option<Value>> {
        Err(SyncError::Engine {
            reason: "engine unreachable".to_string(),
        })
    }

    fn count(&self, _index: Index) -> Result<u64> {
        Err(SyncError::Engine {
            reason: "engine unreachable".to_string(),
        })
    }
}

/// Content source that only accepts already-materialized files.
pub(crate) struct LocalContentSource;

impl ContentSource for LocalContentSource {
    fn ensure_local(&self, key: &ModuleKey, path: &Path) -> Result<()> {
        if path.is_file() {
            Ok(())
        } else {
            Err(SyncError::ContentUnavailable {
                key: key.to_string(),
                reason: format!("{} not present", path.display()),
            })
        }
    }
}

/// Transform fake: records which (key, path) pairs it saw and fails on
/// demand, producing a minimal document set otherwise.
#[derive(Default)]
pub(crate) struct RecordingTransform {
    fail_keys: HashSet<String>,
    seen: Mutex<Vec<(String, PathBuf)>>,
}

impl RecordingTransform {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing_on(mut self, key: &str) -> Self {
        self.fail_keys.insert(key.to_string());
        self
    }

    pub(crate) fn seen_paths(&self) -> Vec<PathBuf> {
        self.seen
            .lock()
            .expect("seen")
            .iter()
            .map(|(_, path)| path.clone())
            .collect()
    }
}

impl ModuleTransform for RecordingTransform {
    fn transform(&self, key: &ModuleKey, content_path: &Path) -> Result<Vec<IndexDocument>> {
        if self.fail_keys.contains(&key.to_string()) {
            return Err(SyncError::Transform {
                key: key.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        self.seen
            .lock()
            .expect("seen")
            .push((key.to_string(), content_path.to_path_buf()));
        let tree = ModuleTree {
            description: None,
            statements: Vec::new(),
        };
        Ok(build_documents(key, &tree, "test-hash".to_string()))
    }
}

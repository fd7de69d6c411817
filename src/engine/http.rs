//! HTTP adapter for an Elasticsearch/OpenSearch-style engine.
//!
//! Endpoint mapping: `HEAD /{index}` for existence, `PUT /{index}` for
//! creation (already-exists is a steady-state no-op), `PUT /{index}/_doc/{id}`
//! for upserts, `_delete_by_query` on the key fields for deletes,
//! `_search` with size 1 for key lookups and `_count` for counts. A 404 on
//! any read or delete means "index absent" and is reported as such, never as
//! a fault.

use serde_json::{Value, json};

use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::key::ModuleKey;
use crate::net::send_with_retry;

use super::{Index, IndexDocument, IndexEngine};

#[derive(Debug)]
pub struct HttpIndexEngine {
    base_url: String,
    client: reqwest::blocking::Client,
    retries: u32,
}

impl HttpIndexEngine {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|err| SyncError::Engine {
                reason: format!("client construction: {err}"),
            })?;
        Ok(Self {
            base_url: config.engine_url.trim_end_matches('/').to_string(),
            client,
            retries: config.http_retries,
        })
    }

    fn url(&self, index: Index, suffix: &str) -> String {
        if suffix.is_empty() {
            format!("{}/{}", self.base_url, index.name())
        } else {
            format!("{}/{}/{}", self.base_url, index.name(), suffix)
        }
    }
}

/// Bool query matching a module key. An empty organization matches on name
/// and revision alone.
pub(crate) fn key_query(key: &ModuleKey) -> Value {
    let mut must = vec![
        json!({"term": {"name": key.name}}),
        json!({"term": {"revision": key.revision}}),
    ];
    if !key.organization.is_empty() {
        must.push(json!({"term": {"organization": key.organization}}));
    }
    json!({"query": {"bool": {"must": must}}})
}

impl IndexEngine for HttpIndexEngine {
    fn index_exists(&self, index: Index) -> Result<bool> {
        let url = self.url(index, "");
        let response = send_with_retry("index_exists", self.retries, || self.client.head(&url))?;
        match response.status().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            status => Err(SyncError::EngineStatus {
                status,
                context: format!("HEAD {url}"),
            }),
        }
    }

    fn create_index(&self, index: Index) -> Result<()> {
        let url = self.url(index, "");
        let response = send_with_retry("create_index", self.retries, || self.client.put(&url))?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        // Racing creators are expected steady state, not an error.
        if status.as_u16() == 400 {
            tracing::debug!(index = %index, "index already exists");
            return Ok(());
        }
        Err(SyncError::EngineStatus {
            status: status.as_u16(),
            context: format!("PUT {url}"),
        })
    }

    fn upsert(&self, index: Index, document: &IndexDocument) -> Result<()> {
        let url = self.url(index, &format!("_doc/{}", document.doc_id()));
        let response = send_with_retry("upsert", self.retries, || {
            self.client.put(&url).json(document)
        })?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(SyncError::EngineStatus {
                status: status.as_u16(),
                context: format!("PUT {url}"),
            })
        }
    }

    fn delete_by_key(&self, index: Index, key: &ModuleKey) -> Result<()> {
        let url = self.url(index, "_delete_by_query");
        let body = key_query(key);
        let response = send_with_retry("delete_by_key", self.retries, || {
            self.client.post(&url).json(&body)
        })?;
        let status = response.status();
        // Absent index or absent documents: best-effort idempotent delete.
        if status.is_success() || status.as_u16() == 404 {
            Ok(())
        } else {
            Err(SyncError::EngineStatus {
                status: status.as_u16(),
                context: format!("POST {url}"),
            })
        }
    }

    fn get_by_key(&self, index: Index, key: &ModuleKey) -> Result<Option<Value>> {
        let url = self.url(index, "_search");
        let mut body = key_query(key);
        body["size"] = json!(1);
        let response = send_with_retry("get_by_key", self.retries, || {
            self.client.post(&url).json(&body)
        })?;
        let status = response.status();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(SyncError::EngineStatus {
                status: status.as_u16(),
                context: format!("POST {url}"),
            });
        }
        let payload: Value = response.json().map_err(|err| SyncError::Engine {
            reason: format!("get_by_key decode: {err}"),
        })?;
        Ok(payload["hits"]["hits"]
            .as_array()
            .and_then(|hits| hits.first())
            .map(|hit| hit["_source"].clone()))
    }

    fn count(&self, index: Index) -> Result<u64> {
        let url = self.url(index, "_count");
        let response = send_with_retry("count", self.retries, || self.client.get(&url))?;
        let status = response.status();
        if status.as_u16() == 404 {
            return Ok(0);
        }
        if !status.is_success() {
            return Err(SyncError::EngineStatus {
                status: status.as_u16(),
                context: format!("GET {url}"),
            });
        }
        let payload: Value = response.json().map_err(|err| SyncError::Engine {
            reason: format!("count decode: {err}"),
        })?;
        Ok(payload["count"].as_u64().unwrap_or(0))
    }
}

//! Content resolution for ledger entries.
//!
//! A change-ledger entry records where the module text should live. If the
//! file is already on disk it is used as-is; otherwise the canonical text is
//! looked up in the remote catalog by key, the returned schema reference is
//! dereferenced, and the text is materialized at the recorded path. Failure
//! to resolve content is always item-level.

use std::path::Path;

use serde_json::Value;

use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::key::ModuleKey;
use crate::net::send_with_retry;

pub trait ContentSource {
    /// Ensure the module's content exists at `path`, fetching it if absent.
    fn ensure_local(&self, key: &ModuleKey, path: &Path) -> Result<()>;
}

#[derive(Debug)]
pub struct CatalogContentSource {
    api_url: String,
    client: reqwest::blocking::Client,
    retries: u32,
}

impl CatalogContentSource {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|err| SyncError::Engine {
                reason: format!("client construction: {err}"),
            })?;
        Ok(Self {
            api_url: config.catalog_api_url.trim_end_matches('/').to_string(),
            client,
            retries: config.http_retries,
        })
    }

    fn fetch(&self, key: &ModuleKey, path: &Path) -> Result<()> {
        let unavailable = |reason: String| SyncError::ContentUnavailable {
            key: key.to_string(),
            reason,
        };

        let lookup = format!(
            "{}/search/modules/{},{},{}",
            self.api_url, key.name, key.revision, key.organization
        );
        let detail: Value = send_with_retry("catalog lookup", self.retries, || {
            self.client.get(&lookup)
        })
        .map_err(|err| unavailable(err.to_string()))?
        .json()
        .map_err(|err| unavailable(format!("catalog response decode: {err}")))?;

        let schema = detail["module"]
            .as_array()
            .and_then(|modules| modules.first())
            .and_then(|module| module["schema"].as_str())
            .ok_or_else(|| unavailable("catalog response carries no schema reference".to_string()))?
            .to_string();

        let text = send_with_retry("schema fetch", self.retries, || self.client.get(&schema))
            .map_err(|err| unavailable(err.to_string()))?
            .text()
            .map_err(|err| unavailable(format!("schema body: {err}")))?;

        if let Some(parent) = path.parent() {
            fs_err::create_dir_all(parent).map_err(|err| unavailable(err.to_string()))?;
        }
        fs_err::write(path, text).map_err(|err| unavailable(err.to_string()))?;
        tracing::info!(
            module.key = %key,
            path = %path.display(),
            "content retrieved via catalog schema reference"
        );
        Ok(())
    }
}

impl ContentSource for CatalogContentSource {
    fn ensure_local(&self, key: &ModuleKey, path: &Path) -> Result<()> {
        if path.is_file() {
            return Ok(());
        }
        self.fetch(key, path)
    }
}

//! File-based secret store
//!
//! Secrets live in a single JSON document, `<data>/etc/aft/secrets.json` by
//! default, or the file named by `$AFT_SECRETS_FILE`:
//!
//! ```json
//! { "demo/db": { "value": "...", "updatedAt": "2024-01-01T00:00:00Z" } }
//! ```
//!
//! The file is read on every operation and rewritten on every change. It is
//! not encrypted; protect it with file permissions or keep the data directory
//! on an encrypted volume.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::SecretStore;
use crate::error::{ComposeError, Result};
use aft_core::AftConfig;

/// Overrides the location of the secrets file
pub const SECRETS_FILE_ENV: &str = "AFT_SECRETS_FILE";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSecret {
    value: String,
    updated_at: DateTime<Utc>,
}

pub struct FileSecretStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within the process
    lock: Mutex<()>,
}

impl FileSecretStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// `$AFT_SECRETS_FILE`, else `<data>/etc/aft/secrets.json`
    pub fn default_path(config: &AftConfig) -> PathBuf {
        std::env::var_os(SECRETS_FILE_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                config
                    .paths
                    .data
                    .join("etc")
                    .join("aft")
                    .join("secrets.json")
            })
    }

    pub fn for_config(config: &AftConfig) -> Self {
        Self::new(Self::default_path(config))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<BTreeMap<String, StoredSecret>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(ComposeError::io(&self.path, e)),
        };

        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&content).map_err(|e| {
            ComposeError::store(format!("{} is corrupt: {}", self.path.display(), e))
        })
    }

    async fn write(&self, entries: &BTreeMap<String, StoredSecret>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ComposeError::io(parent, e))?;
        }

        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| ComposeError::store(e.to_string()))?;
        super::write_private(&self.path, json.as_bytes())
            .await
            .map_err(|e| ComposeError::io(&self.path, e))
    }
}

#[async_trait]
impl SecretStore for FileSecretStore {
    async fn get(&self, path: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.read().await?.remove(path).map(|s| s.value))
    }

    async fn set(&self, path: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read().await?;
        entries.insert(
            path.to_string(),
            StoredSecret {
                value: value.to_string(),
                updated_at: Utc::now(),
            },
        );
        self.write(&entries).await
    }

    async fn remove(&self, path: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read().await?;
        if entries.remove(path).is_some() {
            self.write(&entries).await?;
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.read().await?.into_keys().collect())
    }
}

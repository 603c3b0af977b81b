//! Secret stores
//!
//! Secrets are addressed by a path such as `demo/db`. Two backends exist:
//! - **File** (default): a JSON document on disk
//! - **Memory**: in-process map with operation counters, for tests

mod file;
mod memory;

pub use file::{FileSecretStore, SECRETS_FILE_ENV};
pub use memory::{MemorySecretStore, StoreOperationCounts};

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tokio::io::AsyncWriteExt;

use crate::error::Result;

/// Key to secret map
///
/// Implementations must be Send + Sync for use across async tasks.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Value stored under `path`, if any
    async fn get(&self, path: &str) -> Result<Option<String>>;

    /// Create or replace the value under `path`
    async fn set(&self, path: &str, value: &str) -> Result<()>;

    /// Remove `path`; removing a missing entry is not an error
    async fn remove(&self, path: &str) -> Result<()>;

    /// All stored paths, sorted
    async fn list(&self) -> Result<Vec<String>>;

    /// Whether a non-empty value exists under `path`
    async fn contains(&self, path: &str) -> Result<bool> {
        Ok(self
            .get(path)
            .await?
            .map(|v| !v.is_empty())
            .unwrap_or(false))
    }
}

/// Write `content` to `path`, readable by the owner only
pub(crate) async fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(content).await?;
    file.flush().await?;

    // mode only applies on creation
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }
    Ok(())
}

/// One record of a secrets import document
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SecretRecord {
    pub path: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: Vec<String>,
    /// Paths left alone because they already had a value
    pub skipped: Vec<String>,
}

/// Write records into the store, keeping existing values unless `overwrite`
pub async fn import_secrets(
    store: &dyn SecretStore,
    records: &[SecretRecord],
    overwrite: bool,
) -> Result<ImportReport> {
    let mut report = ImportReport::default();

    for record in records {
        if record.path.trim().is_empty() {
            tracing::warn!("skipping secret record without a path");
            continue;
        }

        if !overwrite && store.contains(&record.path).await? {
            tracing::debug!(path = %record.path, "secret exists, skipping");
            report.skipped.push(record.path.clone());
            continue;
        }

        store.set(&record.path, &record.password).await?;
        report.imported.push(record.path.clone());
    }

    Ok(report)
}

//! Package cache
//!
//! Remembers where each service was rendered from and to. Persisted as
//! `{ "entries": [...] }` in `<config>/aft.cache` and rewritten in full after
//! every successful render.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result, read_to_string, write_string};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageCacheEntry {
    /// Resolved service name
    pub name: String,
    pub version: String,
    pub package_dir: PathBuf,
    pub compose_dir: PathBuf,
    /// Value files in the order they were applied
    #[serde(default)]
    pub values_files: Vec<PathBuf>,
    pub secrets_file: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct CacheDocument {
    #[serde(default)]
    entries: Vec<PackageCacheEntry>,
}

/// Result of [`PackageCache::upsert`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertKind {
    Inserted,
    Updated,
}

#[derive(Debug, Clone)]
pub struct PackageCache {
    path: PathBuf,
    document: CacheDocument,
}

impl PackageCache {
    /// Load the cache, creating an empty file when it does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            let cache = Self {
                path,
                document: CacheDocument::default(),
            };
            cache.persist()?;
            return Ok(cache);
        }

        let content = read_to_string(&path)?;
        let document = if content.trim().is_empty() {
            CacheDocument::default()
        } else {
            serde_json::from_str(&content).map_err(|e| CoreError::parse(&path, e.to_string()))?
        };

        Ok(Self { path, document })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[PackageCacheEntry] {
        &self.document.entries
    }

    pub fn find_by_name(&self, name: &str) -> Option<&PackageCacheEntry> {
        self.document.entries.iter().find(|e| e.name == name)
    }

    /// Latest entry rendered from `package_dir`
    pub fn find_by_package_dir(&self, package_dir: &Path) -> Option<&PackageCacheEntry> {
        self.document
            .entries
            .iter()
            .rev()
            .find(|e| e.package_dir == package_dir)
    }

    /// Insert the entry, or overwrite the one with the same name
    pub fn upsert(&mut self, entry: PackageCacheEntry) -> UpsertKind {
        match self.document.entries.iter_mut().find(|e| e.name == entry.name) {
            Some(existing) => {
                *existing = entry;
                UpsertKind::Updated
            }
            None => {
                self.document.entries.push(entry);
                UpsertKind::Inserted
            }
        }
    }

    /// Rewrite the whole cache file
    pub fn persist(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.document)?;
        write_string(&self.path, &content)?;
        tracing::debug!(path = %self.path.display(), entries = self.document.entries.len(), "saved package cache");
        Ok(())
    }
}

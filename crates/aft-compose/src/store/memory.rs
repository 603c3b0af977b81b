//! In-memory secret store
//!
//! Useful for unit tests: nothing touches the disk and every operation is
//! counted so tests can assert that a run performed no extra writes.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::SecretStore;
use crate::error::Result;

#[derive(Clone, Default)]
pub struct MemorySecretStore {
    entries: Arc<RwLock<BTreeMap<String, String>>>,
    operations: Arc<RwLock<StoreOperationCounts>>,
}

/// Counts of operations performed, for test assertions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StoreOperationCounts {
    pub gets: usize,
    pub sets: usize,
    pub removes: usize,
    pub lists: usize,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with pre-populated entries
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            entries: Arc::new(RwLock::new(map)),
            operations: Arc::default(),
        }
    }

    pub async fn operation_counts(&self) -> StoreOperationCounts {
        self.operations.read().await.clone()
    }

    pub async fn reset_counts(&self) {
        *self.operations.write().await = StoreOperationCounts::default();
    }

    /// Snapshot of every entry, without counting as an operation
    pub async fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get(&self, path: &str) -> Result<Option<String>> {
        self.operations.write().await.gets += 1;
        Ok(self.entries.read().await.get(path).cloned())
    }

    async fn set(&self, path: &str, value: &str) -> Result<()> {
        self.operations.write().await.sets += 1;
        self.entries
            .write()
            .await
            .insert(path.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<()> {
        self.operations.write().await.removes += 1;
        self.entries.write().await.remove(path);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        self.operations.write().await.lists += 1;
        Ok(self.entries.read().await.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_remove() {
        let store = MemorySecretStore::new();

        store.set("demo/db", "pw").await.unwrap();
        assert_eq!(store.get("demo/db").await.unwrap().as_deref(), Some("pw"));

        store.remove("demo/db").await.unwrap();
        assert!(store.get("demo/db").await.unwrap().is_none());
        store.remove("demo/db").await.unwrap();

        let counts = store.operation_counts().await;
        assert_eq!(counts.sets, 1);
        assert_eq!(counts.gets, 2);
        assert_eq!(counts.removes, 2);
    }

    #[tokio::test]
    async fn test_list_sorted() {
        let store = MemorySecretStore::with_entries([("b/x", "1"), ("a/y", "2")]);
        assert_eq!(store.list().await.unwrap(), vec!["a/y", "b/x"]);
    }

    #[tokio::test]
    async fn test_contains_ignores_empty() {
        let store = MemorySecretStore::with_entries([("empty", ""), ("full", "v")]);
        assert!(!store.contains("empty").await.unwrap());
        assert!(store.contains("full").await.unwrap());
        assert!(!store.contains("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = MemorySecretStore::new();
        let other = store.clone();
        other.set("k", "v").await.unwrap();

        assert_eq!(store.snapshot().await.len(), 1);
        assert_eq!(store.operation_counts().await.sets, 1);

        store.reset_counts().await;
        assert_eq!(store.operation_counts().await, StoreOperationCounts::default());
    }
}

//! Shared state for every pipeline operation

use std::path::PathBuf;
use std::sync::Arc;

use crate::store::{FileSecretStore, SecretStore};
use crate::tools::{SOPS, SystemToolRunner, ToolRunner};
use aft_core::{AftConfig, paths};
use aft_engine::Engine;

/// Configuration plus the collaborators an operation talks to
#[derive(Clone)]
pub struct ExecutionContext {
    pub config: AftConfig,
    pub store: Arc<dyn SecretStore>,
    pub tools: Arc<dyn ToolRunner>,
    pub engine: Engine,
}

/// What sops needs to encrypt or decrypt an env file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encryption {
    pub recipient: String,
    pub key_file: PathBuf,
}

impl ExecutionContext {
    pub fn new(
        config: AftConfig,
        store: Arc<dyn SecretStore>,
        tools: Arc<dyn ToolRunner>,
    ) -> Self {
        Self {
            config,
            store,
            tools,
            engine: Engine::default(),
        }
    }

    /// File-backed store and real subprocesses
    pub fn for_config(config: AftConfig) -> Self {
        let store = Arc::new(FileSecretStore::for_config(&config));
        Self::new(config, store, Arc::new(SystemToolRunner::new()))
    }

    /// `<data>/etc/aft/<service>`
    pub fn compose_dir(&self, service: &str) -> PathBuf {
        paths::compose_dir(&self.config.paths.data, service)
    }

    /// sops settings, when encryption is enabled, configured and installed
    pub async fn encryption(&self) -> Option<Encryption> {
        let recipient = self.config.sops.recipient()?;

        if self.tools.which(SOPS).await.is_none() {
            tracing::warn!("sops is not installed, env files stay unencrypted");
            return None;
        }

        Some(Encryption {
            recipient: recipient.to_string(),
            key_file: self.config.age_key_path(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySecretStore;
    use crate::tools::MockToolRunner;

    fn context(recipient: Option<&str>, tools: MockToolRunner) -> ExecutionContext {
        let mut config = AftConfig::default();
        config.paths.config = PathBuf::from("/cfg");
        config.paths.data = PathBuf::from("/data");
        config.sops.recipient = recipient.map(str::to_string);
        ExecutionContext::new(config, Arc::new(MemorySecretStore::new()), Arc::new(tools))
    }

    #[tokio::test]
    async fn test_encryption_requires_recipient() {
        let ctx = context(None, MockToolRunner::new());
        assert!(ctx.encryption().await.is_none());
    }

    #[tokio::test]
    async fn test_encryption_requires_sops() {
        let tools = MockToolRunner::new();
        tools.set_missing(SOPS).await;
        let ctx = context(Some("age1abc"), tools);
        assert!(ctx.encryption().await.is_none());
    }

    #[tokio::test]
    async fn test_encryption_enabled() {
        let ctx = context(Some("age1abc"), MockToolRunner::new());
        assert_eq!(
            ctx.encryption().await,
            Some(Encryption {
                recipient: "age1abc".to_string(),
                key_file: PathBuf::from("/cfg/age.key"),
            })
        );
        assert_eq!(ctx.compose_dir("demo"), PathBuf::from("/data/etc/aft/demo"));
    }
}

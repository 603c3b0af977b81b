//! aft configuration
//!
//! Stored as JSON in `<config dir>/aft.config`. A default file is written
//! the first time the configuration is loaded.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result, read_to_string, write_string};
use crate::paths;
use crate::values::Values;

/// Configuration file name
pub const CONFIG_FILE: &str = "aft.config";

/// Package cache file name
pub const CACHE_FILE: &str = "aft.cache";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AftConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub sops: SopsConfig,

    /// Values merged into every render context before anything else
    #[serde(default)]
    pub defaults: DefaultsConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub mkcert: MkcertConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathsConfig {
    /// Root of rendered output, volumes and installed packages
    pub data: PathBuf,

    /// Location of the config, cache and key files
    pub config: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data: paths::user_data_dir(),
            config: paths::user_config_dir(),
        }
    }
}

/// Encryption of `.env` files at rest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SopsConfig {
    pub enabled: bool,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
}

impl Default for SopsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: "age".to_string(),
            recipient: None,
        }
    }
}

impl SopsConfig {
    /// Encryption is requested and has somewhere to encrypt to
    pub fn recipient(&self) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        self.recipient.as_deref().map(str::trim).filter(|r| !r.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultsConfig {
    pub dns: DnsConfig,
    pub tz: String,
    pub puid: u32,
    pub pgid: u32,
    #[serde(default)]
    pub networks: BTreeMap<String, DefaultNetwork>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        let mut networks = BTreeMap::new();
        networks.insert(
            "default".to_string(),
            DefaultNetwork {
                cidr: [172, 19, 0, 0],
                name: "aft".to_string(),
            },
        );

        Self {
            dns: DnsConfig::default(),
            tz: "UTC".to_string(),
            puid: 0,
            pgid: 0,
            networks,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsConfig {
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdomain: Option<String>,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            domain: "aft.bearz.casa".to_string(),
            subdomain: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultNetwork {
    pub cidr: [u8; 4],
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    pub subnet: String,
    pub gateway: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: "aft".to_string(),
            subnet: "172.19.0.0/20".to_string(),
            gateway: "172.19.0.1".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MkcertConfig {
    pub enabled: bool,
    pub domains: Vec<String>,
}

impl Default for MkcertConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            domains: vec![
                "*.aft.bearz.casa".to_string(),
                "aft.bearz.casa".to_string(),
                "localhost".to_string(),
            ],
        }
    }
}

impl AftConfig {
    /// Default configuration file location
    pub fn default_path() -> PathBuf {
        paths::user_config_dir().join(CONFIG_FILE)
    }

    /// Load from the default location, creating it if absent
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load from a specific path, writing defaults there if the file is absent
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            tracing::debug!(path = %path.display(), "created default configuration");
            return Ok(config);
        }

        let content = read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| CoreError::parse(path, e.to_string()))
    }

    /// Save to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    /// Save to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        write_string(path, &content)
    }

    /// Deep merge a JSON document into this configuration
    ///
    /// Sequences in the document replace the configured ones.
    pub fn import_overrides(&mut self, file: &Path) -> Result<()> {
        if !file.exists() {
            return Err(CoreError::FileNotFound {
                path: file.to_path_buf(),
            });
        }

        let overrides = Values::from_file(file)?;
        let mut current = Values(serde_json::to_value(&*self)?);
        current.merge(&overrides);

        *self = serde_json::from_value(current.into_inner())
            .map_err(|e| CoreError::parse(file, e.to_string()))?;
        Ok(())
    }

    /// Location of the package cache file
    pub fn cache_path(&self) -> PathBuf {
        self.paths.config.join(CACHE_FILE)
    }

    /// Directory holding imported packages, `<data>/packages`
    pub fn packages_dir(&self) -> PathBuf {
        self.paths.data.join("packages")
    }

    /// Age private key used by sops
    pub fn age_key_path(&self) -> PathBuf {
        self.paths.config.join("age.key")
    }

    /// Directory receiving locally issued certificates
    pub fn certs_dir(&self) -> PathBuf {
        self.paths.data.join("etc").join("certs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_creates_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let config = AftConfig::load_from(&path).unwrap();

        assert!(path.exists());
        assert_eq!(config.defaults.tz, "UTC");
        assert_eq!(config.network.subnet, "172.19.0.0/20");
        assert_eq!(config.sops.provider, "age");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        let mut config = AftConfig::default();
        config.paths.data = dir.path().join("data");
        config.sops.recipient = Some("age1xyz".to_string());
        config.save_to(&path).unwrap();

        let loaded = AftConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"recipient\": \"age1xyz\""));
    }

    #[test]
    fn test_sops_recipient_requires_enabled() {
        let mut sops = SopsConfig {
            recipient: Some("age1abc".to_string()),
            ..Default::default()
        };
        assert_eq!(sops.recipient(), Some("age1abc"));

        sops.enabled = false;
        assert_eq!(sops.recipient(), None);

        sops.enabled = true;
        sops.recipient = Some("  ".to_string());
        assert_eq!(sops.recipient(), None);
    }

    #[test]
    fn test_import_overrides_merges() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("overrides.json");
        std::fs::write(
            &file,
            r#"{"defaults": {"tz": "Europe/Paris"}, "mkcert": {"domains": ["example.test"]}}"#,
        )
        .unwrap();

        let mut config = AftConfig::default();
        config.import_overrides(&file).unwrap();

        assert_eq!(config.defaults.tz, "Europe/Paris");
        assert_eq!(config.defaults.dns.domain, "aft.bearz.casa");
        assert_eq!(config.mkcert.domains, vec!["example.test".to_string()]);
    }

    #[test]
    fn test_import_overrides_missing_file() {
        let mut config = AftConfig::default();
        let result = config.import_overrides(Path::new("/definitely/not/here.json"));
        assert!(matches!(result, Err(CoreError::FileNotFound { .. })));
    }
}

//! Package definition and loading
//!
//! A package is a directory holding `aft.yaml` and, by convention:
//!
//! ```text
//! mypackage/
//! ├── aft.yaml            # name, version, service, image, ...
//! ├── values.yaml         # default values
//! ├── secrets.yaml        # secret slot declarations (optional)
//! ├── compose.yaml.hbs    # compose manifest template
//! ├── Dockerfile          # optional
//! └── etc/ data/ ...      # optional overlays, one per volume key
//! ```

use semver::Version;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result, read_to_string};
use crate::paths::PACKAGE_FILE;

pub const VALUES_FILE: &str = "values.yaml";
pub const SECRETS_FILE: &str = "secrets.yaml";
pub const COMPOSE_TEMPLATE: &str = "compose.yaml.hbs";
pub const DOCKERFILE: &str = "Dockerfile";

/// Contents of `aft.yaml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageSpec {
    /// Package name (required)
    pub name: String,

    /// Package version (required, SemVer)
    #[serde(with = "version_serde")]
    pub version: Version,

    /// Service name, defaults to `name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,

    /// Container image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Any other fields
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PackageSpec {
    /// Resolved service name
    #[inline]
    pub fn service_name(&self) -> &str {
        self.service
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.name)
    }
}

/// Loaded package with resolved paths
#[derive(Debug, Clone)]
pub struct LoadedPackage {
    /// Package definition
    pub spec: PackageSpec,

    /// Absolute path of `aft.yaml`
    pub file: PathBuf,

    /// Root directory of the package
    pub root: PathBuf,

    pub values_path: PathBuf,
    pub secrets_path: PathBuf,
    pub compose_template_path: PathBuf,
    pub dockerfile_path: PathBuf,
}

impl LoadedPackage {
    /// Load a package from its directory or from a path to its `*.yaml` manifest
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let file = if is_yaml(path) {
            path.to_path_buf()
        } else {
            path.join(PACKAGE_FILE)
        };

        if !file.exists() {
            return Err(CoreError::PackageNotFound {
                path: path.display().to_string(),
            });
        }

        let file = std::path::absolute(&file).map_err(|e| CoreError::io(&file, e))?;
        let content = read_to_string(&file)?;
        let spec: PackageSpec =
            serde_yaml::from_str(&content).map_err(|e| CoreError::parse(&file, e.to_string()))?;

        if spec.name.trim().is_empty() {
            return Err(CoreError::InvalidPackage {
                message: format!("{} has an empty name", file.display()),
            });
        }

        let root = file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            spec,
            values_path: root.join(VALUES_FILE),
            secrets_path: root.join(SECRETS_FILE),
            compose_template_path: root.join(COMPOSE_TEMPLATE),
            dockerfile_path: root.join(DOCKERFILE),
            file,
            root,
        })
    }

    /// Files every importable package must ship
    pub fn required_files(&self) -> [&Path; 3] {
        [
            self.file.as_path(),
            self.compose_template_path.as_path(),
            self.values_path.as_path(),
        ]
    }

    /// Check the package has everything needed to be imported
    pub fn validate_layout(&self) -> Result<()> {
        for file in self.required_files() {
            if !file.exists() {
                return Err(CoreError::InvalidPackage {
                    message: format!(
                        "package {} is missing {}",
                        self.root.display(),
                        file.display()
                    ),
                });
            }
        }
        Ok(())
    }

    /// Shorthand for the resolved service name
    pub fn service_name(&self) -> &str {
        self.spec.service_name()
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext == "yaml" || ext == "yml")
        .unwrap_or(false)
}

/// Highest semver-named version directory of an installed package
///
/// Installed packages live in `<packages>/<name>/<version>/`. Directories
/// whose name is not a valid version are ignored.
pub fn latest_installed_version(packages_dir: &Path, name: &str) -> Result<Option<PathBuf>> {
    let dir = packages_dir.join(name);
    if !dir.is_dir() {
        return Ok(None);
    }

    let entries = std::fs::read_dir(&dir).map_err(|e| CoreError::io(&dir, e))?;
    let latest = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().to_string();
            Version::parse(&name).ok().map(|v| (v, e.path()))
        })
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, path)| path);

    Ok(latest)
}

mod version_serde {
    use semver::Version;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(version: &Version, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&version.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Version, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Version::parse(&s).map_err(serde::de::Error::custom)
    }
}

//! Just enough of the compose file format to provision host directories

use indexmap::IndexMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{ComposeError, Result};
use aft_core::paths::expand_with;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComposeManifest {
    #[serde(default)]
    pub services: IndexMap<String, Option<ComposeService>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComposeService {
    #[serde(default)]
    pub volumes: Vec<VolumeMount>,
}

/// A `volumes:` entry in either compose syntax
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum VolumeMount {
    /// `host:container[:mode]`, or a named/anonymous volume
    Short(String),
    Long(LongVolume),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LongVolume {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

impl VolumeMount {
    /// The host side of a bind mount, environment-expanded
    pub fn host_source(&self) -> Option<String> {
        self.host_source_with(env_lookup)
    }

    /// Short syntax is classified after expansion, so `${VOL}:/x` counts as a
    /// bind mount when `VOL` holds a path
    fn host_source_with<F>(&self, lookup: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        match self {
            VolumeMount::Short(spec) => {
                let (host, _) = spec.split_once(':')?;
                let host = expand_with(host, lookup);
                looks_like_path(&host).then_some(host)
            }
            VolumeMount::Long(long) if long.kind.as_deref() == Some("bind") => long
                .source
                .as_deref()
                .map(|source| expand_with(source, lookup))
                .filter(|s| !s.is_empty()),
            VolumeMount::Long(_) => None,
        }
    }
}

fn looks_like_path(value: &str) -> bool {
    value.contains('/') || value.starts_with('.') || value.starts_with('~')
}

impl ComposeManifest {
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(content).map_err(|e| ComposeError::Manifest {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn services(&self) -> impl Iterator<Item = (&str, &ComposeService)> {
        self.services
            .iter()
            .filter_map(|(name, service)| service.as_ref().map(|s| (name.as_str(), s)))
    }

    /// Host directories referenced by bind mounts, in manifest order
    ///
    /// Paths are environment-expanded and relative ones are resolved against
    /// `base`. Paths with a file extension are left out since they name files.
    pub fn host_directories(&self, base: &Path) -> Vec<PathBuf> {
        self.host_directories_with(base, env_lookup)
    }

    fn host_directories_with<F>(&self, base: &Path, lookup: F) -> Vec<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut dirs: Vec<PathBuf> = Vec::new();

        for (_, service) in self.services() {
            for mount in &service.volumes {
                let Some(source) = mount.host_source_with(&lookup) else {
                    continue;
                };

                let path = resolve_host_path(&source, base);
                if path.extension().is_some() {
                    continue;
                }
                if !dirs.contains(&path) {
                    dirs.push(path);
                }
            }
        }

        dirs
    }
}

fn resolve_host_path(source: &str, base: &Path) -> PathBuf {
    if let Some(rest) = source.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest.trim_start_matches('/'));
        }
    }

    let path = PathBuf::from(source);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
services:
  web:
    image: nginx
    volumes:
      - /srv/demo/data:/data
      - /srv/demo/nginx.conf:/etc/nginx/nginx.conf:ro
      - ./logs:/var/log/nginx
      - cache:/cache
      - /anonymous
      - type: bind
        source: /srv/demo/bind
        target: /bind
      - type: volume
        source: named
        target: /named
  sidecar:
    image: busybox
    volumes:
      - /srv/demo/data:/shared
  empty:
"#;

    #[test]
    fn test_host_directories() {
        let manifest = ComposeManifest::parse(MANIFEST, Path::new("compose.yaml")).unwrap();
        let dirs = manifest.host_directories(Path::new("/etc/aft/demo"));

        assert_eq!(
            dirs,
            vec![
                PathBuf::from("/srv/demo/data"),
                PathBuf::from("/etc/aft/demo/logs"),
                PathBuf::from("/srv/demo/bind"),
            ]
        );
    }

    #[test]
    fn test_services_skip_null_entries() {
        let manifest = ComposeManifest::parse(MANIFEST, Path::new("compose.yaml")).unwrap();
        let names: Vec<_> = manifest.services().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["web", "sidecar"]);
    }

    #[test]
    fn test_short_syntax_without_host() {
        assert_eq!(VolumeMount::Short("/data".to_string()).host_source(), None);
        assert_eq!(VolumeMount::Short("db:/var/lib".to_string()).host_source(), None);
        assert_eq!(
            VolumeMount::Short("./x:/x".to_string()).host_source().as_deref(),
            Some("./x")
        );
    }

    #[test]
    fn test_short_syntax_expands_before_classifying() {
        let lookup = |name: &str| match name {
            "VOL" => Some("/srv/demo/vol".to_string()),
            "NAMED" => Some("dbdata".to_string()),
            _ => None,
        };

        let mount = VolumeMount::Short("${VOL}:/x".to_string());
        assert_eq!(mount.host_source_with(lookup).as_deref(), Some("/srv/demo/vol"));
        let named = VolumeMount::Short("$NAMED:/var/lib".to_string());
        assert_eq!(named.host_source_with(lookup), None);

        let manifest = ComposeManifest::parse(
            "services:\n  app:\n    volumes:\n      - ${VOL}:/x\n      - $NAMED:/y\n",
            Path::new("compose.yaml"),
        )
        .unwrap();
        assert_eq!(
            manifest.host_directories_with(Path::new("/etc/aft/app"), lookup),
            vec![PathBuf::from("/srv/demo/vol")]
        );
    }

    #[test]
    fn test_empty_and_invalid() {
        assert!(ComposeManifest::parse("", Path::new("c.yaml"))
            .unwrap()
            .services
            .is_empty());

        let err = ComposeManifest::parse("services: [", Path::new("c.yaml")).unwrap_err();
        assert!(matches!(err, ComposeError::Manifest { .. }));
    }
}

//! Override directory resolution
//!
//! A caller may point at a directory mirroring part of a package. Any file
//! present there replaces the package's own copy; nothing is merged here.

use std::path::{Path, PathBuf};

use crate::package::{DOCKERFILE, LoadedPackage, SECRETS_FILE, VALUES_FILE};

/// The override copy of `file_name` if it exists, else the package default
pub fn resolve_override(
    package_dir: &Path,
    override_dir: Option<&Path>,
    file_name: impl AsRef<Path>,
) -> PathBuf {
    let file_name = file_name.as_ref();
    if let Some(dir) = override_dir {
        let candidate = dir.join(file_name);
        if candidate.exists() {
            tracing::debug!(file = %candidate.display(), "using override");
            return candidate;
        }
    }
    package_dir.join(file_name)
}

/// Effective source files for a render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFiles {
    pub values: PathBuf,
    pub secrets: PathBuf,
    pub dockerfile: PathBuf,
}

impl SourceFiles {
    pub fn resolve(package: &LoadedPackage, override_dir: Option<&Path>) -> Self {
        if let Some(dir) = override_dir {
            if !dir.is_dir() {
                tracing::debug!(dir = %dir.display(), "override directory not found");
            }
        }

        Self {
            values: resolve_override(&package.root, override_dir, VALUES_FILE),
            secrets: resolve_override(&package.root, override_dir, SECRETS_FILE),
            dockerfile: resolve_override(&package.root, override_dir, DOCKERFILE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::PACKAGE_FILE;
    use std::fs;
    use tempfile::TempDir;

    fn package(dir: &Path) -> LoadedPackage {
        fs::write(dir.join(PACKAGE_FILE), "name: demo\nversion: 1.0.0\n").unwrap();
        fs::write(dir.join(VALUES_FILE), "replicas: 1\n").unwrap();
        fs::write(dir.join(SECRETS_FILE), "[]\n").unwrap();
        LoadedPackage::load(dir).unwrap()
    }

    #[test]
    fn test_no_override_dir() {
        let pkg_dir = TempDir::new().unwrap();
        let pkg = package(pkg_dir.path());

        let files = SourceFiles::resolve(&pkg, None);
        assert_eq!(files.values, pkg.values_path);
        assert_eq!(files.secrets, pkg.secrets_path);
        assert_eq!(files.dockerfile, pkg.dockerfile_path);
    }

    #[test]
    fn test_override_with_only_secrets() {
        let pkg_dir = TempDir::new().unwrap();
        let over_dir = TempDir::new().unwrap();
        let pkg = package(pkg_dir.path());
        fs::write(over_dir.path().join(SECRETS_FILE), "- name: A\n  path: a\n").unwrap();

        let files = SourceFiles::resolve(&pkg, Some(over_dir.path()));
        assert_eq!(files.values, pkg.values_path);
        assert_eq!(files.dockerfile, pkg.dockerfile_path);
        assert_eq!(files.secrets, over_dir.path().join(SECRETS_FILE));
    }

    #[test]
    fn test_missing_override_dir_falls_back() {
        let pkg_dir = TempDir::new().unwrap();
        let pkg = package(pkg_dir.path());
        let missing = pkg_dir.path().join("does-not-exist");

        let resolved = resolve_override(&pkg.root, Some(&missing), VALUES_FILE);
        assert_eq!(resolved, pkg.values_path);
    }

    #[test]
    fn test_nested_file_name() {
        let pkg_dir = TempDir::new().unwrap();
        let over_dir = TempDir::new().unwrap();
        fs::create_dir_all(over_dir.path().join("etc")).unwrap();
        fs::write(over_dir.path().join("etc/app.conf.hbs"), "x").unwrap();

        let resolved = resolve_override(pkg_dir.path(), Some(over_dir.path()), "etc/app.conf.hbs");
        assert_eq!(resolved, over_dir.path().join("etc/app.conf.hbs"));
    }
}

//! Locating and importing packages

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{ComposeError, Result};
use aft_core::package::latest_installed_version;
use aft_core::{AftConfig, LoadedPackage, PackageCache};

/// Directory of the package named by `reference`
///
/// An existing path is used as is. Otherwise `reference` is a package name:
/// the directory it was last rendered from wins, then the highest installed
/// version under `<data>/packages/<name>/`.
pub fn resolve_package_dir(config: &AftConfig, reference: &str) -> Result<PathBuf> {
    let path = Path::new(reference);
    if path.exists() {
        return Ok(path.to_path_buf());
    }

    let cache = PackageCache::load(config.cache_path())?;
    if let Some(entry) = cache.find_by_name(reference) {
        tracing::debug!(dir = %entry.package_dir.display(), "package found in cache");
        return Ok(entry.package_dir.clone());
    }

    let packages_dir = config.packages_dir();
    match latest_installed_version(&packages_dir, reference)? {
        Some(dir) => {
            tracing::debug!(dir = %dir.display(), "using installed package");
            Ok(dir)
        }
        None => Err(ComposeError::PackageNotFound {
            name: reference.to_string(),
            packages_dir,
        }),
    }
}

/// Resolve `reference` and load its manifest
pub fn resolve_package(config: &AftConfig, reference: &str) -> Result<LoadedPackage> {
    let dir = resolve_package_dir(config, reference)?;
    Ok(LoadedPackage::load(dir)?)
}

/// Service a package was last rendered as
///
/// The values cascade may rename the service, so the cache entry recorded for
/// the package directory wins over the manifest name.
pub fn resolve_service(config: &AftConfig, package: &LoadedPackage) -> Result<String> {
    let cache = PackageCache::load(config.cache_path())?;
    let service = match cache.find_by_package_dir(&package.root) {
        Some(entry) => entry.name.clone(),
        None => package.spec.service_name().to_string(),
    };
    tracing::debug!(package = %package.spec.name, service = %service, "resolved service");
    Ok(service)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedPackage {
    pub name: String,
    pub version: String,
    pub destination: PathBuf,
    pub files: usize,
    /// A previous copy of the same version was removed
    pub replaced: bool,
}

/// Copy a package into `<data>/packages/<name>/<version>/`
pub fn import_package(config: &AftConfig, source: &Path) -> Result<ImportedPackage> {
    let package = LoadedPackage::load(source)?;
    package.validate_layout()?;

    let version = package.spec.version.to_string();
    let destination = config
        .packages_dir()
        .join(&package.spec.name)
        .join(&version);

    let replaced = destination.exists();
    if replaced {
        std::fs::remove_dir_all(&destination).map_err(|e| ComposeError::io(&destination, e))?;
    }

    let files = copy_tree(&package.root, &destination)?;
    tracing::debug!(
        package = %package.spec.name,
        version = %version,
        files,
        "imported package"
    );

    Ok(ImportedPackage {
        name: package.spec.name.clone(),
        version,
        destination,
        files,
        replaced,
    })
}

fn copy_tree(source: &Path, destination: &Path) -> Result<usize> {
    let mut files = 0;

    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source).to_path_buf();
            ComposeError::io(path, e.into())
        })?;

        let relative = entry.path().strip_prefix(source).unwrap_or(entry.path());
        let target = destination.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| ComposeError::io(&target, e))?;
        } else if entry.file_type().is_file() {
            std::fs::copy(entry.path(), &target).map_err(|e| ComposeError::io(entry.path(), e))?;
            files += 1;
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aft_core::PackageCacheEntry;
    use aft_core::CoreError;
    use std::fs;
    use tempfile::TempDir;

    fn config(dir: &Path) -> AftConfig {
        let mut config = AftConfig::default();
        config.paths.data = dir.join("data");
        config.paths.config = dir.join("config");
        config
    }

    fn write_package(dir: &Path, version: &str) {
        fs::create_dir_all(dir.join("etc")).unwrap();
        fs::write(
            dir.join("aft.yaml"),
            format!("name: demo\nversion: {}\n", version),
        )
        .unwrap();
        fs::write(dir.join("values.yaml"), "port: 80\n").unwrap();
        fs::write(dir.join("compose.yaml.hbs"), "services: {}\n").unwrap();
        fs::write(dir.join("etc").join("app.conf.hbs"), "port={{ port }}\n").unwrap();
    }

    #[test]
    fn test_import_copies_tree() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        let source = dir.path().join("src");
        write_package(&source, "1.2.0");

        let imported = import_package(&config, &source).unwrap();

        assert_eq!(imported.name, "demo");
        assert_eq!(imported.version, "1.2.0");
        assert_eq!(imported.files, 4);
        assert!(!imported.replaced);
        assert!(imported.destination.join("etc/app.conf.hbs").exists());
        assert_eq!(
            imported.destination,
            dir.path().join("data/packages/demo/1.2.0")
        );
    }

    #[test]
    fn test_import_replaces_existing_copy() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        let source = dir.path().join("src");
        write_package(&source, "1.0.0");

        let first = import_package(&config, &source).unwrap();
        fs::write(first.destination.join("stale.txt"), "x").unwrap();

        let second = import_package(&config, &source).unwrap();
        assert!(second.replaced);
        assert!(!second.destination.join("stale.txt").exists());
    }

    #[test]
    fn test_import_requires_layout() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("src");
        write_package(&source, "1.0.0");
        fs::remove_file(source.join("values.yaml")).unwrap();

        let err = import_package(&config(dir.path()), &source).unwrap_err();
        assert!(matches!(err, ComposeError::Core(CoreError::InvalidPackage { .. })));
    }

    #[test]
    fn test_resolve_prefers_cache_then_latest_version() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());

        for version in ["1.0.0", "1.10.0", "1.9.3"] {
            let source = dir.path().join(format!("src-{}", version));
            write_package(&source, version);
            import_package(&config, &source).unwrap();
        }

        let latest = resolve_package_dir(&config, "demo").unwrap();
        assert!(latest.ends_with("demo/1.10.0"));

        let pinned = dir.path().join("pinned");
        let mut cache = PackageCache::load(config.cache_path()).unwrap();
        cache.upsert(PackageCacheEntry {
            name: "demo".to_string(),
            version: "0.1.0".to_string(),
            package_dir: pinned.clone(),
            compose_dir: dir.path().join("compose"),
            values_files: Vec::new(),
            secrets_file: pinned.join("secrets.yaml"),
        });
        cache.persist().unwrap();

        assert_eq!(resolve_package_dir(&config, "demo").unwrap(), pinned);
    }

    #[test]
    fn test_resolve_unknown_package() {
        let dir = TempDir::new().unwrap();
        let err = resolve_package_dir(&config(dir.path()), "nope").unwrap_err();
        assert!(matches!(err, ComposeError::PackageNotFound { ref name, .. } if name == "nope"));
    }
}

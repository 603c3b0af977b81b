//! The render pipeline
//!
//! `unpack` turns a package into a compose directory:
//!
//! ```text
//! guard -> sources -> context -> service -> secrets -> compose.yaml
//!       -> cache -> host dirs -> Dockerfile -> overlays
//! ```
//!
//! Existing output is never overwritten unless `force` is set, and `force`
//! is dropped when a container of the service is running.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::context::ExecutionContext;
use crate::error::{ComposeError, Result};
use crate::manifest::ComposeManifest;
use crate::materialize::{MaterializeOutcome, materialize_secrets};
use crate::tools::running_containers;
use aft_core::package::DOCKERFILE;
use aft_core::paths::{COMPOSE_FILE, ENV_FILE, expand_env};
use aft_core::{
    LoadedPackage, PackageCache, PackageCacheEntry, SecretGenerator, SecretMasker, SourceFiles,
    UpsertKind, ValueBuilder, Values, parse_set_values,
};
use aft_engine::{OverlayReport, execute_overlay, plan_overlay};

#[derive(Debug, Clone, Default)]
pub struct UnpackOptions {
    /// Extra value files, applied in order after the package values
    pub value_files: Vec<PathBuf>,
    /// `key=value` overrides, applied after every value file
    pub set_values: Vec<String>,
    /// Directory whose files replace the package's own
    pub override_dir: Option<PathBuf>,
    pub force: bool,
}

/// What a render did
pub struct UnpackReport {
    pub service: String,
    pub compose_dir: PathBuf,
    pub compose_file: PathBuf,
    /// `force` after the running-container guard
    pub force: bool,
    pub force_downgraded: bool,
    pub secrets: MaterializeOutcome,
    /// False when an existing compose.yaml was kept
    pub manifest_rendered: bool,
    pub cache: UpsertKind,
    pub created_dirs: Vec<PathBuf>,
    pub dockerfile_copied: bool,
    pub overlays: Vec<OverlayReport>,
    /// Final render context, secrets included
    pub context: Values,
    /// Content of compose.yaml, rendered or read back
    pub manifest: String,
    pub masker: SecretMasker,
}

impl UnpackReport {
    /// The render context as JSON with secret values hidden
    pub fn masked_context(&self) -> String {
        let json = serde_json::to_string_pretty(self.context.inner()).unwrap_or_default();
        self.masker.mask(&json)
    }

    pub fn masked_manifest(&self) -> String {
        self.masker.mask(&self.manifest)
    }
}

impl fmt::Debug for UnpackReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnpackReport")
            .field("service", &self.service)
            .field("compose_dir", &self.compose_dir)
            .field("compose_file", &self.compose_file)
            .field("force", &self.force)
            .field("force_downgraded", &self.force_downgraded)
            .field("secrets", &self.secrets)
            .field("manifest_rendered", &self.manifest_rendered)
            .field("cache", &self.cache)
            .field("created_dirs", &self.created_dirs)
            .field("dockerfile_copied", &self.dockerfile_copied)
            .field("overlays", &self.overlays)
            .field("masker", &self.masker)
            .finish_non_exhaustive()
    }
}

/// Render `package` into its compose directory
pub async fn unpack(
    ctx: &ExecutionContext,
    package: &LoadedPackage,
    options: &UnpackOptions,
) -> Result<UnpackReport> {
    let mut force = options.force;
    let mut force_downgraded = false;

    if force {
        let service = package.service_name();
        match running_containers(ctx.tools.as_ref(), service).await {
            Ok(ids) if !ids.is_empty() => {
                tracing::warn!(
                    "unable to force overwriting files, container {} is still running",
                    service
                );
                force = false;
                force_downgraded = true;
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(error = %e, "running container check failed"),
        }
    }

    let override_dir = options.override_dir.as_deref();
    let sources = SourceFiles::resolve(package, override_dir);

    let mut value_files = Vec::with_capacity(options.value_files.len() + 1);
    if sources.values.exists() {
        value_files.push(sources.values.clone());
    } else {
        tracing::debug!(file = %sources.values.display(), "package has no values file");
    }
    value_files.extend(options.value_files.iter().cloned());

    let mut builder = ValueBuilder::new();
    builder.add_defaults(&package.spec, &ctx.config);
    builder.add_value_files(&value_files)?;
    if !options.set_values.is_empty() {
        builder.add(&parse_set_values(&options.set_values)?);
    }

    let service = builder.build().service_name()?;
    let compose_dir = ctx.compose_dir(&service);
    tracing::debug!(dir = %compose_dir.display(), "compose dir");
    create_dir(&compose_dir).await?;

    let mut masker = SecretMasker::new();
    let secrets = materialize_secrets(
        ctx,
        &sources.secrets,
        &compose_dir.join(ENV_FILE),
        force,
        &mut SecretGenerator::new(),
        &mut masker,
    )
    .await?;
    if let Some(report) = secrets.report() {
        builder.add(&report.context_values());
    }
    let context = builder.build();

    let compose_file = compose_dir.join(COMPOSE_FILE);
    let manifest_rendered = force || !compose_file.exists();
    let manifest = if manifest_rendered {
        let content = ctx
            .engine
            .render_file(&package.compose_template_path, &context)?;
        tokio::fs::write(&compose_file, &content)
            .await
            .map_err(|e| ComposeError::io(&compose_file, e))?;
        tracing::debug!(file = %compose_file.display(), "rendered compose file");
        content
    } else {
        tracing::debug!(file = %compose_file.display(), "compose file exists, template evaluation skipped");
        tokio::fs::read_to_string(&compose_file)
            .await
            .map_err(|e| ComposeError::io(&compose_file, e))?
    };

    let mut cache = PackageCache::load(ctx.config.cache_path())?;
    let cache_kind = cache.upsert(PackageCacheEntry {
        name: service.clone(),
        version: package.spec.version.to_string(),
        package_dir: package.root.clone(),
        compose_dir: compose_dir.clone(),
        values_files: value_files,
        secrets_file: sources.secrets.clone(),
    });
    cache.persist()?;

    let parsed = ComposeManifest::parse(&manifest, &compose_file)?;
    let mut created_dirs = Vec::new();
    for dir in parsed.host_directories(&compose_dir) {
        if !dir.exists() {
            create_dir(&dir).await?;
            tracing::debug!(dir = %dir.display(), "created volume directory");
            created_dirs.push(dir);
        }
    }

    let dockerfile_copied = copy_dockerfile(&sources.dockerfile, &compose_dir, force).await?;

    let mut overlays = Vec::new();
    if let Some(volumes) = context.get("volumes").and_then(|v| v.as_object()) {
        for (key, value) in volumes {
            let Some(destination) = value.as_str().map(expand_env).filter(|d| !d.is_empty())
            else {
                continue;
            };

            let source = package.root.join(key);
            if !source.is_dir() {
                continue;
            }

            let override_source = override_dir.map(|dir| dir.join(key));
            let plan = plan_overlay(
                &source,
                override_source.as_deref(),
                Path::new(&destination),
                force,
            )?;
            let report = execute_overlay(&plan, &ctx.engine, &context)?;
            tracing::debug!(
                volume = %key,
                rendered = report.rendered,
                copied = report.copied,
                skipped = report.skipped,
                "overlay"
            );
            overlays.push(report);
        }
    }

    Ok(UnpackReport {
        service,
        compose_dir,
        compose_file,
        force,
        force_downgraded,
        secrets,
        manifest_rendered,
        cache: cache_kind,
        created_dirs,
        dockerfile_copied,
        overlays,
        context,
        manifest,
        masker,
    })
}

async fn copy_dockerfile(source: &Path, compose_dir: &Path, force: bool) -> Result<bool> {
    if !source.is_file() {
        return Ok(false);
    }

    let destination = compose_dir.join(DOCKERFILE);
    if !force && destination.exists() {
        tracing::debug!(file = %destination.display(), "skip overwriting existing file");
        return Ok(false);
    }

    tokio::fs::copy(source, &destination)
        .await
        .map_err(|e| ComposeError::io(source, e))?;
    Ok(true)
}

async fn create_dir(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ComposeError::io(dir, e))
}

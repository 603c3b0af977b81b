//! Shared helpers for CLI commands

use aft_compose::ExecutionContext;
use aft_core::{AftConfig, LoadedPackage};
use std::path::PathBuf;

use crate::error::Result;

/// Configuration file location and its content, created with defaults if absent
pub fn load_config() -> Result<(PathBuf, AftConfig)> {
    let path = AftConfig::default_path();
    let config = AftConfig::load_from(&path)?;
    tracing::debug!(path = %path.display(), data = %config.paths.data.display(), "loaded configuration");
    Ok((path, config))
}

/// Context backed by the file secret store and real subprocesses
pub fn execution_context() -> Result<ExecutionContext> {
    let (_, config) = load_config()?;
    Ok(ExecutionContext::for_config(config))
}

/// Resolve a package argument: a path, or the name of a rendered or imported package
pub fn load_package(ctx: &ExecutionContext, reference: &str) -> Result<LoadedPackage> {
    if reference.trim().is_empty() {
        return Err(crate::error::CliError::usage("no package specified"));
    }
    Ok(aft_compose::resolve_package(&ctx.config, reference)?)
}

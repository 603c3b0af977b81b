//! Directory overlay rendering
//!
//! A package may ship a directory per volume key (`etc/`, `data/`, ...).
//! Its files land in the host path of that volume: template files are
//! rendered with their suffix removed, everything else is copied. A file at
//! the same relative path in the override tree replaces the package's copy.
//!
//! Planning and execution are separate so callers can inspect or print what
//! would happen before anything touches the destination.

use aft_core::Values;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::engine::{Engine, template_target};
use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Destination exists and force was not requested
    Exists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayAction {
    Render,
    Copy,
    Skip(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayStep {
    /// Effective source, the override copy when one exists
    pub source: PathBuf,
    pub destination: PathBuf,
    pub action: OverlayAction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlayPlan {
    pub destination: PathBuf,
    pub steps: Vec<OverlayStep>,
}

impl OverlayPlan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlayReport {
    pub destination: PathBuf,
    pub rendered: usize,
    pub copied: usize,
    pub skipped: usize,
}

/// Walk `source` depth-first in name order and decide what to do per file
pub fn plan_overlay(
    source: &Path,
    override_source: Option<&Path>,
    destination: &Path,
    force: bool,
) -> Result<OverlayPlan> {
    let mut steps = Vec::new();

    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source).to_path_buf();
            EngineError::io(path, e.into())
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(source)
            .unwrap_or(entry.path())
            .to_path_buf();

        let effective = override_source
            .map(|dir| dir.join(&relative))
            .filter(|candidate| candidate.is_file())
            .unwrap_or_else(|| entry.path().to_path_buf());

        let file_name = entry.file_name().to_string_lossy();
        let (target, render) = match template_target(&file_name) {
            Some(stem) => (relative.with_file_name(stem), true),
            None => (relative.clone(), false),
        };
        let destination_path = destination.join(target);

        let action = if !force && destination_path.exists() {
            tracing::debug!(path = %destination_path.display(), "skip overwriting existing file");
            OverlayAction::Skip(SkipReason::Exists)
        } else if render {
            OverlayAction::Render
        } else {
            OverlayAction::Copy
        };

        steps.push(OverlayStep {
            source: effective,
            destination: destination_path,
            action,
        });
    }

    Ok(OverlayPlan {
        destination: destination.to_path_buf(),
        steps,
    })
}

/// Carry out a plan, creating directories as needed
pub fn execute_overlay(
    plan: &OverlayPlan,
    engine: &Engine,
    context: &Values,
) -> Result<OverlayReport> {
    let mut report = OverlayReport {
        destination: plan.destination.clone(),
        ..Default::default()
    };

    for step in &plan.steps {
        if let OverlayAction::Skip(_) = step.action {
            report.skipped += 1;
            continue;
        }

        if let Some(parent) = step.destination.parent() {
            std::fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e))?;
        }

        match step.action {
            OverlayAction::Render => {
                let content = engine.render_file(&step.source, context)?;
                std::fs::write(&step.destination, content)
                    .map_err(|e| EngineError::io(&step.destination, e))?;
                tracing::debug!(
                    source = %step.source.display(),
                    destination = %step.destination.display(),
                    "rendered"
                );
                report.rendered += 1;
            }
            OverlayAction::Copy => {
                std::fs::copy(&step.source, &step.destination)
                    .map_err(|e| EngineError::io(&step.source, e))?;
                tracing::debug!(
                    source = %step.source.display(),
                    destination = %step.destination.display(),
                    "copied"
                );
                report.copied += 1;
            }
            OverlayAction::Skip(_) => {}
        }
    }

    Ok(report)
}

//! Starting and stopping rendered services

use std::path::PathBuf;

use crate::context::ExecutionContext;
use crate::error::Result;
use crate::tools::{ComposeCommand, SopsMode, compose, sops};
use crate::unpack::{UnpackOptions, UnpackReport, unpack};
use aft_core::paths::{COMPOSE_FILE, ENV_FILE};
use aft_core::{CoreError, LoadedPackage};

/// Files of a rendered service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeTarget {
    pub service: String,
    pub compose_dir: PathBuf,
    pub compose_file: PathBuf,
    pub env_file: PathBuf,
}

impl ComposeTarget {
    pub fn new(ctx: &ExecutionContext, service: &str) -> Self {
        let compose_dir = ctx.compose_dir(service);
        Self {
            service: service.to_string(),
            compose_file: compose_dir.join(COMPOSE_FILE),
            env_file: compose_dir.join(ENV_FILE),
            compose_dir,
        }
    }
}

/// `docker compose up -d --wait` for a rendered service
pub async fn up(ctx: &ExecutionContext, service: &str) -> Result<()> {
    run_compose(ctx, &ComposeTarget::new(ctx, service), ComposeCommand::Up).await
}

/// `docker compose down --timeout 60` for a rendered service
pub async fn down(ctx: &ExecutionContext, service: &str) -> Result<()> {
    run_compose(ctx, &ComposeTarget::new(ctx, service), ComposeCommand::Down).await
}

/// Render then start
pub async fn apply(
    ctx: &ExecutionContext,
    package: &LoadedPackage,
    options: &UnpackOptions,
) -> Result<UnpackReport> {
    let report = unpack(ctx, package, options).await?;
    up(ctx, &report.service).await?;
    Ok(report)
}

/// Run compose with the env file decrypted for the duration of the call
///
/// The env file is re-encrypted even when compose fails. A compose failure
/// takes precedence over a re-encryption failure.
async fn run_compose(
    ctx: &ExecutionContext,
    target: &ComposeTarget,
    command: ComposeCommand,
) -> Result<()> {
    if !target.compose_file.exists() {
        return Err(CoreError::FileNotFound {
            path: target.compose_file.clone(),
        }
        .into());
    }

    let env_file = target.env_file.exists().then_some(target.env_file.as_path());
    let encryption = match env_file {
        Some(_) => ctx.encryption().await,
        None => None,
    };
    tracing::debug!(
        service = %target.service,
        sops = encryption.is_some(),
        "running compose {:?}",
        command
    );

    if let Some(enc) = &encryption {
        tracing::debug!(file = %target.env_file.display(), "decrypting env file");
        sops(
            ctx.tools.as_ref(),
            SopsMode::Decrypt,
            &target.env_file,
            &enc.recipient,
            &enc.key_file,
        )
        .await?;
    }

    let result = compose(
        ctx.tools.as_ref(),
        command,
        &target.compose_dir,
        &target.compose_file,
        env_file,
    )
    .await;

    if let Some(enc) = &encryption {
        tracing::debug!(file = %target.env_file.display(), "encrypting env file");
        let reencrypted = sops(
            ctx.tools.as_ref(),
            SopsMode::Encrypt,
            &target.env_file,
            &enc.recipient,
            &enc.key_file,
        )
        .await;

        if let Err(e) = reencrypted {
            if result.is_err() {
                tracing::warn!(error = %e, "failed to re-encrypt env file");
            } else {
                return Err(e);
            }
        }
    }

    result
}

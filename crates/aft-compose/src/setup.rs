//! Host environment setup
//!
//! Prepares what rendered packages rely on: an age key for sops, locally
//! trusted certificates from mkcert, and the shared docker network. Each
//! step runs only when its tool is installed; a failing step does not stop
//! the others.

use std::path::{Path, PathBuf};

use crate::context::ExecutionContext;
use crate::error::{ComposeError, Result};
use crate::tools::{
    AGE_KEYGEN, DOCKER, MKCERT, SOPS, ToolRunner, create_age_key, ensure_network,
    mkcert_ca_root, mkcert_certificate, mkcert_install,
};

/// Tools aft can drive
pub const KNOWN_TOOLS: [&str; 4] = [DOCKER, MKCERT, AGE_KEYGEN, SOPS];

const PUBLIC_KEY_PREFIX: &str = "# public key:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolStatus {
    pub name: &'static str,
    pub path: Option<PathBuf>,
}

impl ToolStatus {
    pub fn installed(&self) -> bool {
        self.path.is_some()
    }
}

/// Locate every known tool
pub async fn check_tools(tools: &dyn ToolRunner) -> Vec<ToolStatus> {
    let mut statuses = Vec::with_capacity(KNOWN_TOOLS.len());
    for name in KNOWN_TOOLS {
        let path = tools.which(name).await;
        if path.is_none() {
            tracing::warn!("{} is not installed", name);
        }
        statuses.push(ToolStatus { name, path });
    }
    statuses
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateFiles {
    pub cert: PathBuf,
    pub key: PathBuf,
    /// Certificate followed by the mkcert root CA
    pub chained: PathBuf,
}

impl CertificateFiles {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            cert: dir.join("aft.pem"),
            key: dir.join("aft.key.pem"),
            chained: dir.join("aft.chained.pem"),
        }
    }
}

#[derive(Debug, Default)]
pub struct SetupReport {
    pub tools: Vec<ToolStatus>,
    pub age_recipient: Option<String>,
    pub certificates: Option<CertificateFiles>,
    /// `Some(true)` when the docker network was created by this run
    pub network_created: Option<bool>,
    /// Steps that failed, with their error
    pub failures: Vec<(&'static str, String)>,
}

impl SetupReport {
    fn installed(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name == name && t.installed())
    }
}

/// Run every setup step, saving configuration changes to `config_path`
pub async fn setup(ctx: &mut ExecutionContext, config_path: &Path) -> Result<SetupReport> {
    let mut report = SetupReport {
        tools: check_tools(ctx.tools.as_ref()).await,
        ..Default::default()
    };

    if ctx.config.sops.enabled && report.installed(SOPS) && report.installed(AGE_KEYGEN) {
        match setup_age_key(ctx.tools.as_ref(), &ctx.config.age_key_path()).await {
            Ok(recipient) => {
                ctx.config.sops.recipient = Some(recipient.clone());
                ctx.config.save_to(config_path)?;
                report.age_recipient = Some(recipient);
            }
            Err(e) => {
                tracing::error!(error = %e, "sops setup failed");
                report.failures.push(("sops", e.to_string()));
            }
        }
    }

    if ctx.config.mkcert.enabled && report.installed(MKCERT) {
        let certs = CertificateFiles::in_dir(&ctx.config.certs_dir());
        match setup_local_certs(ctx.tools.as_ref(), &certs, &ctx.config.mkcert.domains).await {
            Ok(()) => report.certificates = Some(certs),
            Err(e) => {
                tracing::error!(error = %e, "certificate setup failed");
                report.failures.push(("mkcert", e.to_string()));
            }
        }
    }

    if report.installed(DOCKER) {
        match ensure_network(ctx.tools.as_ref(), &ctx.config.network).await {
            Ok(created) => report.network_created = Some(created),
            Err(e) => {
                tracing::error!(error = %e, "docker network setup failed");
                report.failures.push(("docker", e.to_string()));
            }
        }
    }

    Ok(report)
}

/// Create the age key unless it exists and return its public key
pub async fn setup_age_key(tools: &dyn ToolRunner, key_file: &Path) -> Result<String> {
    if key_file.exists() {
        tracing::debug!(file = %key_file.display(), "reusing age key");
    } else {
        if let Some(parent) = key_file.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ComposeError::io(parent, e))?;
        }
        create_age_key(tools, key_file).await?;
    }

    let content = tokio::fs::read_to_string(key_file)
        .await
        .map_err(|e| ComposeError::io(key_file, e))?;

    parse_age_recipient(&content).ok_or_else(|| ComposeError::AgeKey {
        path: key_file.to_path_buf(),
        message: "no public key comment found".to_string(),
    })
}

/// The `age1...` recipient from an age-keygen identity file
pub fn parse_age_recipient(content: &str) -> Option<String> {
    content
        .lines()
        .filter_map(|line| line.trim().strip_prefix(PUBLIC_KEY_PREFIX))
        .map(str::trim)
        .find(|key| !key.is_empty())
        .map(str::to_string)
}

/// Issue certificates with mkcert and write the chained copy
pub async fn setup_local_certs(
    tools: &dyn ToolRunner,
    certs: &CertificateFiles,
    domains: &[String],
) -> Result<()> {
    if let Some(dir) = certs.cert.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| ComposeError::io(dir, e))?;
    }

    let root_cert = mkcert_ca_root(tools).await?.join("rootCA.pem");
    if !root_cert.exists() {
        mkcert_install(tools).await?;
    }

    if !certs.cert.exists() || !certs.key.exists() {
        mkcert_certificate(tools, &certs.cert, &certs.key, domains).await?;
    }

    let mut chained = tokio::fs::read_to_string(&certs.cert)
        .await
        .map_err(|e| ComposeError::io(&certs.cert, e))?;
    chained.push_str(
        &tokio::fs::read_to_string(&root_cert)
            .await
            .map_err(|e| ComposeError::io(&root_cert, e))?,
    );
    tokio::fs::write(&certs.chained, chained)
        .await
        .map_err(|e| ComposeError::io(&certs.chained, e))
}

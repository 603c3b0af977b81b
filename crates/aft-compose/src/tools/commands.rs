//! Invocations of the external tools aft drives

use std::path::{Path, PathBuf};

use super::{ToolInvocation, ToolRunner};
use crate::error::Result;
use aft_core::config::NetworkConfig;

pub const DOCKER: &str = "docker";
pub const SOPS: &str = "sops";
pub const AGE_KEYGEN: &str = "age-keygen";
pub const MKCERT: &str = "mkcert";

/// Ids of running containers whose name matches `service`
///
/// `docker ps` filters by substring, so this is an approximation. A failing
/// `docker ps` is reported as no containers.
pub async fn running_containers(tools: &dyn ToolRunner, service: &str) -> Result<Vec<String>> {
    let invocation = ToolInvocation::new(DOCKER).args([
        "ps".to_string(),
        "--filter".to_string(),
        format!("name={}", service),
        "-q".to_string(),
    ]);

    let output = tools.run(invocation).await?;
    if !output.is_success() {
        tracing::debug!(stderr = %output.stderr.trim(), "docker ps failed");
        return Ok(Vec::new());
    }

    Ok(output
        .stdout_lines()
        .into_iter()
        .map(str::to_string)
        .collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeCommand {
    Up,
    Down,
}

impl ComposeCommand {
    fn args(self) -> &'static [&'static str] {
        match self {
            ComposeCommand::Up => &["up", "-d", "--wait"],
            ComposeCommand::Down => &["down", "--timeout", "60"],
        }
    }
}

/// `docker compose --project-directory <dir> -f <file> [--env-file <env>] <command>`
pub async fn compose(
    tools: &dyn ToolRunner,
    command: ComposeCommand,
    project_dir: &Path,
    compose_file: &Path,
    env_file: Option<&Path>,
) -> Result<()> {
    let mut invocation = ToolInvocation::new(DOCKER)
        .arg("compose")
        .arg("--project-directory")
        .arg(path_arg(project_dir))
        .arg("-f")
        .arg(path_arg(compose_file));

    if let Some(env) = env_file {
        invocation = invocation.arg("--env-file").arg(path_arg(env));
    }

    tools
        .run_checked(invocation.args(command.args().iter().copied()).cwd(project_dir))
        .await?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SopsMode {
    Encrypt,
    Decrypt,
}

/// Encrypt or decrypt `file` in place with sops and the age backend
pub async fn sops(
    tools: &dyn ToolRunner,
    mode: SopsMode,
    file: &Path,
    recipient: &str,
    key_file: &Path,
) -> Result<()> {
    let flag = match mode {
        SopsMode::Encrypt => "-e",
        SopsMode::Decrypt => "-d",
    };

    let invocation = ToolInvocation::new(SOPS)
        .args([flag, "-i"])
        .arg(path_arg(file))
        .env("SOPS_AGE_RECIPIENTS", recipient)
        .env("SOPS_AGE_KEY_FILE", path_arg(key_file));

    tools.run_checked(invocation).await?;
    Ok(())
}

/// `age-keygen -o <file>`
pub async fn create_age_key(tools: &dyn ToolRunner, key_file: &Path) -> Result<()> {
    let invocation = ToolInvocation::new(AGE_KEYGEN)
        .arg("-o")
        .arg(path_arg(key_file));
    tools.run_checked(invocation).await?;
    Ok(())
}

/// mkcert's CA directory, from `mkcert -CAROOT`
pub async fn mkcert_ca_root(tools: &dyn ToolRunner) -> Result<PathBuf> {
    let output = tools
        .run_checked(ToolInvocation::new(MKCERT).arg("-CAROOT"))
        .await?;
    Ok(PathBuf::from(output.stdout.trim()))
}

/// `mkcert -install`
pub async fn mkcert_install(tools: &dyn ToolRunner) -> Result<()> {
    tools
        .run_checked(ToolInvocation::new(MKCERT).arg("-install"))
        .await?;
    Ok(())
}

/// Issue a certificate covering `domains`
pub async fn mkcert_certificate(
    tools: &dyn ToolRunner,
    cert_file: &Path,
    key_file: &Path,
    domains: &[String],
) -> Result<()> {
    let invocation = ToolInvocation::new(MKCERT)
        .arg("-cert-file")
        .arg(path_arg(cert_file))
        .arg("-key-file")
        .arg(path_arg(key_file))
        .args(domains.iter().cloned());
    tools.run_checked(invocation).await?;
    Ok(())
}

/// Create the shared docker network unless it exists; true when created
pub async fn ensure_network(tools: &dyn ToolRunner, network: &NetworkConfig) -> Result<bool> {
    let inspect = tools
        .run(
            ToolInvocation::new(DOCKER)
                .args(["network", "inspect"])
                .arg(network.name.as_str()),
        )
        .await?;
    if inspect.is_success() {
        tracing::debug!(network = %network.name, "docker network exists");
        return Ok(false);
    }

    let create = ToolInvocation::new(DOCKER)
        .args(["network", "create", "--subnet"])
        .arg(network.subnet.as_str())
        .arg("--gateway")
        .arg(network.gateway.as_str())
        .arg(network.name.as_str());
    tools.run_checked(create).await?;
    Ok(true)
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

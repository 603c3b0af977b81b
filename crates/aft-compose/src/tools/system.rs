//! Runner backed by real subprocesses

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use super::{ToolInvocation, ToolOutput, ToolRunner};
use crate::error::{ComposeError, Result};

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemToolRunner;

impl SystemToolRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ToolRunner for SystemToolRunner {
    async fn run(&self, invocation: ToolInvocation) -> Result<ToolOutput> {
        tracing::debug!(command = %invocation.display(), "running");

        let mut cmd = tokio::process::Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        for (key, value) in &invocation.env {
            cmd.env(key, value);
        }
        if let Some(dir) = &invocation.cwd {
            cmd.current_dir(dir);
        }

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ComposeError::ToolNotFound {
                    program: invocation.program.clone(),
                }
            } else {
                ComposeError::Spawn {
                    program: invocation.program.clone(),
                    source: e,
                }
            }
        })?;

        let result = ToolOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !result.is_success() {
            tracing::debug!(
                command = %invocation.display(),
                code = ?result.code,
                stderr = %result.stderr.trim(),
                "command failed"
            );
        }

        Ok(result)
    }

    async fn which(&self, program: &str) -> Option<PathBuf> {
        find_in_path(program)
    }
}

/// Search `$PATH` for an executable named `program`
pub fn find_in_path(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }

    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths).find_map(|dir| {
        executable_names(program)
            .into_iter()
            .map(|name| dir.join(name))
            .find(|path| is_executable(path))
    })
}

#[cfg(windows)]
fn executable_names(program: &str) -> Vec<String> {
    let mut names = vec![program.to_string()];
    for ext in ["exe", "cmd", "bat"] {
        names.push(format!("{}.{}", program, ext));
    }
    names
}

#[cfg(not(windows))]
fn executable_names(program: &str) -> Vec<String> {
    vec![program.to_string()]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

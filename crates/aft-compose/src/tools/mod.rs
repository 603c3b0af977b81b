//! External tools
//!
//! Every subprocess (`docker`, `sops`, `age-keygen`, `mkcert`) goes through a
//! [`ToolRunner`], so the pipeline can run against scripted responses in
//! tests.

mod commands;
mod mock;
mod system;

pub use commands::{
    AGE_KEYGEN, ComposeCommand, DOCKER, MKCERT, SOPS, SopsMode, compose, create_age_key,
    ensure_network, mkcert_ca_root, mkcert_certificate, mkcert_install, running_containers, sops,
};
pub use mock::MockToolRunner;
pub use system::{SystemToolRunner, find_in_path};

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::{ComposeError, Result};

/// A subprocess to run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment variables for the child only
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// `program arg1 arg2`, for logs
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished subprocess
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// `None` when the process was terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }

    /// Non-empty stdout lines
    pub fn stdout_lines(&self) -> Vec<&str> {
        self.stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect()
    }

    /// Turn a non-zero exit into [`ComposeError::Tool`]
    pub fn check(self, invocation: &ToolInvocation) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ComposeError::Tool {
                program: invocation.program.clone(),
                args: invocation.args.clone(),
                code: self.code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Runs external programs
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run to completion, capturing output
    ///
    /// A non-zero exit is reported in [`ToolOutput::code`], not as an error.
    async fn run(&self, invocation: ToolInvocation) -> Result<ToolOutput>;

    /// Location of `program` on PATH
    async fn which(&self, program: &str) -> Option<PathBuf>;

    /// Run and fail on a non-zero exit
    async fn run_checked(&self, invocation: ToolInvocation) -> Result<ToolOutput> {
        let output = self.run(invocation.clone()).await?;
        output.check(&invocation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_builder() {
        let inv = ToolInvocation::new("docker")
            .arg("ps")
            .args(["--filter", "name=demo"])
            .env("A", "1")
            .cwd("/tmp");

        assert_eq!(inv.display(), "docker ps --filter name=demo");
        assert_eq!(inv.env, vec![("A".to_string(), "1".to_string())]);
        assert_eq!(inv.cwd, Some(PathBuf::from("/tmp")));
    }

    #[test]
    fn test_output_lines_and_check() {
        let out = ToolOutput::success("abc\n\n  def \n");
        assert_eq!(out.stdout_lines(), vec!["abc", "def"]);

        let inv = ToolInvocation::new("sops").args(["-e", "-i", "x"]);
        let err = ToolOutput::failure(2, "boom\n").check(&inv).unwrap_err();
        match err {
            ComposeError::Tool { program, code, stderr, .. } => {
                assert_eq!(program, "sops");
                assert_eq!(code, Some(2));
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

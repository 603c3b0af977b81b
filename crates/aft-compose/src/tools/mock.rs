//! Scripted tool runner for tests
//!
//! Responses are matched on the program name and a prefix of the arguments;
//! the first matching rule wins. Unmatched invocations succeed with empty
//! output. Every invocation is recorded.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{ToolInvocation, ToolOutput, ToolRunner};
use crate::error::Result;

#[derive(Debug, Clone)]
struct Rule {
    program: String,
    args_prefix: Vec<String>,
    output: ToolOutput,
}

impl Rule {
    fn matches(&self, invocation: &ToolInvocation) -> bool {
        self.program == invocation.program && invocation.args.starts_with(&self.args_prefix)
    }
}

#[derive(Clone, Default)]
pub struct MockToolRunner {
    rules: Arc<RwLock<Vec<Rule>>>,
    missing: Arc<RwLock<BTreeSet<String>>>,
    invocations: Arc<RwLock<Vec<ToolInvocation>>>,
}

impl MockToolRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer invocations of `program` whose arguments start with `args_prefix`
    pub async fn respond(&self, program: &str, args_prefix: &[&str], output: ToolOutput) {
        self.rules.write().await.push(Rule {
            program: program.to_string(),
            args_prefix: args_prefix.iter().map(|a| a.to_string()).collect(),
            output,
        });
    }

    /// Make `which(program)` report the tool as not installed
    pub async fn set_missing(&self, program: &str) {
        self.missing.write().await.insert(program.to_string());
    }

    pub async fn invocations(&self) -> Vec<ToolInvocation> {
        self.invocations.read().await.clone()
    }

    /// Recorded invocations rendered as `program arg..` strings
    pub async fn commands(&self) -> Vec<String> {
        self.invocations
            .read()
            .await
            .iter()
            .map(ToolInvocation::display)
            .collect()
    }

    pub async fn clear(&self) {
        self.invocations.write().await.clear();
    }
}

#[async_trait]
impl ToolRunner for MockToolRunner {
    async fn run(&self, invocation: ToolInvocation) -> Result<ToolOutput> {
        let output = self
            .rules
            .read()
            .await
            .iter()
            .find(|rule| rule.matches(&invocation))
            .map(|rule| rule.output.clone())
            .unwrap_or_else(|| ToolOutput::success(""));

        self.invocations.write().await.push(invocation);
        Ok(output)
    }

    async fn which(&self, program: &str) -> Option<PathBuf> {
        if self.missing.read().await.contains(program) {
            None
        } else {
            Some(PathBuf::from("/usr/bin").join(program))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rules_match_prefix() {
        let runner = MockToolRunner::new();
        runner
            .respond("docker", &["ps"], ToolOutput::success("abc123\n"))
            .await;

        let ps = runner
            .run(ToolInvocation::new("docker").args(["ps", "-q"]))
            .await
            .unwrap();
        assert_eq!(ps.stdout_lines(), vec!["abc123"]);

        let other = runner
            .run(ToolInvocation::new("docker").arg("compose"))
            .await
            .unwrap();
        assert!(other.is_success());
        assert!(other.stdout.is_empty());

        assert_eq!(runner.commands().await, vec!["docker ps -q", "docker compose"]);
    }

    #[tokio::test]
    async fn test_missing_tools() {
        let runner = MockToolRunner::new();
        runner.set_missing("sops").await;

        assert!(runner.which("sops").await.is_none());
        assert!(runner.which("docker").await.is_some());
    }
}

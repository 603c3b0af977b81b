//! Error types for aft-compose

use aft_core::CoreError;
use aft_engine::EngineError;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ComposeError>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ComposeError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A subprocess ran and reported failure
    #[error("`{program} {}` failed{}: {stderr}", .args.join(" "), exit_suffix(.code))]
    Tool {
        program: String,
        args: Vec<String>,
        code: Option<i32>,
        stderr: String,
    },

    #[error("`{program}` was not found on PATH")]
    ToolNotFound { program: String },

    /// A subprocess could not be started
    #[error("failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("secret store error: {message}")]
    Store { message: String },

    #[error("package '{name}' not found in the cache or under {}", .packages_dir.display())]
    PackageNotFound { name: String, packages_dir: PathBuf },

    #[error("compose manifest {} is invalid: {message}", .path.display())]
    Manifest { path: PathBuf, message: String },

    #[error("{}: {message}", .path.display())]
    AgeKey { path: PathBuf, message: String },

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn exit_suffix(code: &Option<i32>) -> String {
    code.map(|c| format!(" with exit code {}", c))
        .unwrap_or_default()
}

impl ComposeError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }
}

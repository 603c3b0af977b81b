//! Core error types

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Package not found: {path}")]
    PackageNotFound { path: String },

    #[error("Invalid package: {message}")]
    InvalidPackage { message: String },

    #[error("File not found: {}", .path.display())]
    FileNotFound { path: PathBuf },

    #[error("Failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid version: {0}")]
    InvalidVersion(#[from] semver::Error),

    #[error(
        "No service name specified. Ensure that the values file contains a service or name property"
    )]
    MissingServiceName,

    #[error("Values merge error: {message}")]
    ValuesMerge { message: String },
}

impl CoreError {
    /// Wrap an IO error with the file it happened on
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Parse failure attributed to a file
    pub fn parse(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Read a text file, mapping a missing file to [`CoreError::FileNotFound`]
pub fn read_to_string(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            CoreError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            CoreError::io(path, e)
        }
    })
}

/// Write a text file, creating parent directories as needed
pub fn write_string(path: impl AsRef<Path>, content: &str) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, e))?;
    }
    std::fs::write(path, content).map_err(|e| CoreError::io(path, e))
}

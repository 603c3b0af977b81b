//! CLI error type
//!
//! Library errors are folded into [`CliError`], which knows its exit code.
//! Template errors keep their source spans so miette can point at the line.

use aft_compose::ComposeError;
use aft_core::CoreError;
use aft_engine::{EngineError, TemplateError};
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Template(TemplateError),

    #[error("{message}")]
    #[diagnostic(code(aft::package))]
    Package {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// A values, secrets or configuration document could not be used
    #[error("{message}")]
    #[diagnostic(code(aft::input))]
    Input { message: String },

    #[error("{message}")]
    #[diagnostic(code(aft::tool))]
    Tool {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("{message}")]
    #[diagnostic(code(aft::io))]
    Io { message: String },

    #[error("{message}")]
    #[diagnostic(code(aft::usage))]
    Usage { message: String },

    #[error("{message}")]
    #[diagnostic(code(aft::error))]
    Other { message: String },
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Template(_) => exit_codes::TEMPLATE_ERROR,
            CliError::Package { .. } => exit_codes::PACKAGE_ERROR,
            CliError::Input { .. } => exit_codes::INPUT_ERROR,
            CliError::Tool { .. } => exit_codes::TOOL_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
            CliError::Other { .. } => exit_codes::ERROR,
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::PackageNotFound { .. } | CoreError::InvalidPackage { .. } => {
                CliError::Package {
                    message,
                    help: None,
                }
            }
            CoreError::MissingServiceName => CliError::Package {
                message,
                help: Some("set `service` or `name` in the package values".to_string()),
            },
            CoreError::FileNotFound { .. } | CoreError::Io { .. } => CliError::Io { message },
            CoreError::Parse { .. }
            | CoreError::YamlParse(_)
            | CoreError::JsonParse(_)
            | CoreError::InvalidVersion(_)
            | CoreError::ValuesMerge { .. } => CliError::Input { message },
        }
    }
}

impl From<EngineError> for CliError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Template(template) => CliError::Template(template),
            other => CliError::Io {
                message: other.to_string(),
            },
        }
    }
}

impl From<ComposeError> for CliError {
    fn from(err: ComposeError) -> Self {
        match err {
            ComposeError::Core(core) => core.into(),
            ComposeError::Engine(engine) => engine.into(),
            ComposeError::ToolNotFound { ref program } => CliError::Tool {
                help: Some(format!("install {} and make sure it is on PATH", program)),
                message: err.to_string(),
            },
            ComposeError::Tool { .. } | ComposeError::Spawn { .. } => CliError::Tool {
                message: err.to_string(),
                help: None,
            },
            ComposeError::PackageNotFound { .. } => CliError::Package {
                message: err.to_string(),
                help: Some("import the package with `aft compose import <dir>`".to_string()),
            },
            ComposeError::Io { .. } => CliError::Io {
                message: err.to_string(),
            },
            ComposeError::Manifest { .. } | ComposeError::AgeKey { .. } => CliError::Input {
                message: err.to_string(),
            },
            other => CliError::Other {
                message: other.to_string(),
            },
        }
    }
}

impl From<miette::Report> for CliError {
    fn from(err: miette::Report) -> Self {
        let message = err
            .chain()
            .map(|cause| cause.to_string())
            .collect::<Vec<_>>()
            .join(": ");
        CliError::Other { message }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;

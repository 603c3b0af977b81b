//! Engine error types

use miette::{Diagnostic, NamedSource, SourceSpan};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main engine error type
#[derive(Error, Debug, Diagnostic)]
pub enum EngineError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Template(#[from] TemplateError),

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EngineError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Error kind for categorizing template errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TemplateErrorKind {
    UndefinedVariable,
    UnknownFilter,
    UnknownFunction,
    SyntaxError,
    TypeError,
    InvalidOperation,
    Other,
}

impl TemplateErrorKind {
    pub fn to_code_string(&self) -> &'static str {
        match self {
            Self::UndefinedVariable => "undefined_variable",
            Self::UnknownFilter => "unknown_filter",
            Self::UnknownFunction => "unknown_function",
            Self::SyntaxError => "syntax",
            Self::TypeError => "type",
            Self::InvalidOperation => "invalid_operation",
            Self::Other => "render",
        }
    }
}

/// Template error pointing into the template source
#[derive(Error, Debug, Diagnostic, Clone)]
#[error("{message}")]
#[diagnostic(code(aft::template::render))]
pub struct TemplateError {
    pub message: String,

    pub kind: TemplateErrorKind,

    #[source_code]
    pub src: NamedSource<String>,

    #[label("error occurred here")]
    pub span: Option<SourceSpan>,

    #[help]
    pub suggestion: Option<String>,
}

impl TemplateError {
    /// Convert a MiniJinja error, attaching the template source
    ///
    /// `context` is used to list the keys that were available when a
    /// variable turned out to be undefined.
    pub fn from_minijinja(
        err: minijinja::Error,
        template_name: &str,
        template_source: &str,
        context: Option<&serde_json::Value>,
    ) -> Self {
        let kind = categorize(&err);
        let message = match kind {
            TemplateErrorKind::UndefinedVariable => err
                .detail()
                .map(|d| format!("undefined variable: {}", d))
                .unwrap_or_else(|| "undefined variable".to_string()),
            _ => err
                .detail()
                .map(str::to_string)
                .unwrap_or_else(|| err.kind().to_string()),
        };

        let span = err
            .line()
            .and_then(|line| calculate_span(template_source, line));

        let suggestion = match (kind, context) {
            (TemplateErrorKind::UndefinedVariable, Some(serde_json::Value::Object(map))) => {
                let keys: Vec<&str> = map.keys().map(String::as_str).collect();
                Some(format!("Available top-level keys: {}", keys.join(", ")))
            }
            (TemplateErrorKind::UnknownFilter, _) => Some(format!(
                "Available filters: {}",
                crate::filters::AVAILABLE_FILTERS.join(", ")
            )),
            _ => None,
        };

        Self {
            message,
            kind,
            src: NamedSource::new(template_name, template_source.to_string()),
            span,
            suggestion,
        }
    }

    pub fn kind(&self) -> TemplateErrorKind {
        self.kind
    }
}

fn categorize(err: &minijinja::Error) -> TemplateErrorKind {
    match err.kind() {
        minijinja::ErrorKind::UndefinedError => TemplateErrorKind::UndefinedVariable,
        minijinja::ErrorKind::UnknownFilter => TemplateErrorKind::UnknownFilter,
        minijinja::ErrorKind::UnknownFunction => TemplateErrorKind::UnknownFunction,
        minijinja::ErrorKind::SyntaxError => TemplateErrorKind::SyntaxError,
        minijinja::ErrorKind::InvalidOperation => TemplateErrorKind::InvalidOperation,
        minijinja::ErrorKind::NonPrimitive | minijinja::ErrorKind::NonKey => {
            TemplateErrorKind::TypeError
        }
        _ => TemplateErrorKind::Other,
    }
}

/// Span covering a whole 1-based line
fn calculate_span(source: &str, line_num: usize) -> Option<SourceSpan> {
    let mut offset = 0;

    for (idx, raw) in source.split_inclusive('\n').enumerate() {
        if idx + 1 == line_num {
            let line = raw.trim_end_matches(['\n', '\r']);
            return Some(SourceSpan::new(offset.into(), line.len()));
        }
        offset += raw.len();
    }

    None
}

pub type Result<T> = std::result::Result<T, EngineError>;

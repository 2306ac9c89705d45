//! Error types for Stylesmith.
//!
//! Library crates use [`StylesmithError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;
use std::sync::Arc;

/// Code reported by [`StylesmithError::code`] when a plugin or syntax cannot be resolved.
pub const MODULE_NOT_FOUND_CODE: &str = "ERR_MODULE_NOT_FOUND";

/// Top-level error type for all Stylesmith operations.
///
/// Cloneable so a memoized resolution failure can be reported on every run.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StylesmithError {
    /// Configuration loading or plugin option validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A named plugin or syntax module is not known to the resolver.
    #[error("cannot find module '{name}'")]
    ModuleNotFound { name: String },

    /// The input stylesheet could not be parsed.
    #[error(transparent)]
    Syntax(#[from] CssSyntaxError),

    /// A transformer rejected its input.
    #[error("plugin {plugin} failed: {message}")]
    Plugin { plugin: String, message: String },

    /// A previous source map could not be decoded or composed.
    #[error("source map error: {message}")]
    SourceMap { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: Arc<std::io::Error>,
    },

    /// A processing task failed without a structured error.
    #[error("{message}")]
    Processing { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, StylesmithError>;

impl StylesmithError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a module-not-found error for the given plugin or syntax name.
    pub fn module_not_found(name: impl Into<String>) -> Self {
        Self::ModuleNotFound { name: name.into() }
    }

    /// Create a plugin failure for the named transformer.
    pub fn plugin(plugin: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Plugin {
            plugin: plugin.into(),
            message: msg.into(),
        }
    }

    /// Create a source map error from any displayable message.
    pub fn source_map(msg: impl Into<String>) -> Self {
        Self::SourceMap {
            message: msg.into(),
        }
    }

    /// Wrap an arbitrary failure payload, serializing it into the message.
    pub fn processing(payload: &serde_json::Value) -> Self {
        Self::Processing {
            message: format!("Error during processing: {payload}"),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// Stable error kind name, used by hosts to tell failures apart.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config { .. } => "ConfigError",
            Self::ModuleNotFound { .. } => "ModuleNotFoundError",
            Self::Syntax(_) => "CssSyntaxError",
            Self::Plugin { .. } => "PluginError",
            Self::SourceMap { .. } => "SourceMapError",
            Self::Io { .. } => "IoError",
            Self::Processing { .. } => "Error",
        }
    }

    /// Machine-readable code, where one exists.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::ModuleNotFound { .. } => Some(MODULE_NOT_FOUND_CODE),
            _ => None,
        }
    }
}

/// A stylesheet that could not be parsed, with the position of the failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}:{line}:{column}: {reason}", .file.as_deref().unwrap_or("<input css>"))]
pub struct CssSyntaxError {
    /// What went wrong (e.g. `Unknown word`).
    pub reason: String,
    /// Absolute path of the input, when known.
    pub file: Option<String>,
    /// 1-based line of the failure.
    pub line: usize,
    /// 1-based column of the failure.
    pub column: usize,
}

impl CssSyntaxError {
    pub fn new(reason: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            reason: reason.into(),
            file: None,
            line,
            column,
        }
    }

    /// Attach the input file path.
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = StylesmithError::config("plugin options must be an object");
        assert_eq!(
            err.to_string(),
            "config error: plugin options must be an object"
        );

        let err = StylesmithError::module_not_found("nonexistent-plugin");
        assert!(err.to_string().contains("nonexistent-plugin"));
        assert_eq!(err.code(), Some(MODULE_NOT_FOUND_CODE));
    }

    #[test]
    fn syntax_error_reports_position_and_kind() {
        let err: StylesmithError = CssSyntaxError::new("Unknown word", 1, 1)
            .with_file("/site/src/first.css")
            .into();
        assert_eq!(err.kind(), "CssSyntaxError");
        assert_eq!(err.to_string(), "/site/src/first.css:1:1: Unknown word");
        assert_eq!(err.code(), None);
    }

    #[test]
    fn processing_error_serializes_payload() {
        let err = StylesmithError::processing(&serde_json::json!({"reason": "boom"}));
        assert_eq!(err.kind(), "Error");
        assert_eq!(
            err.to_string(),
            r#"Error during processing: {"reason":"boom"}"#
        );
    }
}

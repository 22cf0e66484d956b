//! Error types for the Dotprompt metadata pipeline.
//!
//! This module defines a unified error enum that covers all error categories
//! in the workspace: configuration, I/O, parsing, tool resolution, schema
//! expansion, and prompt storage/rendering.

use thiserror::Error;

/// Unified error type for Dotprompt.
///
/// All fallible functions in the workspace return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed template text or front-matter
    #[error("Parse error: {0}")]
    Parse(String),

    /// A tool resolver is configured but reported the tool as absent
    #[error("Unable to resolve tool '{0}' to a recognized tool definition")]
    ToolNotFound(String),

    /// The tool resolver call itself failed
    #[error("Tool resolver failed for '{name}': {message}")]
    ToolResolverFailed { name: String, message: String },

    /// Picoschema expansion failed (malformed shorthand or a failed named lookup)
    #[error("Schema expansion error: {0}")]
    SchemaExpansion(String),

    /// Prompt store and rendering errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl AppError {
    /// Wrap a failure raised by a user-supplied tool resolver.
    pub fn tool_resolver_failed(name: impl Into<String>, err: anyhow::Error) -> Self {
        AppError::ToolResolverFailed {
            name: name.into(),
            message: format!("{:#}", err),
        }
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

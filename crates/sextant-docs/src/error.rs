//! Error types for schema generation.

use thiserror::Error;

/// Errors that can occur while generating or serving a schema.
#[derive(Debug, Error)]
pub enum DocsError {
    /// Two schema-visible routes document the same operation.
    #[error("Duplicate operation: {method} {path}")]
    DuplicateOperation {
        /// Full path of the operation, mount prefixes included.
        path: String,
        /// Lowercase HTTP method.
        method: String,
    },

    /// The base document is not a YAML mapping.
    #[error("Invalid base document: {reason}")]
    InvalidBase {
        /// Why the base was rejected.
        reason: String,
    },

    /// The request carries no route table to document.
    #[error("No route table found on the request")]
    MissingRouteTable,

    /// YAML parsing or serialization failed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type for schema operations.
pub type DocsResult<T> = Result<T, DocsError>;

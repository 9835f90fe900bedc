//! Router error types.

use sextant_core::BoxError;
use thiserror::Error;

/// Errors raised while building a route table.
#[derive(Debug, Error)]
pub enum RouterError {
    /// A path pattern could not be compiled.
    #[error("invalid path pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The pattern as declared.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl RouterError {
    /// Create an invalid pattern error.
    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by lifespan hooks.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A startup hook failed. Carries the hook's own error.
    #[error("startup hook '{hook}' failed: {source}")]
    StartupFailed {
        /// Hook name.
        hook: String,
        /// The error returned by the hook.
        #[source]
        source: BoxError,
    },

    /// One or more shutdown hooks failed.
    #[error("shutdown hooks failed: {0}")]
    ShutdownFailed(String),
}

impl LifecycleError {
    /// Unwrap the original error of a failed startup hook.
    pub fn into_source(self) -> BoxError {
        match self {
            Self::StartupFailed { source, .. } => source,
            other => Box::new(other),
        }
    }
}

/// Result type for lifespan hooks.
pub type LifecycleResult<T = ()> = Result<T, LifecycleError>;

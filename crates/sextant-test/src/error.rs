//! Test error types.

use sextant_core::{BoxError, ProtocolError, WebSocketDisconnect};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised by the test client.
///
/// Application failures keep the original error value, so a test can
/// `downcast_ref` the exact type the application produced:
///
/// ```ignore
/// let err = client.get("/error").send().unwrap_err();
/// assert!(err.application_error().unwrap().downcast_ref::<MyError>().is_some());
/// ```
#[derive(Debug, Error)]
pub enum TestError {
    /// The application returned an error or panicked.
    #[error("application error: {0}")]
    Application(#[source] BoxError),

    /// The application finished without starting a response.
    #[error("TestClient did not receive any response")]
    NoResponse,

    /// The application violated the event protocol.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The application closed the WebSocket.
    #[error(transparent)]
    WebSocketDisconnect(#[from] WebSocketDisconnect),

    /// The application reported `lifespan.startup.failed`.
    #[error("lifespan startup failed: {0}")]
    StartupFailed(String),

    /// The application reported `lifespan.shutdown.failed`.
    #[error("lifespan shutdown failed: {0}")]
    ShutdownFailed(String),

    /// Request building failed.
    #[error("request build error: {0}")]
    RequestBuild(String),

    /// Header name or value is invalid.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// The background runtime could not be created.
    #[error("failed to start background runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// Response body is not valid UTF-8.
    #[error("response body is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Form encoding failed.
    #[error("form encoding error: {0}")]
    Form(#[from] serde_urlencoded::ser::Error),

    /// Client configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl TestError {
    /// The application's own error, if this is an application failure.
    pub fn application_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::Application(err) => Some(err.as_ref()),
            _ => None,
        }
    }

    /// Take the application's own error out of this one.
    pub fn into_application_error(self) -> Result<BoxError, Self> {
        match self {
            Self::Application(err) => Ok(err),
            other => Err(other),
        }
    }

    /// Close code if the application closed the WebSocket.
    pub fn close_code(&self) -> Option<u16> {
        match self {
            Self::WebSocketDisconnect(disconnect) => Some(disconnect.code),
            _ => None,
        }
    }
}

//! Error types shared across Sextant.
//!
//! Applications report failures as [`BoxError`] so that the original error
//! value (and therefore its concrete type) survives the trip through the
//! event protocol. Protocol misuse is reported with [`ProtocolError`].

use std::any::Any;

use thiserror::Error;

/// A type-erased application error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type returned by applications, handlers and hooks.
pub type AppResult<T = ()> = Result<T, BoxError>;

/// Violations of the event protocol.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A message arrived that is not valid at this point of the stream.
    #[error("expected {expected}, got '{actual}'")]
    UnexpectedMessage {
        /// What the receiver was waiting for.
        expected: &'static str,
        /// The type of the message that actually arrived.
        actual: &'static str,
    },

    /// The other side of the event stream has gone away.
    #[error("event stream closed")]
    Closed,

    /// The operation is not allowed in the current connection state.
    #[error("invalid protocol state: {0}")]
    InvalidState(String),
}

impl ProtocolError {
    /// Create an unexpected message error.
    pub fn unexpected(expected: &'static str, actual: &'static str) -> Self {
        Self::UnexpectedMessage { expected, actual }
    }

    /// Create an invalid state error.
    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState(reason.into())
    }
}

/// The peer closed the WebSocket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("websocket disconnected with code {code}")]
pub struct WebSocketDisconnect {
    /// Close code sent by the peer.
    pub code: u16,
}

impl WebSocketDisconnect {
    /// Create a disconnect condition for the given close code.
    pub fn new(code: u16) -> Self {
        Self { code }
    }
}

/// Errors surfaced by WebSocket operations on either side of the connection.
#[derive(Debug, Error)]
pub enum WebSocketError {
    /// The connection was closed by the peer.
    #[error(transparent)]
    Disconnected(#[from] WebSocketDisconnect),

    /// The message stream was used incorrectly.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A JSON payload could not be decoded.
    #[error("failed to decode JSON payload: {0}")]
    Decode(#[source] serde_json::Error),

    /// A value could not be encoded as JSON.
    #[error("failed to encode JSON payload: {0}")]
    Encode(#[source] serde_json::Error),
}

impl WebSocketError {
    /// Get the close code if this error is a disconnect.
    pub fn close_code(&self) -> Option<u16> {
        match self {
            Self::Disconnected(disconnect) => Some(disconnect.code),
            _ => None,
        }
    }

    /// Check if this error is a disconnect.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Disconnected(_))
    }
}

/// Errors raised while reading a request body.
#[derive(Debug, Error)]
pub enum BodyError {
    /// The client disconnected before the body was complete.
    #[error("client disconnected before the request body was complete")]
    Disconnected,

    /// The event stream was used incorrectly.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The body is not valid UTF-8.
    #[error("request body is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// The body is not valid JSON for the requested type.
    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),

    /// The body is not a valid urlencoded form.
    #[error("invalid form body: {0}")]
    Form(#[from] serde_urlencoded::de::Error),
}

/// A panic raised inside an application, captured as an error value.
#[derive(Debug, Error)]
#[error("application panicked: {message}")]
pub struct ApplicationPanic {
    message: String,
}

impl ApplicationPanic {
    /// Build from a panic payload as returned by `catch_unwind`.
    pub fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&'static str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self { message }
    }

    /// The panic message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

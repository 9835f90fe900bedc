//! Application-side WebSocket helper.
//!
//! [`WebSocket`] wraps the event handles of a `websocket` connection and
//! tracks the connection state of both peers. It is cheap to clone, so a
//! handler can move one clone into a spawned task (for example to send
//! while another task is blocked in [`WebSocket::receive_text`]).

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::app::{Receiver, Sender};
use crate::error::{ProtocolError, WebSocketDisconnect, WebSocketError};
use crate::protocol::{ConnectionScope, Frame, Message};

/// Connection state of one side of a WebSocket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebSocketState {
    /// Handshake not finished.
    Connecting,
    /// Frames may be exchanged.
    Connected,
    /// Closed.
    Disconnected,
}

/// Standard WebSocket close codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CloseCode {
    /// Normal closure (1000).
    Normal = 1000,
    /// Going away (1001).
    GoingAway = 1001,
    /// Protocol error (1002).
    Protocol = 1002,
    /// Unsupported data (1003).
    Unsupported = 1003,
    /// Abnormal closure (1006).
    Abnormal = 1006,
    /// Policy violation (1008).
    PolicyViolation = 1008,
    /// Internal error (1011).
    InternalError = 1011,
}

impl CloseCode {
    /// Convert from a numeric code.
    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            1000 => Some(Self::Normal),
            1001 => Some(Self::GoingAway),
            1002 => Some(Self::Protocol),
            1003 => Some(Self::Unsupported),
            1006 => Some(Self::Abnormal),
            1008 => Some(Self::PolicyViolation),
            1011 => Some(Self::InternalError),
            _ => None,
        }
    }

    /// The numeric code.
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.as_u16()
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Normal => "Normal",
            Self::GoingAway => "GoingAway",
            Self::Protocol => "Protocol",
            Self::Unsupported => "Unsupported",
            Self::Abnormal => "Abnormal",
            Self::PolicyViolation => "PolicyViolation",
            Self::InternalError => "InternalError",
        };
        write!(f, "{} ({})", name, self.as_u16())
    }
}

struct States {
    client: WebSocketState,
    application: WebSocketState,
}

struct Inner {
    scope: ConnectionScope,
    receive: Receiver,
    send: Sender,
    states: Mutex<States>,
}

/// A WebSocket connection as seen by the application.
#[derive(Clone)]
pub struct WebSocket {
    inner: Arc<Inner>,
}

impl WebSocket {
    /// Wrap the event handles of a `websocket` scope.
    pub fn new(scope: ConnectionScope, receive: Receiver, send: Sender) -> Self {
        Self {
            inner: Arc::new(Inner {
                scope,
                receive,
                send,
                states: Mutex::new(States {
                    client: WebSocketState::Connecting,
                    application: WebSocketState::Connecting,
                }),
            }),
        }
    }

    /// The connection scope.
    pub fn scope(&self) -> &ConnectionScope {
        &self.inner.scope
    }

    /// A parameter captured by the matched route.
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.inner.scope.path_params.get(name).map(String::as_str)
    }

    /// Subprotocols requested by the client.
    pub fn subprotocols(&self) -> &[String] {
        &self.inner.scope.subprotocols
    }

    /// State of the client side.
    pub fn client_state(&self) -> WebSocketState {
        self.inner.states.lock().client
    }

    /// State of the application side.
    pub fn application_state(&self) -> WebSocketState {
        self.inner.states.lock().application
    }

    /// Receive the next raw event from the client.
    ///
    /// The first event must be `websocket.connect`; afterwards only
    /// `websocket.receive` and `websocket.disconnect` are valid.
    pub async fn receive(&self) -> Result<Message, WebSocketError> {
        let state = self.client_state();
        if state == WebSocketState::Disconnected {
            return Err(ProtocolError::invalid_state(
                "cannot receive once a disconnect message has been received",
            )
            .into());
        }

        let message = self.inner.receive.receive().await;
        let next = match (state, &message) {
            (WebSocketState::Connecting, Message::WebSocketConnect) => WebSocketState::Connected,
            (WebSocketState::Connecting, other) => {
                return Err(ProtocolError::unexpected("websocket.connect", other.kind()).into());
            }
            (_, Message::WebSocketReceive(_)) => WebSocketState::Connected,
            (_, Message::WebSocketDisconnect { .. }) => WebSocketState::Disconnected,
            (_, other) => {
                return Err(ProtocolError::unexpected(
                    "websocket.receive or websocket.disconnect",
                    other.kind(),
                )
                .into());
            }
        };
        self.inner.states.lock().client = next;
        Ok(message)
    }

    /// Send a raw event to the client.
    pub async fn send(&self, message: Message) -> Result<(), WebSocketError> {
        let state = self.application_state();
        let next = match (state, &message) {
            (WebSocketState::Connecting, Message::WebSocketAccept { .. }) => {
                WebSocketState::Connected
            }
            (WebSocketState::Connecting | WebSocketState::Connected, Message::WebSocketClose { .. }) => {
                WebSocketState::Disconnected
            }
            (WebSocketState::Connecting, other) => {
                return Err(ProtocolError::unexpected(
                    "websocket.accept or websocket.close",
                    other.kind(),
                )
                .into());
            }
            (WebSocketState::Connected, Message::WebSocketSend(_)) => WebSocketState::Connected,
            (WebSocketState::Connected, other) => {
                return Err(ProtocolError::unexpected(
                    "websocket.send or websocket.close",
                    other.kind(),
                )
                .into());
            }
            (WebSocketState::Disconnected, _) => {
                return Err(ProtocolError::invalid_state(
                    "cannot send once the connection has been closed",
                )
                .into());
            }
        };

        self.inner.send.send(message).await?;
        self.inner.states.lock().application = next;
        Ok(())
    }

    /// Accept the connection, consuming the client's `websocket.connect`
    /// first if it has not been received yet.
    pub async fn accept(&self, subprotocol: Option<&str>) -> Result<(), WebSocketError> {
        if self.client_state() == WebSocketState::Connecting {
            self.receive().await?;
        }
        self.send(Message::WebSocketAccept {
            subprotocol: subprotocol.map(str::to_string),
            headers: Vec::new(),
        })
        .await
    }

    /// Receive the next data frame.
    ///
    /// A client disconnect is reported as [`WebSocketError::Disconnected`].
    pub async fn receive_frame(&self) -> Result<Frame, WebSocketError> {
        if self.application_state() != WebSocketState::Connected {
            return Err(ProtocolError::invalid_state(
                "websocket is not connected, call accept first",
            )
            .into());
        }
        match self.receive().await? {
            Message::WebSocketReceive(frame) => Ok(frame),
            Message::WebSocketDisconnect { code } => Err(WebSocketDisconnect::new(code).into()),
            other => Err(ProtocolError::unexpected("websocket.receive", other.kind()).into()),
        }
    }

    /// Receive a text frame.
    pub async fn receive_text(&self) -> Result<String, WebSocketError> {
        match self.receive_frame().await? {
            Frame::Text(text) => Ok(text),
            frame @ Frame::Binary(_) => Err(ProtocolError::unexpected("text", frame.kind()).into()),
        }
    }

    /// Receive a binary frame.
    pub async fn receive_bytes(&self) -> Result<Bytes, WebSocketError> {
        match self.receive_frame().await? {
            Frame::Binary(data) => Ok(data),
            frame @ Frame::Text(_) => Err(ProtocolError::unexpected("bytes", frame.kind()).into()),
        }
    }

    /// Receive a frame of either kind and decode it as JSON.
    pub async fn receive_json<T: DeserializeOwned>(&self) -> Result<T, WebSocketError> {
        let value = match self.receive_frame().await? {
            Frame::Text(text) => serde_json::from_str(&text),
            Frame::Binary(data) => serde_json::from_slice(&data),
        };
        value.map_err(WebSocketError::Decode)
    }

    /// Send a text frame.
    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), WebSocketError> {
        self.send(Message::WebSocketSend(Frame::Text(text.into())))
            .await
    }

    /// Send a binary frame.
    pub async fn send_bytes(&self, data: impl Into<Bytes>) -> Result<(), WebSocketError> {
        self.send(Message::WebSocketSend(Frame::Binary(data.into())))
            .await
    }

    /// Serialize a value as JSON and send it as a text frame.
    pub async fn send_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), WebSocketError> {
        let text = serde_json::to_string(value).map_err(WebSocketError::Encode)?;
        self.send_text(text).await
    }

    /// Close the connection with the given code.
    ///
    /// Closing before accepting rejects the handshake.
    pub async fn close(&self, code: impl Into<u16>) -> Result<(), WebSocketError> {
        self.send(Message::WebSocketClose {
            code: code.into(),
            reason: None,
        })
        .await
    }

    /// Close the connection with a code and reason.
    pub async fn close_with_reason(
        &self,
        code: impl Into<u16>,
        reason: impl Into<String>,
    ) -> Result<(), WebSocketError> {
        self.send(Message::WebSocketClose {
            code: code.into(),
            reason: Some(reason.into()),
        })
        .await
    }
}

impl fmt::Debug for WebSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocket")
            .field("path", &self.inner.scope.path)
            .field("client_state", &self.client_state())
            .field("application_state", &self.application_state())
            .finish()
    }
}

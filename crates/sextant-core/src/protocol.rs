//! The ASGI-style event protocol.
//!
//! A server (or the test client) calls an application with a [`Scope`]
//! describing the connection, then exchanges [`Message`]s with it: the
//! server feeds request events through the application's receive handle and
//! collects the events the application emits through its send handle.
//!
//! ```text
//! server ──► http.request ... ──► http.disconnect        (receive)
//! server ◄── http.response.start ◄── http.response.body  (send)
//! ```

use std::collections::BTreeMap;

use bytes::Bytes;
use http::{Extensions, HeaderName, HeaderValue, Method, StatusCode};

/// Ordered header list. Keeps insertion order and allows duplicate names.
pub type HeaderList = Vec<(HeaderName, HeaderValue)>;

/// HTTP version reported in connection scopes.
pub const HTTP_VERSION: &str = "1.1";

/// The kind of connection an application is invoked for.
#[derive(Debug, Clone)]
pub enum Scope {
    /// A plain HTTP request.
    Http(ConnectionScope),
    /// A WebSocket connection.
    WebSocket(ConnectionScope),
    /// Application startup and shutdown.
    Lifespan,
}

impl Scope {
    /// The protocol name of this scope.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Http(_) => "http",
            Self::WebSocket(_) => "websocket",
            Self::Lifespan => "lifespan",
        }
    }

    /// The connection details, absent for lifespan scopes.
    pub fn connection(&self) -> Option<&ConnectionScope> {
        match self {
            Self::Http(scope) | Self::WebSocket(scope) => Some(scope),
            Self::Lifespan => None,
        }
    }

    /// Mutable access to the connection details.
    pub fn connection_mut(&mut self) -> Option<&mut ConnectionScope> {
        match self {
            Self::Http(scope) | Self::WebSocket(scope) => Some(scope),
            Self::Lifespan => None,
        }
    }
}

/// Details of a single HTTP or WebSocket connection.
#[derive(Debug, Clone)]
pub struct ConnectionScope {
    /// HTTP version, e.g. `1.1`.
    pub http_version: String,
    /// Request method (`GET` for WebSocket handshakes).
    pub method: Method,
    /// URL scheme: `http`, `https`, `ws` or `wss`.
    pub scheme: String,
    /// Percent-decoded path, relative to `root_path`.
    pub path: String,
    /// The path exactly as it appeared on the request line.
    pub raw_path: Bytes,
    /// Prefix under which the application is mounted.
    pub root_path: String,
    /// Raw query string without the leading `?`.
    pub query_string: Bytes,
    /// Request headers with lowercase names, in request order.
    pub headers: HeaderList,
    /// Client address as host and port.
    pub client: Option<(String, u16)>,
    /// Server address as host and port.
    pub server: Option<(String, u16)>,
    /// Subprotocols requested by a WebSocket client.
    pub subprotocols: Vec<String>,
    /// Parameters captured by the route that matched this connection.
    pub path_params: BTreeMap<String, String>,
    /// Typed values attached by servers, routers and middleware.
    pub extensions: Extensions,
}

impl ConnectionScope {
    /// Create a scope for the given method and path with empty metadata.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            http_version: HTTP_VERSION.to_string(),
            method,
            scheme: "http".to_string(),
            raw_path: Bytes::from(path.clone()),
            path,
            root_path: String::new(),
            query_string: Bytes::new(),
            headers: Vec::new(),
            client: None,
            server: None,
            subprotocols: Vec::new(),
            path_params: BTreeMap::new(),
            extensions: Extensions::new(),
        }
    }

    /// First header with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&HeaderValue> {
        self.headers
            .iter()
            .find(|(key, _)| key.as_str().eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    /// First header with the given name as a string.
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.header(name).and_then(|value| value.to_str().ok())
    }

    /// All values of the given header, in order.
    pub fn header_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a HeaderValue> + 'a {
        self.headers
            .iter()
            .filter(move |(key, _)| key.as_str().eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }
}

/// A WebSocket data frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A UTF-8 text frame.
    Text(String),
    /// A binary frame.
    Binary(Bytes),
}

impl Frame {
    /// Create a text frame.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Create a binary frame.
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::Binary(data.into())
    }

    /// Payload kind, `text` or `bytes`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Binary(_) => "bytes",
        }
    }
}

/// A single protocol event.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// The server asks the application to start up.
    LifespanStartup,
    /// Startup finished successfully.
    LifespanStartupComplete,
    /// Startup failed.
    LifespanStartupFailed {
        /// Failure description.
        message: String,
    },
    /// The server asks the application to shut down.
    LifespanShutdown,
    /// Shutdown finished successfully.
    LifespanShutdownComplete,
    /// Shutdown failed.
    LifespanShutdownFailed {
        /// Failure description.
        message: String,
    },

    /// A chunk of the request body.
    HttpRequest {
        /// Chunk payload.
        body: Bytes,
        /// Whether more chunks follow.
        more_body: bool,
    },
    /// The client is gone. Terminal for the request stream.
    HttpDisconnect,
    /// Start of the response.
    HttpResponseStart {
        /// Response status.
        status: StatusCode,
        /// Response headers, in order.
        headers: HeaderList,
    },
    /// A chunk of the response body.
    HttpResponseBody {
        /// Chunk payload.
        body: Bytes,
        /// Whether more chunks follow.
        more_body: bool,
    },

    /// The client wants to open a WebSocket.
    WebSocketConnect,
    /// The application accepts the WebSocket.
    WebSocketAccept {
        /// Negotiated subprotocol.
        subprotocol: Option<String>,
        /// Extra handshake response headers.
        headers: HeaderList,
    },
    /// A frame sent by the client.
    WebSocketReceive(Frame),
    /// A frame sent by the application.
    WebSocketSend(Frame),
    /// The client closed the WebSocket. Terminal for the inbound stream.
    WebSocketDisconnect {
        /// Close code.
        code: u16,
    },
    /// The application closes (or rejects) the WebSocket.
    WebSocketClose {
        /// Close code.
        code: u16,
        /// Optional close reason.
        reason: Option<String>,
    },
}

impl Message {
    /// The protocol type string of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LifespanStartup => "lifespan.startup",
            Self::LifespanStartupComplete => "lifespan.startup.complete",
            Self::LifespanStartupFailed { .. } => "lifespan.startup.failed",
            Self::LifespanShutdown => "lifespan.shutdown",
            Self::LifespanShutdownComplete => "lifespan.shutdown.complete",
            Self::LifespanShutdownFailed { .. } => "lifespan.shutdown.failed",
            Self::HttpRequest { .. } => "http.request",
            Self::HttpDisconnect => "http.disconnect",
            Self::HttpResponseStart { .. } => "http.response.start",
            Self::HttpResponseBody { .. } => "http.response.body",
            Self::WebSocketConnect => "websocket.connect",
            Self::WebSocketAccept { .. } => "websocket.accept",
            Self::WebSocketReceive(_) => "websocket.receive",
            Self::WebSocketSend(_) => "websocket.send",
            Self::WebSocketDisconnect { .. } => "websocket.disconnect",
            Self::WebSocketClose { .. } => "websocket.close",
        }
    }

    /// A complete, single-chunk request body.
    pub fn request_body(body: impl Into<Bytes>) -> Self {
        Self::HttpRequest {
            body: body.into(),
            more_body: false,
        }
    }

    /// Check if this message ends the stream it travels on.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::HttpDisconnect
                | Self::HttpResponseBody {
                    more_body: false,
                    ..
                }
                | Self::WebSocketDisconnect { .. }
                | Self::WebSocketClose { .. }
        )
    }
}

//! Request and WebSocket handlers.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use sextant_core::{AppResult, BoxFuture, Request, Response, WebSocket};

/// Handles an HTTP request and produces a response.
///
/// Implemented for every `async fn(Request) -> AppResult<Response>`.
pub trait Handler: Send + Sync + 'static {
    /// Handle one request.
    fn call(&self, request: Request) -> BoxFuture<'static, AppResult<Response>>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<Response>> + Send + 'static,
{
    fn call(&self, request: Request) -> BoxFuture<'static, AppResult<Response>> {
        Box::pin(self(request))
    }
}

/// Handles one WebSocket connection.
///
/// Implemented for every `async fn(WebSocket) -> AppResult`.
pub trait WebSocketHandler: Send + Sync + 'static {
    /// Drive the connection until it is done.
    fn call(&self, socket: WebSocket) -> BoxFuture<'static, AppResult>;
}

impl<F, Fut> WebSocketHandler for F
where
    F: Fn(WebSocket) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult> + Send + 'static,
{
    fn call(&self, socket: WebSocket) -> BoxFuture<'static, AppResult> {
        Box::pin(self(socket))
    }
}

/// A handler together with its documentation string.
///
/// The documentation is what the schema generator reads; it is free text,
/// optionally ending with a YAML section after a `---` line.
#[derive(Clone)]
pub struct Endpoint {
    handler: Arc<dyn Handler>,
    doc: Option<String>,
}

impl Endpoint {
    /// Wrap a handler without documentation.
    pub fn new(handler: impl Handler) -> Self {
        Self {
            handler: Arc::new(handler),
            doc: None,
        }
    }

    /// Attach a documentation string.
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// The documentation string, if any.
    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    /// Invoke the handler.
    pub fn call(&self, request: Request) -> BoxFuture<'static, AppResult<Response>> {
        self.handler.call(request)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("documented", &self.doc.is_some())
            .finish_non_exhaustive()
    }
}

/// Conversion into an [`Endpoint`], so bare handlers and documented
/// endpoints can be registered the same way.
pub trait IntoEndpoint {
    /// Perform the conversion.
    fn into_endpoint(self) -> Endpoint;
}

impl IntoEndpoint for Endpoint {
    fn into_endpoint(self) -> Endpoint {
        self
    }
}

impl<H: Handler> IntoEndpoint for H {
    fn into_endpoint(self) -> Endpoint {
        Endpoint::new(self)
    }
}

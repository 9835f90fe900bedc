//! Synchronous test client.

use std::fmt;
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use http::header::{self, HeaderName, HeaderValue};
use http::Method;
use serde::Serialize;
use sextant_core::{AppEntry, Application, CloseCode, ConnectionScope, HeaderList};

use crate::config::TestClientConfig;
use crate::error::TestError;
use crate::lifespan::{LifespanScope, LifespanSession};
use crate::request::{
    header_pair, merge_headers, set_header, standard_headers, MultipartForm, RequestBody, Target,
    CLIENT_ADDR,
};
use crate::response::TestResponse;
use crate::runner::LoopRunner;
use crate::transport::{run_http, ExchangeOptions};
use crate::websocket::WebSocketSession;

/// A synchronous client driving an application in-process.
///
/// Each request runs one complete exchange with the application on the
/// client's own background runtime and returns the captured response. No
/// sockets are opened.
///
/// # Example
///
/// ```ignore
/// use sextant_test::TestClient;
///
/// let client = TestClient::new(app);
/// let response = client.get("/users").send()?;
/// assert_eq!(response.status_code(), 200);
///
/// client.with_websocket("/ws", &[], |ws| {
///     ws.send_text("ping")?;
///     assert_eq!(ws.receive_text()?, "pong");
///     Ok(())
/// })?;
/// ```
#[must_use]
pub struct TestClient {
    app: Arc<dyn Application>,
    config: TestClientConfig,
    default_headers: HeaderList,
    runner: OnceLock<LoopRunner>,
}

impl TestClient {
    /// Creates a client for a single-stage application.
    pub fn new(app: impl Application) -> Self {
        Self::from_entry(AppEntry::new(app))
    }

    /// Creates a client for an application in either entry style.
    pub fn from_entry(entry: AppEntry) -> Self {
        Self {
            app: entry.into_application(),
            config: TestClientConfig::default(),
            default_headers: standard_headers(),
            runner: OnceLock::new(),
        }
    }

    /// Creates a client with explicit configuration.
    pub fn with_config(app: impl Application, config: TestClientConfig) -> Result<Self, TestError> {
        Self::new(app).configure(config)
    }

    /// Applies a configuration to this client.
    pub fn configure(mut self, config: TestClientConfig) -> Result<Self, TestError> {
        config.validate()?;
        for (name, value) in &config.default_headers {
            let (name, value) = header_pair(name, value)?;
            set_header(&mut self.default_headers, name, value);
        }
        self.config = config;
        Ok(self)
    }

    /// Sets the base URL relative request paths are resolved against.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    /// Sets the root path reported in connection scopes.
    pub fn root_path(mut self, root_path: impl Into<String>) -> Self {
        self.config.root_path = root_path.into();
        self
    }

    /// Sets whether application errors are returned from `send`.
    ///
    /// When disabled, a failing application still produces a response:
    /// whatever it sent, or an empty 500.
    pub fn raise_server_exceptions(mut self, raise: bool) -> Self {
        self.config.raise_server_exceptions = raise;
        self
    }

    /// Adds a header sent with every request, replacing a default of the
    /// same name.
    pub fn default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        set_header(&mut self.default_headers, name, value);
        self
    }

    /// The client configuration.
    pub fn config(&self) -> &TestClientConfig {
        &self.config
    }

    /// Creates a GET request builder.
    pub fn get(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::GET, uri)
    }

    /// Creates a POST request builder.
    pub fn post(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::POST, uri)
    }

    /// Creates a PUT request builder.
    pub fn put(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::PUT, uri)
    }

    /// Creates a PATCH request builder.
    pub fn patch(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::PATCH, uri)
    }

    /// Creates a DELETE request builder.
    pub fn delete(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::DELETE, uri)
    }

    /// Creates a HEAD request builder.
    pub fn head(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::HEAD, uri)
    }

    /// Creates an OPTIONS request builder.
    pub fn options(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::OPTIONS, uri)
    }

    /// Creates a request builder with a custom method.
    pub fn request(&self, method: Method, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, method, uri.as_ref())
    }

    /// Opens a WebSocket session.
    ///
    /// Fails with [`TestError::WebSocketDisconnect`] if the application
    /// closes the connection instead of accepting it.
    pub fn websocket_connect(
        &self,
        uri: impl AsRef<str>,
        subprotocols: &[&str],
    ) -> Result<WebSocketSession<'_>, TestError> {
        let target = Target::resolve(&self.config.base_url, uri.as_ref())?.into_websocket();

        let mut request = vec![
            (header::CONNECTION, HeaderValue::from_static("upgrade")),
            (
                header::SEC_WEBSOCKET_KEY,
                HeaderValue::from_static("testserver=="),
            ),
            (header::SEC_WEBSOCKET_VERSION, HeaderValue::from_static("13")),
        ];
        if !subprotocols.is_empty() {
            let (name, value) =
                header_pair(header::SEC_WEBSOCKET_PROTOCOL.as_str(), &subprotocols.join(", "))?;
            request.push((name, value));
        }
        let headers = merge_headers(target.host_header()?, &self.default_headers, request);

        let mut scope = self.connection_scope(Method::GET, &target, headers);
        scope.subprotocols = subprotocols.iter().map(|s| (*s).to_string()).collect();

        WebSocketSession::connect(
            self.runner()?,
            Arc::clone(&self.app),
            scope,
            self.config.channel_capacity,
        )
    }

    /// Runs `f` with an open WebSocket session, closing it afterwards.
    ///
    /// An error from `f` takes precedence over an error from closing.
    pub fn with_websocket<T, F>(
        &self,
        uri: impl AsRef<str>,
        subprotocols: &[&str],
        f: F,
    ) -> Result<T, TestError>
    where
        F: FnOnce(&mut WebSocketSession<'_>) -> Result<T, TestError>,
    {
        let mut session = self.websocket_connect(uri, subprotocols)?;
        let result = f(&mut session);
        let closed = session.close(CloseCode::Normal);
        match (result, closed) {
            (Ok(value), closed) => closed.map(|()| value),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(close_err)) => {
                tracing::debug!(error = %close_err, "WebSocket close failed after an earlier error");
                Err(err)
            }
        }
    }

    /// Runs lifespan startup and returns a scope that runs shutdown when it
    /// ends.
    ///
    /// A startup failure consumes the client and returns the application's
    /// own error.
    pub fn enter(self) -> Result<LifespanScope, TestError> {
        let lifespan = LifespanSession::start(
            self.runner()?,
            Arc::clone(&self.app),
            self.config.channel_capacity,
        )?;
        Ok(LifespanScope::new(self, lifespan))
    }

    pub(crate) fn runner(&self) -> Result<&LoopRunner, TestError> {
        if let Some(runner) = self.runner.get() {
            return Ok(runner);
        }
        let runner = LoopRunner::new("sextant-testclient")?;
        Ok(self.runner.get_or_init(|| runner))
    }

    fn connection_scope(&self, method: Method, target: &Target, headers: HeaderList) -> ConnectionScope {
        let mut scope = ConnectionScope::new(method, target.path());
        scope.scheme.clone_from(&target.scheme);
        scope.raw_path = Bytes::from(target.raw_path.clone());
        scope.root_path.clone_from(&self.config.root_path);
        scope.query_string = Bytes::from(target.query.clone());
        scope.headers = headers;
        scope.client = Some((CLIENT_ADDR.0.to_string(), CLIENT_ADDR.1));
        scope.server = Some((target.host.clone(), target.port));
        scope
    }

    fn exchange(
        &self,
        method: Method,
        target: &Target,
        headers: HeaderList,
        body: RequestBody,
    ) -> Result<TestResponse, TestError> {
        let scope = self.connection_scope(method, target, headers);
        let options = ExchangeOptions {
            raise_server_exceptions: self.config.raise_server_exceptions,
            channel_capacity: self.config.channel_capacity,
        };
        let exchange = run_http(Arc::clone(&self.app), scope, body.into_chunks(), options);
        self.runner()?.block_on(exchange)?
    }
}

impl fmt::Debug for TestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestClient")
            .field("config", &self.config)
            .field("default_headers", &self.default_headers)
            .finish_non_exhaustive()
    }
}

/// A request builder bound to a test client.
///
/// Builder errors (invalid headers, serialization failures) are reported by
/// [`send`](Self::send).
#[must_use]
pub struct TestClientRequest<'a> {
    client: &'a TestClient,
    method: Method,
    uri: String,
    headers: HeaderList,
    query: Vec<String>,
    body: RequestBody,
    body_content_type: Option<HeaderValue>,
    error: Option<TestError>,
}

impl<'a> TestClientRequest<'a> {
    fn new(client: &'a TestClient, method: Method, uri: &str) -> Self {
        Self {
            client,
            method,
            uri: uri.to_string(),
            headers: Vec::new(),
            query: Vec::new(),
            body: RequestBody::Empty,
            body_content_type: None,
            error: None,
        }
    }

    fn fail(mut self, err: TestError) -> Self {
        self.error.get_or_insert(err);
        self
    }

    /// Adds a header. Repeated names are sent repeatedly, in order.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        match header_pair(name.as_ref(), value.as_ref()) {
            Ok(pair) => {
                self.headers.push(pair);
                self
            }
            Err(err) => self.fail(err),
        }
    }

    /// Adds several headers in order.
    pub fn headers<I, K, V>(self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        headers
            .into_iter()
            .fold(self, |request, (name, value)| request.header(name, value))
    }

    /// Appends query parameters, e.g. `&[("page", "2")]`.
    pub fn query<T: Serialize + ?Sized>(mut self, query: &T) -> Self {
        match serde_urlencoded::to_string(query) {
            Ok(encoded) => {
                self.query.push(encoded);
                self
            }
            Err(err) => self.fail(err.into()),
        }
    }

    /// Sets the Content-Type header.
    pub fn content_type(self, content_type: impl AsRef<str>) -> Self {
        self.header(header::CONTENT_TYPE.as_str(), content_type)
    }

    /// Sets the Authorization header with a Bearer token.
    pub fn bearer_token(self, token: impl AsRef<str>) -> Self {
        self.header(
            header::AUTHORIZATION.as_str(),
            format!("Bearer {}", token.as_ref()),
        )
    }

    /// Sets the raw request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = RequestBody::Full(body.into());
        self
    }

    /// Sets a body delivered to the application in several chunks.
    pub fn body_chunks<I>(mut self, chunks: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Bytes>,
    {
        self.body = RequestBody::Chunks(chunks.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the request body as JSON.
    ///
    /// Also sets `Content-Type: application/json` unless a content type was
    /// given explicitly.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => {
                self.body = RequestBody::Full(Bytes::from(body));
                self.body_content_type = Some(HeaderValue::from_static("application/json"));
                self
            }
            Err(err) => self.fail(err.into()),
        }
    }

    /// Sets the request body as a urlencoded form.
    pub fn form<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_urlencoded::to_string(value) {
            Ok(body) => {
                self.body = RequestBody::Full(Bytes::from(body));
                self.body_content_type =
                    Some(HeaderValue::from_static("application/x-www-form-urlencoded"));
                self
            }
            Err(err) => self.fail(err.into()),
        }
    }

    /// Sets a `multipart/form-data` body.
    pub fn multipart(mut self, form: MultipartForm) -> Self {
        match HeaderValue::try_from(form.content_type()) {
            Ok(content_type) => {
                self.body = RequestBody::Full(form.encode());
                self.body_content_type = Some(content_type);
                self
            }
            Err(err) => self.fail(TestError::InvalidHeader(format!("content-type: {err}"))),
        }
    }

    /// Runs the exchange and returns the captured response.
    pub fn send(self) -> Result<TestResponse, TestError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let client = self.client;

        let mut target = Target::resolve(&client.config.base_url, &self.uri)?;
        for encoded in &self.query {
            target.append_query(encoded);
        }

        let mut request = self.headers;
        if let Some(content_type) = self.body_content_type {
            if !request.iter().any(|(name, _)| name == header::CONTENT_TYPE) {
                request.push((header::CONTENT_TYPE, content_type));
            }
        }
        for (name, value) in self.body.headers() {
            if !request.iter().any(|(key, _)| *key == name) {
                request.push((name, value));
            }
        }
        let headers = merge_headers(target.host_header()?, &client.default_headers, request);

        client.exchange(self.method, &target, headers, self.body)
    }
}

impl fmt::Debug for TestClientRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestClientRequest")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

//! Application-side HTTP request and response types.

use bytes::{Bytes, BytesMut};
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{Extensions, HeaderName, HeaderValue, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::app::{Receiver, Sender};
use crate::error::{BodyError, ProtocolError};
use crate::protocol::{ConnectionScope, HeaderList, Message};

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const TEXT_HTML: &str = "text/html; charset=utf-8";
const APPLICATION_JSON: &str = "application/json";

/// An incoming HTTP request, backed by the connection scope and its
/// `receive` handle.
#[derive(Debug)]
pub struct Request {
    scope: ConnectionScope,
    receive: Receiver,
    body: Option<Bytes>,
}

impl Request {
    /// Create a request from its scope and event handle.
    pub fn new(scope: ConnectionScope, receive: Receiver) -> Self {
        Self {
            scope,
            receive,
            body: None,
        }
    }

    /// The connection scope.
    pub fn scope(&self) -> &ConnectionScope {
        &self.scope
    }

    /// Mutable access to the connection scope.
    pub fn scope_mut(&mut self) -> &mut ConnectionScope {
        &mut self.scope
    }

    /// The request method.
    pub fn method(&self) -> &Method {
        &self.scope.method
    }

    /// The request path relative to the root path.
    pub fn path(&self) -> &str {
        &self.scope.path
    }

    /// The raw query string, empty if absent or not UTF-8.
    pub fn query_string(&self) -> &str {
        std::str::from_utf8(&self.scope.query_string).unwrap_or_default()
    }

    /// First value of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<String> {
        serde_urlencoded::from_bytes::<Vec<(String, String)>>(&self.scope.query_string)
            .ok()?
            .into_iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Request headers, in order.
    pub fn headers(&self) -> &HeaderList {
        &self.scope.headers
    }

    /// First header with the given name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.scope.header_str(name)
    }

    /// The parsed `content-type` header.
    pub fn content_type(&self) -> Option<mime::Mime> {
        self.header(CONTENT_TYPE.as_str())?.parse().ok()
    }

    /// A parameter captured by the matched route.
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.scope.path_params.get(name).map(String::as_str)
    }

    /// Typed values attached to the connection.
    pub fn extensions(&self) -> &Extensions {
        &self.scope.extensions
    }

    /// The `receive` handle.
    pub fn receiver(&self) -> &Receiver {
        &self.receive
    }

    /// Collect the full request body.
    ///
    /// The body is read once and cached for later calls.
    pub async fn body(&mut self) -> Result<Bytes, BodyError> {
        if let Some(body) = &self.body {
            return Ok(body.clone());
        }

        let mut buffer = BytesMut::new();
        loop {
            match self.receive.receive().await {
                Message::HttpRequest { body, more_body } => {
                    buffer.extend_from_slice(&body);
                    if !more_body {
                        break;
                    }
                }
                Message::HttpDisconnect => return Err(BodyError::Disconnected),
                other => {
                    return Err(ProtocolError::unexpected("http.request", other.kind()).into());
                }
            }
        }

        let body = buffer.freeze();
        self.body = Some(body.clone());
        Ok(body)
    }

    /// Collect the body as UTF-8 text.
    pub async fn text(&mut self) -> Result<String, BodyError> {
        let body = self.body().await?;
        Ok(String::from_utf8(body.to_vec())?)
    }

    /// Collect the body and decode it as JSON.
    pub async fn json<T: DeserializeOwned>(&mut self) -> Result<T, BodyError> {
        let body = self.body().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Collect the body and decode it as a urlencoded form.
    pub async fn form<T: DeserializeOwned>(&mut self) -> Result<T, BodyError> {
        let body = self.body().await?;
        Ok(serde_urlencoded::from_bytes(&body)?)
    }
}

/// An outgoing HTTP response with a buffered body.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderList,
    body: Bytes,
}

impl Response {
    /// An empty response with the given status.
    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// A `200 OK` response with a raw body and no content type.
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            status: StatusCode::OK,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// A `text/plain` response.
    pub fn text(body: impl Into<String>) -> Self {
        Self::new(body.into()).with_content_type(HeaderValue::from_static(TEXT_PLAIN))
    }

    /// A `text/html` response.
    pub fn html(body: impl Into<String>) -> Self {
        Self::new(body.into()).with_content_type(HeaderValue::from_static(TEXT_HTML))
    }

    /// An `application/json` response.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        Ok(Self::new(body).with_content_type(HeaderValue::from_static(APPLICATION_JSON)))
    }

    /// Set the status.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Append a header, keeping existing values.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }

    /// Replace the `content-type` header.
    pub fn with_content_type(mut self, value: HeaderValue) -> Self {
        self.headers.retain(|(name, _)| name != CONTENT_TYPE);
        self.headers.push((CONTENT_TYPE, value));
        self
    }

    /// Replace the `content-type` header with a media type string.
    pub fn with_media_type(self, media_type: &str) -> Result<Self, http::header::InvalidHeaderValue> {
        let value = HeaderValue::from_str(media_type)?;
        Ok(self.with_content_type(value))
    }

    /// The status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The headers, in order.
    pub fn headers(&self) -> &HeaderList {
        &self.headers
    }

    /// First value of the given header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.as_str().eq_ignore_ascii_case(name))
            .and_then(|(_, value)| value.to_str().ok())
    }

    /// The body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Emit `http.response.start` and a single `http.response.body`.
    pub async fn send(self, send: &Sender) -> Result<(), ProtocolError> {
        self.send_with(send, true).await
    }

    /// Emit the response for a `HEAD` request: headers describe the full
    /// body but no body bytes are sent.
    pub async fn send_head(self, send: &Sender) -> Result<(), ProtocolError> {
        self.send_with(send, false).await
    }

    async fn send_with(self, send: &Sender, include_body: bool) -> Result<(), ProtocolError> {
        let Self {
            status,
            mut headers,
            body,
        } = self;

        if !headers.iter().any(|(name, _)| name == CONTENT_LENGTH) {
            headers.push((CONTENT_LENGTH, HeaderValue::from(body.len())));
        }

        send.send(Message::HttpResponseStart { status, headers }).await?;
        send.send(Message::HttpResponseBody {
            body: if include_body { body } else { Bytes::new() },
            more_body: false,
        })
        .await
    }
}

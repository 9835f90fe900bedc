//! Request targets, headers and body encodings.

use bytes::{BufMut, Bytes, BytesMut};
use http::header::{self, HeaderName, HeaderValue};
use http::Uri;
use sextant_core::HeaderList;

use crate::error::TestError;

/// Address reported as the client of every exchange.
pub const CLIENT_ADDR: (&str, u16) = ("testclient", 50000);

/// Value of the `user-agent` header sent by default.
pub const USER_AGENT: &str = "testclient";

/// Headers sent with every request unless overridden.
pub(crate) fn standard_headers() -> HeaderList {
    vec![
        (header::USER_AGENT, HeaderValue::from_static(USER_AGENT)),
        (header::ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate")),
        (header::ACCEPT, HeaderValue::from_static("*/*")),
        (header::CONNECTION, HeaderValue::from_static("keep-alive")),
    ]
}

/// Parse a header pair, lowercasing the name.
pub(crate) fn header_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), TestError> {
    let name = HeaderName::try_from(name)
        .map_err(|e| TestError::InvalidHeader(format!("{name}: {e}")))?;
    let value = HeaderValue::try_from(value)
        .map_err(|e| TestError::InvalidHeader(format!("{name}: {e}")))?;
    Ok((name, value))
}

/// Replace every header named `name` with a single entry, keeping the
/// position of the first one.
pub(crate) fn set_header(headers: &mut HeaderList, name: HeaderName, value: HeaderValue) {
    match headers.iter().position(|(key, _)| *key == name) {
        Some(index) => {
            headers[index].1 = value;
            let mut seen = 0;
            headers.retain(|(key, _)| {
                if *key != name {
                    return true;
                }
                seen += 1;
                seen == 1
            });
        }
        None => headers.push((name, value)),
    }
}

/// Combine the host header, client defaults and request headers.
///
/// Request headers replace defaults of the same name and come last, in the
/// order they were added.
pub(crate) fn merge_headers(host: HeaderValue, defaults: &HeaderList, request: HeaderList) -> HeaderList {
    let overridden = |name: &HeaderName| request.iter().any(|(key, _)| key == name);

    let mut headers = HeaderList::with_capacity(defaults.len() + request.len() + 1);
    if !overridden(&header::HOST) && !defaults.iter().any(|(key, _)| key == header::HOST) {
        headers.push((header::HOST, host));
    }
    headers.extend(
        defaults
            .iter()
            .filter(|(name, _)| !overridden(name))
            .cloned(),
    );
    headers.extend(request);
    headers
}

/// A request URL resolved against the client's base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Target {
    pub(crate) scheme: String,
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) raw_path: String,
    pub(crate) query: String,
}

impl Target {
    /// Resolve `uri` against `base_url` the way a browser resolves links:
    /// absolute URLs are kept, `/path` replaces the base path and relative
    /// paths replace its last segment.
    pub(crate) fn resolve(base_url: &str, uri: &str) -> Result<Self, TestError> {
        let base: Uri = base_url
            .parse()
            .map_err(|e| TestError::RequestBuild(format!("invalid base URL {base_url}: {e}")))?;

        let absolute = if uri.contains("://") {
            uri.to_string()
        } else {
            let origin = match (base.scheme_str(), base.authority()) {
                (Some(scheme), Some(authority)) => format!("{scheme}://{authority}"),
                _ => {
                    return Err(TestError::RequestBuild(format!(
                        "base URL {base_url} is not absolute"
                    )))
                }
            };
            if uri.starts_with('/') {
                format!("{origin}{uri}")
            } else {
                let base_path = base.path();
                let directory = &base_path[..=base_path.rfind('/').unwrap_or(0)];
                let directory = if directory.is_empty() { "/" } else { directory };
                format!("{origin}{directory}{uri}")
            }
        };

        let parsed: Uri = absolute
            .parse()
            .map_err(|e| TestError::RequestBuild(format!("invalid URL {absolute}: {e}")))?;
        let scheme = parsed.scheme_str().unwrap_or("http").to_string();
        let host = parsed
            .host()
            .ok_or_else(|| TestError::RequestBuild(format!("URL {absolute} has no host")))?
            .to_string();
        let port = parsed.port_u16().unwrap_or_else(|| default_port(&scheme));

        Ok(Self {
            host,
            port,
            raw_path: parsed.path().to_string(),
            query: parsed.query().unwrap_or_default().to_string(),
            scheme,
        })
    }

    /// Switch an HTTP target to the matching WebSocket scheme.
    pub(crate) fn into_websocket(mut self) -> Self {
        self.scheme = match self.scheme.as_str() {
            "https" | "wss" => "wss",
            _ => "ws",
        }
        .to_string();
        self
    }

    /// The `host` header value; the port is omitted when it is the scheme's
    /// default.
    pub(crate) fn host_header(&self) -> Result<HeaderValue, TestError> {
        let value = if self.port == default_port(&self.scheme) {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        };
        HeaderValue::try_from(value).map_err(|e| TestError::InvalidHeader(format!("host: {e}")))
    }

    /// The percent-decoded path.
    pub(crate) fn path(&self) -> String {
        String::from_utf8_lossy(&urlencoding::decode_binary(self.raw_path.as_bytes())).into_owned()
    }

    /// Append encoded query pairs.
    pub(crate) fn append_query(&mut self, encoded: &str) {
        if encoded.is_empty() {
            return;
        }
        if !self.query.is_empty() {
            self.query.push('&');
        }
        self.query.push_str(encoded);
    }
}

fn default_port(scheme: &str) -> u16 {
    match scheme {
        "https" | "wss" => 443,
        _ => 80,
    }
}

/// Body of an outgoing request.
#[derive(Debug, Clone, Default)]
pub(crate) enum RequestBody {
    /// No body.
    #[default]
    Empty,
    /// A body delivered as a single chunk.
    Full(Bytes),
    /// A body delivered as a sequence of chunks.
    Chunks(Vec<Bytes>),
}

impl RequestBody {
    /// Headers describing the body.
    pub(crate) fn headers(&self) -> HeaderList {
        match self {
            Self::Empty => Vec::new(),
            Self::Full(body) => vec![(header::CONTENT_LENGTH, HeaderValue::from(body.len()))],
            Self::Chunks(_) => vec![(
                header::TRANSFER_ENCODING,
                HeaderValue::from_static("chunked"),
            )],
        }
    }

    /// The chunks fed to the application.
    pub(crate) fn into_chunks(self) -> Vec<Bytes> {
        match self {
            Self::Empty => Vec::new(),
            Self::Full(body) => vec![body],
            Self::Chunks(chunks) => chunks,
        }
    }
}

/// A `multipart/form-data` body.
///
/// ```ignore
/// let form = MultipartForm::new()
///     .text("name", "Alice")
///     .file("avatar", "avatar.png", "image/png", png_bytes);
/// client.post("/upload").multipart(form).send()?;
/// ```
#[derive(Debug, Clone)]
pub struct MultipartForm {
    boundary: String,
    parts: Vec<Part>,
}

#[derive(Debug, Clone)]
struct Part {
    name: String,
    filename: Option<String>,
    content_type: Option<String>,
    data: Bytes,
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartForm {
    /// Creates an empty form with a random boundary.
    #[must_use]
    pub fn new() -> Self {
        Self {
            boundary: uuid::Uuid::now_v7().simple().to_string(),
            parts: Vec::new(),
        }
    }

    /// Use a fixed boundary.
    #[must_use]
    pub fn with_boundary(mut self, boundary: impl Into<String>) -> Self {
        self.boundary = boundary.into();
        self
    }

    /// Adds a plain field.
    #[must_use]
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(Part {
            name: name.into(),
            filename: None,
            content_type: None,
            data: Bytes::from(value.into()),
        });
        self
    }

    /// Adds a file field.
    #[must_use]
    pub fn file(
        mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        self.parts.push(Part {
            name: name.into(),
            filename: Some(filename.into()),
            content_type: Some(content_type.into()),
            data: data.into(),
        });
        self
    }

    /// The boundary separating parts.
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// The `content-type` header value for this form.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Encode the form body.
    pub fn encode(&self) -> Bytes {
        let mut body = BytesMut::new();
        for part in &self.parts {
            body.put_slice(format!("--{}\r\n", self.boundary).as_bytes());
            body.put_slice(b"Content-Disposition: form-data; name=\"");
            body.put_slice(escape_quoted(&part.name).as_bytes());
            body.put_slice(b"\"");
            if let Some(filename) = &part.filename {
                body.put_slice(b"; filename=\"");
                body.put_slice(escape_quoted(filename).as_bytes());
                body.put_slice(b"\"");
            }
            body.put_slice(b"\r\n");
            if let Some(content_type) = &part.content_type {
                body.put_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
            }
            body.put_slice(b"\r\n");
            body.put_slice(&part.data);
            body.put_slice(b"\r\n");
        }
        body.put_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        body.freeze()
    }
}

fn escape_quoted(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

//! YAML serialization of generated schemas.

use std::cmp::Ordering;

use http::HeaderValue;
use serde_yaml::{Mapping, Value};
use sextant_core::Response;

use crate::error::DocsResult;

/// Media type of OpenAPI documents.
pub const OPENAPI_MEDIA_TYPE: &str = "application/vnd.oai.openapi";

/// A schema rendered as YAML, ready to be served.
///
/// Mapping keys are sorted at every level, so the same document always
/// renders to the same text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenApiResponse {
    body: String,
}

impl OpenApiResponse {
    /// Renders a schema document.
    ///
    /// # Errors
    ///
    /// Fails if the document cannot be serialized as YAML.
    pub fn new(schema: &Value) -> DocsResult<Self> {
        let body = serde_yaml::to_string(&sort_keys(schema.clone()))?;
        Ok(Self { body })
    }

    /// The YAML text.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Converts into a `200 OK` response with the OpenAPI media type.
    pub fn into_response(self) -> Response {
        Response::new(self.body).with_content_type(HeaderValue::from_static(OPENAPI_MEDIA_TYPE))
    }
}

impl From<OpenApiResponse> for Response {
    fn from(response: OpenApiResponse) -> Self {
        response.into_response()
    }
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Mapping(mapping) => {
            let mut entries: Vec<(Value, Value)> = mapping
                .into_iter()
                .map(|(key, value)| (key, sort_keys(value)))
                .collect();
            entries.sort_by(|(a, _), (b, _)| compare_keys(a, b));
            Value::Mapping(entries.into_iter().collect::<Mapping>())
        }
        Value::Sequence(items) => Value::Sequence(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

fn compare_keys(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => rank(a).cmp(&rank(b)),
    }
}

const fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Sequence(_) => 4,
        Value::Mapping(_) => 5,
        Value::Tagged(_) => 6,
    }
}

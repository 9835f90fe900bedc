//! Schema generation from route tables.
//!
//! Every HTTP endpoint may carry a documentation string. The part after
//! the last line made of three or more dashes (or the whole string when
//! there is no such line) is read as YAML; a non-empty mapping becomes the
//! operation object of that endpoint in the generated document.
//!
//! ```rust,ignore
//! let generator = SchemaGenerator::from_yaml_str(
//!     "openapi: 3.0.0\ninfo:\n  title: Example API\n  version: '1.0'\n",
//! )?;
//! let schema = generator.get_schema(router.routes())?;
//! ```

use std::collections::HashSet;

use http::Method;
use serde_yaml::{Mapping, Value};
use sextant_core::{Request, Response};
use sextant_router::{RouteEntry, RouteTable};
use tracing::{debug, instrument};

use crate::error::{DocsError, DocsResult};
use crate::response::OpenApiResponse;

/// One documented operation: a full path, a lowercase method and the
/// endpoint's documentation string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointInfo {
    /// Full path, mount prefixes included.
    pub path: String,
    /// Lowercase HTTP method.
    pub method: String,
    /// Documentation string of the endpoint.
    pub doc: Option<String>,
}

/// Builds OpenAPI documents from a base document and a route table.
#[derive(Debug, Clone)]
pub struct SchemaGenerator {
    base: Mapping,
}

impl SchemaGenerator {
    /// Creates a generator from a base document (`openapi`, `info`, ...).
    pub fn new(base: Mapping) -> Self {
        Self { base }
    }

    /// Creates a generator from a YAML base document.
    ///
    /// # Errors
    ///
    /// Fails if the text is not valid YAML or not a mapping.
    pub fn from_yaml_str(yaml: &str) -> DocsResult<Self> {
        match serde_yaml::from_str(yaml)? {
            Value::Mapping(base) => Ok(Self::new(base)),
            other => Err(DocsError::InvalidBase {
                reason: format!("expected a mapping, got {}", value_kind(&other)),
            }),
        }
    }

    /// The base document.
    pub fn base(&self) -> &Mapping {
        &self.base
    }

    /// Lists the schema-visible HTTP operations of a route table, in
    /// table order.
    ///
    /// Mounted routers are expanded in place with the mount prefix
    /// prepended. Routes excluded from the schema, WebSocket routes and
    /// `HEAD` are skipped.
    pub fn get_endpoints(&self, routes: &[RouteEntry]) -> Vec<EndpointInfo> {
        let mut endpoints = Vec::new();
        collect_endpoints(routes, "", &mut endpoints);
        endpoints
    }

    /// Generates the document: the base plus a `paths` mapping.
    ///
    /// Operations whose documentation yields no metadata are left out.
    ///
    /// # Errors
    ///
    /// Returns [`DocsError::DuplicateOperation`] when two schema-visible
    /// routes share a path and method.
    #[instrument(skip_all, fields(routes = routes.len()))]
    pub fn get_schema(&self, routes: &[RouteEntry]) -> DocsResult<Value> {
        let mut seen = HashSet::new();
        let mut paths = Mapping::new();

        for endpoint in self.get_endpoints(routes) {
            if !seen.insert((endpoint.path.clone(), endpoint.method.clone())) {
                return Err(DocsError::DuplicateOperation {
                    path: endpoint.path,
                    method: endpoint.method,
                });
            }

            let Some(metadata) = endpoint.doc.as_deref().and_then(parse_docstring) else {
                debug!(path = %endpoint.path, method = %endpoint.method, "operation left undocumented");
                continue;
            };

            let key = Value::String(endpoint.path);
            if !paths.contains_key(&key) {
                paths.insert(key.clone(), Value::Mapping(Mapping::new()));
            }
            if let Some(Value::Mapping(operations)) = paths.get_mut(&key) {
                operations.insert(Value::String(endpoint.method), Value::Mapping(metadata));
            }
        }

        debug!(paths = paths.len(), "schema generated");
        let mut schema = self.base.clone();
        schema.insert(Value::String("paths".to_string()), Value::Mapping(paths));
        Ok(Value::Mapping(schema))
    }

    /// Documents the application serving `request`, as a YAML response.
    ///
    /// The route table is the one the outermost router published on the
    /// connection scope.
    ///
    /// # Errors
    ///
    /// Fails if the request carries no route table, or if schema
    /// generation or serialization fails.
    pub fn openapi_response(&self, request: &Request) -> DocsResult<Response> {
        let table = request
            .extensions()
            .get::<RouteTable>()
            .ok_or(DocsError::MissingRouteTable)?;
        let schema = self.get_schema(table.routes())?;
        Ok(OpenApiResponse::new(&schema)?.into_response())
    }
}

fn collect_endpoints(routes: &[RouteEntry], prefix: &str, out: &mut Vec<EndpointInfo>) {
    for entry in routes {
        match entry {
            RouteEntry::Route(route) => {
                if !route.is_included_in_schema() {
                    continue;
                }
                let path = format!("{prefix}{}", route.path());
                for (method, endpoint) in route.methods().iter() {
                    if *method == Method::HEAD {
                        continue;
                    }
                    out.push(EndpointInfo {
                        path: path.clone(),
                        method: method.as_str().to_ascii_lowercase(),
                        doc: endpoint.doc().map(str::to_string),
                    });
                }
            }
            RouteEntry::Mount(mount) => {
                let prefix = format!("{prefix}{}", mount.path());
                collect_endpoints(mount.router().routes(), &prefix, out);
            }
            RouteEntry::WebSocket(_) => {}
        }
    }
}

/// Extracts the YAML metadata of a documentation string.
///
/// Only the text after the last separator line (three or more dashes,
/// surrounding whitespace allowed) is parsed. Returns `None` unless it is
/// a non-empty YAML mapping.
pub fn parse_docstring(doc: &str) -> Option<Mapping> {
    let lines: Vec<&str> = doc.lines().collect();
    let start = lines
        .iter()
        .rposition(|line| is_separator(line))
        .map_or(0, |index| index + 1);
    let section = dedent(&lines[start..]);

    match serde_yaml::from_str::<Value>(&section) {
        Ok(Value::Mapping(mapping)) if !mapping.is_empty() => Some(mapping),
        Ok(other) => {
            debug!(kind = value_kind(&other), "documentation has no schema mapping");
            None
        }
        Err(err) => {
            debug!(error = %err, "documentation schema is not valid YAML");
            None
        }
    }
}

fn is_separator(line: &str) -> bool {
    let line = line.trim();
    line.len() >= 3 && line.bytes().all(|b| b == b'-')
}

// Strips the whitespace prefix shared by all non-blank lines.
fn dedent(lines: &[&str]) -> String {
    let indent = lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    lines
        .iter()
        .map(|line| line.get(indent..).unwrap_or_else(|| line.trim_start()))
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sextant_core::{AppResult, BoxError};
    use sextant_router::{Endpoint, MethodRouter, Route, Router};

    async fn stub(_request: Request) -> AppResult<Response> {
        Ok(Response::text(""))
    }

    fn documented(doc: &str) -> Endpoint {
        Endpoint::new(stub).with_doc(doc)
    }

    const OK_RESPONSE: &str = "
        responses:
          200:
            description: Ok.
    ";

    fn generator() -> SchemaGenerator {
        SchemaGenerator::from_yaml_str("openapi: 3.0.0\ninfo:\n  title: Test\n  version: '1.0'\n")
            .unwrap()
    }

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn test_parse_docstring_without_separator() {
        let parsed = parse_docstring(OK_RESPONSE).unwrap();
        assert_eq!(
            Value::Mapping(parsed),
            yaml("responses:\n  200:\n    description: Ok.\n")
        );
    }

    #[test]
    fn test_parse_docstring_uses_last_separator() {
        let doc = "
            Lists things.

            ---
            not: this
            ----

            responses:
              204:
                description: Empty.
        ";
        let parsed = parse_docstring(doc).unwrap();
        assert_eq!(
            Value::Mapping(parsed),
            yaml("responses:\n  204:\n    description: Empty.\n")
        );
    }

    #[test]
    fn test_parse_docstring_rejects_non_mappings() {
        assert!(parse_docstring("A plain description of the endpoint.").is_none());
        assert!(parse_docstring("").is_none());
        assert!(parse_docstring("{}").is_none());
        assert!(parse_docstring("- one\n- two").is_none());
        assert!(parse_docstring("Prose.\n---\n").is_none());
    }

    #[test]
    fn test_parse_docstring_invalid_yaml_is_not_fatal() {
        assert!(parse_docstring("responses: [unclosed").is_none());
        assert!(parse_docstring("description: a: b").is_none());
    }

    #[test]
    fn test_separator_needs_three_dashes() {
        assert!(is_separator("---"));
        assert!(is_separator("   -----  "));
        assert!(!is_separator("--"));
        assert!(!is_separator("--- x"));
    }

    #[test]
    fn test_from_yaml_str_requires_mapping() {
        let err = SchemaGenerator::from_yaml_str("- openapi").unwrap_err();
        assert!(matches!(err, DocsError::InvalidBase { .. }));
    }

    #[test]
    fn test_get_endpoints_order_and_filtering() {
        let admin = Router::new()
            .route("/stats", MethodRouter::new().get(documented(OK_RESPONSE)))
            .unwrap();
        let hidden = Route::new("/hidden", MethodRouter::new().get(documented(OK_RESPONSE)))
            .unwrap()
            .include_in_schema(false);
        let router = Router::new()
            .route(
                "/items",
                MethodRouter::new()
                    .get(documented(OK_RESPONSE))
                    .head(stub)
                    .post(stub),
            )
            .unwrap()
            .websocket_route("/live", |_socket| async { Ok::<(), BoxError>(()) })
            .unwrap()
            .add_route(hidden)
            .mount("/admin", admin)
            .unwrap();

        let endpoints = generator().get_endpoints(router.routes());
        let summary: Vec<(&str, &str)> = endpoints
            .iter()
            .map(|endpoint| (endpoint.path.as_str(), endpoint.method.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![("/items", "get"), ("/items", "post"), ("/admin/stats", "get")]
        );
        assert!(endpoints[0].doc.is_some());
        assert!(endpoints[1].doc.is_none());
    }

    #[test]
    fn test_get_schema_omits_undocumented_operations() {
        let router = Router::new()
            .route("/documented", MethodRouter::new().get(documented(OK_RESPONSE)))
            .unwrap()
            .route("/plain", MethodRouter::new().get(documented("Just prose.")))
            .unwrap()
            .route("/bare", MethodRouter::new().get(stub))
            .unwrap();

        let schema = generator().get_schema(router.routes()).unwrap();
        let expected = yaml(
            "
openapi: 3.0.0
info:
  title: Test
  version: '1.0'
paths:
  /documented:
    get:
      responses:
        200:
          description: Ok.
",
        );
        assert_eq!(schema, expected);
    }

    #[test]
    fn test_get_schema_rejects_duplicates_across_mounts() {
        let sub = Router::new()
            .route("/items", MethodRouter::new().get(documented(OK_RESPONSE)))
            .unwrap();
        let router = Router::new()
            .route("/api/items", MethodRouter::new().get(stub))
            .unwrap()
            .mount("/api", sub)
            .unwrap();

        let err = generator().get_schema(router.routes()).unwrap_err();
        match err {
            DocsError::DuplicateOperation { path, method } => {
                assert_eq!(path, "/api/items");
                assert_eq!(method, "get");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prose_before_last_separator_never_leaks(
                prose in proptest::collection::vec("[a-zA-Z:,. ]{0,30}", 0..5),
                dashes in 3usize..8,
            ) {
                let separator = "-".repeat(dashes);
                let doc = format!(
                    "{}\n{separator}\nsummary: kept\n",
                    prose.join("\n")
                );
                let parsed = parse_docstring(&doc).unwrap();
                prop_assert_eq!(parsed.len(), 1);
                prop_assert_eq!(parsed.get("summary"), Some(&Value::String("kept".to_string())));
            }
        }
    }
}

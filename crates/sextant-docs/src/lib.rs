//! # Sextant Docs
//!
//! OpenAPI schema generation for Sextant applications.
//!
//! Endpoints document themselves: the YAML found after the last `---` line
//! of an endpoint's documentation string becomes its operation object.
//! [`SchemaGenerator`] walks a route table (mounts included) and assembles
//! the document; [`OpenApiResponse`] serves it as YAML.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sextant_docs::SchemaGenerator;
//! use sextant_router::{Endpoint, MethodRouter, Route, Router};
//!
//! let schemas = Arc::new(SchemaGenerator::from_yaml_str(
//!     "openapi: 3.0.0\ninfo:\n  title: Example API\n  version: '1.0'\n",
//! )?);
//!
//! let list_users = Endpoint::new(list_users).with_doc(
//!     "Lists users.\n---\nresponses:\n  200:\n    description: A list of users.\n",
//! );
//!
//! let schema_endpoint = move |request| {
//!     let schemas = Arc::clone(&schemas);
//!     async move { Ok(schemas.openapi_response(&request)?) }
//! };
//!
//! let app = Router::new()
//!     .route("/users", MethodRouter::new().get(list_users))?
//!     .add_route(Route::new("/schema", MethodRouter::new().get(schema_endpoint))?.include_in_schema(false));
//! ```

mod error;
mod response;
mod schema;

pub use error::{DocsError, DocsResult};
pub use response::{OpenApiResponse, OPENAPI_MEDIA_TYPE};
pub use schema::{parse_docstring, EndpointInfo, SchemaGenerator};

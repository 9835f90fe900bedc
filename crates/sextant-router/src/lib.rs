//! # Sextant Router
//!
//! A small application layer speaking the Sextant event protocol.
//!
//! - [`Router`] - route table, middleware and lifespan hooks; implements [`Application`](sextant_core::Application)
//! - [`Route`], [`WebSocketRoute`], [`Mount`] - route table entries
//! - [`MethodRouter`], [`Endpoint`] - per-method endpoints with documentation strings
//! - [`Middleware`], [`Next`] - HTTP middleware chain
//! - [`Lifecycle`] - startup and shutdown hooks
//! - [`RouteTable`] - the serving application's routes, published on every connection scope
//!
//! # Example
//!
//! ```rust,ignore
//! use sextant_core::{AppResult, Request, Response};
//! use sextant_router::{MethodRouter, Router};
//!
//! async fn homepage(_request: Request) -> AppResult<Response> {
//!     Ok(Response::json(&serde_json::json!({"mock": "example"}))?)
//! }
//!
//! let app = Router::new().route("/", MethodRouter::new().get(homepage))?;
//! ```
//!
//! # Path Patterns
//!
//! ```text
//! /users                 static
//! /users/{id}            one segment
//! /users/{id:int}        digits only
//! /files/{rest:path}     remainder, slashes included
//! ```

#![doc(html_root_url = "https://docs.rs/sextant-router/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod handler;
mod lifecycle;
mod method_router;
mod middleware;
mod params;
mod pattern;
mod route;
mod router;

pub use error::{LifecycleError, LifecycleResult, RouterError};
pub use handler::{Endpoint, Handler, IntoEndpoint, WebSocketHandler};
pub use lifecycle::{Lifecycle, LifecycleHook};
pub use method_router::MethodRouter;
pub use middleware::{from_fn, FnMiddleware, Middleware, Next};
pub use params::Params;
pub use pattern::{PathPattern, PrefixMatch};
pub use route::{Mount, Route, RouteEntry, WebSocketRoute};
pub use router::{RouteTable, Router};

//! # Sextant
//!
//! **Test applications written against an ASGI-style event protocol,
//! without a server.**
//!
//! - **Protocol** – `http`, `websocket` and `lifespan` scopes with typed
//!   events, single-stage and two-stage application entries
//! - **Routing** – routes, mounts, middleware and lifespan hooks
//! - **Test client** – blocking HTTP and WebSocket calls against an
//!   application running on a background runtime
//! - **Schemas** – OpenAPI documents from endpoint documentation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sextant::prelude::*;
//!
//! async fn homepage(_request: Request) -> AppResult<Response> {
//!     Ok(Response::json(&serde_json::json!({"hello": "world"}))?)
//! }
//!
//! #[test]
//! fn test_homepage() {
//!     let app = Router::new()
//!         .route("/", MethodRouter::new().get(homepage))
//!         .unwrap();
//!     let client = TestClient::new(app);
//!
//!     client.get("/").send().unwrap().assert_success();
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! test code ── TestClient ──► LoopRunner (background runtime)
//!                  │                 │
//!                  │   bounded channels (events)
//!                  ▼                 ▼
//!            TestResponse ◄── Application (Router, app_fn, ...)
//! ```

#![doc(html_root_url = "https://docs.rs/sextant/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export protocol types
pub use sextant_core as core;

// Re-export routing
pub use sextant_router as router;

// Re-export schema generation
pub use sextant_docs as docs;

// Re-export the test client
pub use sextant_test as test;

// Re-export logging setup
pub use sextant_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust,ignore
/// use sextant::prelude::*;
/// ```
pub mod prelude {
    pub use sextant_core::{
        app_fn, app_instance, AppEntry, AppResult, Application, BoxError, CloseCode, Frame,
        Message, Request, Response, Scope, WebSocket, WebSocketDisconnect,
    };

    pub use sextant_router::{from_fn, Endpoint, Middleware, MethodRouter, Next, Route, Router};

    pub use sextant_docs::{OpenApiResponse, SchemaGenerator};

    pub use sextant_test::{
        LifespanScope, MultipartForm, TestClient, TestClientConfig, TestError, TestResponse,
        WebSocketSession,
    };

    pub use sextant_telemetry::{init_logging, init_test_logging, LogConfig};
}

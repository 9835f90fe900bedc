//! # Sextant Test
//!
//! Synchronous, in-process test client for applications speaking the
//! Sextant event protocol. No sockets are opened: every request runs one
//! exchange with the application on a background runtime owned by the
//! client, and the test code stays plain synchronous Rust.
//!
//! ## Key Features
//!
//! - **HTTP**: fluent request builder with raw, chunked, JSON, form and
//!   multipart bodies; ordered response headers and assertion helpers
//! - **WebSocket**: sessions where the application may send first, with
//!   typed receives and idempotent close
//! - **Lifespan**: `enter()` runs startup hooks, `exit()` or drop runs
//!   shutdown exactly once
//! - **Both entry styles**: single-stage and two-stage applications
//! - **Nested use**: a handler driven by one client may use another
//!
//! ## Example
//!
//! ```ignore
//! use sextant_test::TestClient;
//! use serde_json::json;
//!
//! #[test]
//! fn test_create_user() {
//!     let client = TestClient::new(app);
//!
//!     let response = client
//!         .post("/users")
//!         .json(&json!({"name": "Alice"}))
//!         .send()
//!         .unwrap();
//!
//!     response.assert_status_code(201);
//! }
//! ```
//!
//! Application errors are returned by default, with the original error
//! value preserved. Set `raise_server_exceptions(false)` to receive the
//! response the application produced instead (an empty 500 if it produced
//! none).

#![doc(html_root_url = "https://docs.rs/sextant-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod config;
mod error;
mod lifespan;
mod request;
mod response;
mod runner;
mod transport;
mod websocket;

pub use client::{TestClient, TestClientRequest};
pub use config::{
    ConfigError, ConfigLoader, TestClientConfig, DEFAULT_BASE_URL, DEFAULT_CHANNEL_CAPACITY,
};
pub use error::TestError;
pub use lifespan::LifespanScope;
pub use request::{MultipartForm, CLIENT_ADDR, USER_AGENT};
pub use response::TestResponse;
pub use runner::LoopRunner;
pub use websocket::WebSocketSession;

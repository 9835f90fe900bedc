//! Structured logging for Sextant.
//!
//! Sextant's crates emit `tracing` events (exchange lifecycle in the test
//! client, route dispatch in the router, skipped docstrings in the schema
//! generator). This crate installs a `tracing-subscriber` pipeline to make
//! them visible:
//!
//! - [`init_logging`] for binaries, JSON or pretty output
//! - [`init_test_logging`] for test suites, routed through the test writer
//!
//! # Example
//!
//! ```rust,ignore
//! use sextant_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development())?;
//! tracing::debug!(path = "/users", "dispatching request");
//! ```

#![doc(html_root_url = "https://docs.rs/sextant-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, init_logging, init_test_logging, LogConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

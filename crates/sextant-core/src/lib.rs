//! # Sextant Core
//!
//! Event protocol and application contract for the Sextant framework.
//!
//! This crate provides the foundational types shared by the router, the
//! schema generator and the test client:
//!
//! - [`Scope`], [`ConnectionScope`], [`Message`], [`Frame`] - The ASGI-style event protocol
//! - [`Application`], [`AppEntry`] - Application entry contract in both calling styles
//! - [`Receiver`], [`Sender`] - Event handles passed to applications
//! - [`Request`], [`Response`] - Application-side HTTP helpers
//! - [`WebSocket`] - Application-side WebSocket helper
//! - [`ProtocolError`], [`WebSocketError`], [`BoxError`] - Shared error types

#![doc(html_root_url = "https://docs.rs/sextant-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod app;
mod error;
pub mod protocol;
mod request;
mod websocket;

pub use app::{
    app_fn, app_instance, run_guarded, AppEntry, AppFactory, AppFn, AppInstance, Application,
    BoxFuture, ChannelInbound, ChannelOutbound, Inbound, Outbound, Receiver, Sender,
};
pub use error::{
    AppResult, ApplicationPanic, BodyError, BoxError, ProtocolError, WebSocketDisconnect,
    WebSocketError,
};
pub use protocol::{ConnectionScope, Frame, HeaderList, Message, Scope};
pub use request::{Request, Response};
pub use websocket::{CloseCode, WebSocket, WebSocketState};

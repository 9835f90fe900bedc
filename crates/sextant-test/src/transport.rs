//! Protocol adapter between the synchronous client and the application.
//!
//! HTTP exchanges run as one future: a feeder pushing `http.request`
//! events, a collector consuming `http.response.*` events and the
//! application itself, joined together on the loop runner. WebSocket
//! sessions are long-lived, so the application is spawned on the runner and
//! its output is pumped into an unbounded buffer the client reads from.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use http::StatusCode;
use sextant_core::{
    run_guarded, AppResult, Application, BoxFuture, ChannelInbound, ChannelOutbound,
    ConnectionScope, HeaderList, Inbound, Message, Outbound, ProtocolError, Receiver, Scope,
    Sender,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::TestError;
use crate::response::TestResponse;
use crate::runner::LoopRunner;

/// Per-exchange settings.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ExchangeOptions {
    pub(crate) raise_server_exceptions: bool,
    pub(crate) channel_capacity: usize,
}

/// Run one HTTP exchange to completion.
///
/// Body chunks are fed in order, all but the last flagged `more_body`.
/// `http.disconnect` is withheld until the response is complete.
pub(crate) async fn run_http(
    app: Arc<dyn Application>,
    scope: ConnectionScope,
    body: Vec<Bytes>,
    options: ExchangeOptions,
) -> Result<TestResponse, TestError> {
    let (request_tx, request_rx) = mpsc::channel(options.channel_capacity);
    let (response_tx, response_rx) = mpsc::channel(options.channel_capacity);
    let (complete_tx, complete_rx) = oneshot::channel();

    let receive = Receiver::channel(request_rx, Message::HttpDisconnect);
    let send = Sender::channel(response_tx);

    tracing::debug!(method = %scope.method, path = %scope.path, "Running HTTP exchange");
    let (_, collected, outcome) = tokio::join!(
        feed_request(request_tx, body, complete_rx),
        ResponseCollector::default().collect(response_rx, complete_tx),
        run_guarded(app.as_ref(), Scope::Http(scope), receive, send),
    );

    if let Err(err) = outcome {
        if options.raise_server_exceptions {
            return Err(TestError::Application(err));
        }
        tracing::warn!(error = %err, "Application failed, returning captured response");
    }

    collected?.into_response(options.raise_server_exceptions)
}

async fn feed_request(
    tx: mpsc::Sender<Message>,
    body: Vec<Bytes>,
    complete: oneshot::Receiver<()>,
) {
    let count = body.len();
    let chunks = if body.is_empty() {
        vec![Message::request_body(Bytes::new())]
    } else {
        body.into_iter()
            .enumerate()
            .map(|(index, body)| Message::HttpRequest {
                body,
                more_body: index + 1 < count,
            })
            .collect()
    };

    for chunk in chunks {
        // The application stopped listening.
        if tx.send(chunk).await.is_err() {
            return;
        }
    }

    // Resolves on completion, or with an error once the collector is done.
    let _ = complete.await;
    let _ = tx.send(Message::HttpDisconnect).await;
}

/// Accumulates `http.response.*` events into a response.
#[derive(Debug, Default)]
pub(crate) struct ResponseCollector {
    start: Option<(StatusCode, HeaderList)>,
    body: BytesMut,
    complete: bool,
}

impl ResponseCollector {
    /// Record one event from the application.
    pub(crate) fn push(&mut self, message: Message) -> Result<(), ProtocolError> {
        match message {
            Message::HttpResponseStart { status, headers } => {
                if self.start.is_some() {
                    return Err(ProtocolError::unexpected(
                        "http.response.body",
                        "http.response.start",
                    ));
                }
                self.start = Some((status, headers));
            }
            Message::HttpResponseBody { body, more_body } => {
                if self.start.is_none() {
                    return Err(ProtocolError::unexpected(
                        "http.response.start",
                        "http.response.body",
                    ));
                }
                if self.complete {
                    return Err(ProtocolError::invalid_state(
                        "response body sent after the response was complete",
                    ));
                }
                self.body.extend_from_slice(&body);
                self.complete = !more_body;
            }
            other => {
                return Err(ProtocolError::unexpected(
                    "http.response.start or http.response.body",
                    other.kind(),
                ));
            }
        }
        Ok(())
    }

    /// Returns true once the final body chunk has been recorded.
    pub(crate) fn is_complete(&self) -> bool {
        self.complete
    }

    async fn collect(
        mut self,
        mut rx: mpsc::Receiver<Message>,
        complete: oneshot::Sender<()>,
    ) -> Result<Self, ProtocolError> {
        let mut complete = Some(complete);
        while let Some(message) = rx.recv().await {
            tracing::trace!(message = message.kind(), "Application sent");
            self.push(message)?;
            if self.is_complete() {
                if let Some(complete) = complete.take() {
                    let _ = complete.send(());
                }
            }
        }
        Ok(self)
    }

    /// Build the captured response.
    ///
    /// Without a started response this is [`TestError::NoResponse`] when
    /// exceptions are raised, and an empty 500 otherwise.
    pub(crate) fn into_response(self, raise_server_exceptions: bool) -> Result<TestResponse, TestError> {
        match self.start {
            Some((status, headers)) => Ok(TestResponse::new(status, headers, self.body.freeze())),
            None if raise_server_exceptions => Err(TestError::NoResponse),
            None => Ok(TestResponse::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                Vec::new(),
                Bytes::new(),
            )),
        }
    }
}

/// Inbound side of a WebSocket session.
///
/// The first receive yields `websocket.connect` unless the application has
/// already accepted or closed the connection.
pub(crate) struct SessionInbound {
    inner: ChannelInbound,
    handshake_done: Arc<AtomicBool>,
    connect_delivered: AtomicBool,
}

impl Inbound for SessionInbound {
    fn receive(&self) -> BoxFuture<'_, Message> {
        Box::pin(async move {
            if !self.connect_delivered.swap(true, Ordering::SeqCst)
                && !self.handshake_done.load(Ordering::SeqCst)
            {
                return Message::WebSocketConnect;
            }
            self.inner.receive().await
        })
    }
}

/// Outbound side of a WebSocket session. Records when the handshake has
/// been answered.
pub(crate) struct SessionOutbound {
    inner: ChannelOutbound,
    handshake_done: Arc<AtomicBool>,
}

impl Outbound for SessionOutbound {
    fn send(&self, message: Message) -> BoxFuture<'_, Result<(), ProtocolError>> {
        if matches!(
            message,
            Message::WebSocketAccept { .. } | Message::WebSocketClose { .. }
        ) {
            self.handshake_done.store(true, Ordering::SeqCst);
        }
        self.inner.send(message)
    }
}

/// Channels of a running WebSocket application.
pub(crate) struct SessionChannels {
    /// Client events to the application.
    pub(crate) to_app: mpsc::Sender<Message>,
    /// Buffered application output.
    pub(crate) from_app: mpsc::UnboundedReceiver<Message>,
    /// The application task.
    pub(crate) task: JoinHandle<AppResult>,
}

/// Spawn a WebSocket application on the runner.
///
/// Application output is drained continuously into an unbounded buffer, so
/// the application never waits on the client to read.
pub(crate) fn spawn_session(
    runner: &LoopRunner,
    app: Arc<dyn Application>,
    scope: ConnectionScope,
    channel_capacity: usize,
) -> SessionChannels {
    let (to_app, app_rx) = mpsc::channel(channel_capacity);
    let (app_tx, mut outbound_rx) = mpsc::channel(channel_capacity);
    let (buffer_tx, from_app) = mpsc::unbounded_channel();
    let handshake_done = Arc::new(AtomicBool::new(false));

    let receive = Receiver::new(SessionInbound {
        inner: ChannelInbound::new(
            app_rx,
            Message::WebSocketDisconnect {
                code: sextant_core::CloseCode::Abnormal.as_u16(),
            },
        ),
        handshake_done: Arc::clone(&handshake_done),
        connect_delivered: AtomicBool::new(false),
    });
    let send = Sender::new(SessionOutbound {
        inner: ChannelOutbound::new(app_tx),
        handshake_done,
    });

    runner.spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if buffer_tx.send(message).is_err() {
                break;
            }
        }
    });

    tracing::debug!(path = %scope.path, "Starting WebSocket session");
    let task = runner.spawn(async move {
        run_guarded(app.as_ref(), Scope::WebSocket(scope), receive, send).await
    });

    SessionChannels {
        to_app,
        from_app,
        task,
    }
}

/// Convert a finished application task into its result.
pub(crate) fn task_outcome(joined: Result<AppResult, tokio::task::JoinError>) -> AppResult {
    match joined {
        Ok(result) => result,
        Err(err) => Err(Box::new(err)),
    }
}

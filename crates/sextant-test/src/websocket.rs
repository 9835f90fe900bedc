//! Client side of a WebSocket test session.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sextant_core::{
    AppResult, Application, CloseCode, ConnectionScope, Frame, HeaderList, Message, ProtocolError,
    WebSocketDisconnect,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::TestError;
use crate::runner::LoopRunner;
use crate::transport::{spawn_session, task_outcome};

/// A WebSocket connection to the application under test.
///
/// The application runs on the client's loop runner for the lifetime of
/// the session and may send before it receives; its output is buffered
/// until read. The session is closed with code 1000 when dropped.
///
/// An application error is returned once, by the first operation that
/// observes it. Closing a session whose error has already been returned
/// succeeds.
pub struct WebSocketSession<'a> {
    runner: &'a LoopRunner,
    to_app: mpsc::Sender<Message>,
    from_app: mpsc::UnboundedReceiver<Message>,
    task: Option<JoinHandle<AppResult>>,
    accepted_subprotocol: Option<String>,
    accept_headers: HeaderList,
    close_code: Option<u16>,
    closed: bool,
}

impl<'a> WebSocketSession<'a> {
    /// Start the application and wait for it to accept or reject the
    /// connection.
    pub(crate) fn connect(
        runner: &'a LoopRunner,
        app: Arc<dyn Application>,
        scope: ConnectionScope,
        channel_capacity: usize,
    ) -> Result<Self, TestError> {
        let channels = spawn_session(runner, app, scope, channel_capacity);
        let mut session = Self {
            runner,
            to_app: channels.to_app,
            from_app: channels.from_app,
            task: Some(channels.task),
            accepted_subprotocol: None,
            accept_headers: Vec::new(),
            close_code: None,
            closed: false,
        };

        match session.next_message()? {
            Message::WebSocketAccept {
                subprotocol,
                headers,
            } => {
                tracing::debug!(subprotocol = ?subprotocol, "WebSocket accepted");
                session.accepted_subprotocol = subprotocol;
                session.accept_headers = headers;
                Ok(session)
            }
            Message::WebSocketClose { code, .. } => {
                tracing::debug!(code, "WebSocket rejected");
                session.closed = true;
                session.close_code = Some(code);
                session.finish().map_err(TestError::Application)?;
                Err(WebSocketDisconnect::new(code).into())
            }
            other => Err(ProtocolError::unexpected(
                "websocket.accept or websocket.close",
                other.kind(),
            )
            .into()),
        }
    }

    /// The subprotocol chosen by the application.
    pub fn accepted_subprotocol(&self) -> Option<&str> {
        self.accepted_subprotocol.as_deref()
    }

    /// Extra headers sent with the accept.
    pub fn accept_headers(&self) -> &HeaderList {
        &self.accept_headers
    }

    /// Close code, once the application has closed the connection.
    pub fn close_code(&self) -> Option<u16> {
        self.close_code
    }

    /// Send a raw event to the application.
    ///
    /// Fails with [`TestError::WebSocketDisconnect`] once the application
    /// has closed the connection, and with a protocol error once the
    /// client has.
    pub fn send(&mut self, message: Message) -> Result<(), TestError> {
        if let Some(code) = self.close_code {
            return Err(WebSocketDisconnect::new(code).into());
        }
        if self.closed {
            return Err(ProtocolError::invalid_state("websocket session is closed").into());
        }
        if self.runner.block_on(self.to_app.send(message))?.is_err() {
            self.finish().map_err(TestError::Application)?;
            return Err(ProtocolError::Closed.into());
        }
        Ok(())
    }

    /// Send a text frame.
    pub fn send_text(&mut self, text: impl Into<String>) -> Result<(), TestError> {
        self.send(Message::WebSocketReceive(Frame::Text(text.into())))
    }

    /// Send a binary frame.
    pub fn send_bytes(&mut self, data: impl Into<Bytes>) -> Result<(), TestError> {
        self.send(Message::WebSocketReceive(Frame::Binary(data.into())))
    }

    /// Serialize a value as JSON and send it as a text frame.
    pub fn send_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), TestError> {
        let text = serde_json::to_string(value)?;
        self.send_text(text)
    }

    /// Receive the next raw event from the application.
    ///
    /// A `websocket.close` is returned as is; every later receive fails
    /// with [`TestError::WebSocketDisconnect`].
    pub fn receive(&mut self) -> Result<Message, TestError> {
        let message = self.next_message()?;
        if let Message::WebSocketClose { code, .. } = message {
            self.close_code = Some(code);
        }
        Ok(message)
    }

    /// Receive the next data frame.
    pub fn receive_frame(&mut self) -> Result<Frame, TestError> {
        match self.next_message()? {
            Message::WebSocketSend(frame) => Ok(frame),
            Message::WebSocketClose { code, .. } => {
                self.close_code = Some(code);
                Err(WebSocketDisconnect::new(code).into())
            }
            other => Err(ProtocolError::unexpected("websocket.send", other.kind()).into()),
        }
    }

    /// Receive a text frame.
    pub fn receive_text(&mut self) -> Result<String, TestError> {
        match self.receive_frame()? {
            Frame::Text(text) => Ok(text),
            frame @ Frame::Binary(_) => Err(ProtocolError::unexpected("text", frame.kind()).into()),
        }
    }

    /// Receive a binary frame.
    pub fn receive_bytes(&mut self) -> Result<Bytes, TestError> {
        match self.receive_frame()? {
            Frame::Binary(data) => Ok(data),
            frame @ Frame::Text(_) => Err(ProtocolError::unexpected("bytes", frame.kind()).into()),
        }
    }

    /// Receive a text frame and decode it as JSON.
    pub fn receive_json<T: DeserializeOwned>(&mut self) -> Result<T, TestError> {
        let text = self.receive_text()?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Receive a binary frame and decode it as JSON.
    pub fn receive_json_bytes<T: DeserializeOwned>(&mut self) -> Result<T, TestError> {
        let data = self.receive_bytes()?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Close the session with the given code and wait for the application
    /// to finish.
    ///
    /// Returns the application's error if it failed and the error has not
    /// been returned before. Closing twice is a no-op.
    pub fn close(&mut self, code: impl Into<u16>) -> Result<(), TestError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let code = code.into();
        tracing::debug!(code, "Closing WebSocket session");
        if self
            .runner
            .block_on(self.to_app.send(Message::WebSocketDisconnect { code }))?
            .is_err()
        {
            tracing::trace!("Application already finished");
        }
        self.finish().map_err(TestError::Application)
    }

    fn next_message(&mut self) -> Result<Message, TestError> {
        if let Some(code) = self.close_code {
            return Err(WebSocketDisconnect::new(code).into());
        }
        match self.runner.block_on(self.from_app.recv())? {
            Some(message) => Ok(message),
            None => {
                self.finish().map_err(TestError::Application)?;
                Err(ProtocolError::Closed.into())
            }
        }
    }

    // Waits for the application task; its error is handed out only once.
    fn finish(&mut self) -> AppResult {
        match self.task.take() {
            Some(task) => match self.runner.block_on(task) {
                Ok(joined) => task_outcome(joined),
                Err(err) => Err(Box::new(err)),
            },
            None => Ok(()),
        }
    }
}

impl Drop for WebSocketSession<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.close(CloseCode::Normal) {
            if std::thread::panicking() {
                tracing::debug!(error = %err, "WebSocket session failed while unwinding");
            } else {
                tracing::error!(error = %err, "WebSocket session failed on drop");
            }
        }
    }
}

impl fmt::Debug for WebSocketSession<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketSession")
            .field("accepted_subprotocol", &self.accepted_subprotocol)
            .field("close_code", &self.close_code)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

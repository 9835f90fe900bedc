//! Lifespan protocol driver.

use std::ops::Deref;
use std::sync::Arc;

use sextant_core::{run_guarded, AppResult, Application, Message, ProtocolError, Receiver, Scope, Sender};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::client::TestClient;
use crate::error::TestError;
use crate::runner::LoopRunner;
use crate::transport::task_outcome;

/// A running `lifespan` connection.
pub(crate) struct LifespanSession {
    to_app: mpsc::Sender<Message>,
    from_app: mpsc::Receiver<Message>,
    task: Option<JoinHandle<AppResult>>,
}

impl LifespanSession {
    /// Spawn the application with a lifespan scope and run startup.
    ///
    /// An application that returns `Ok` without answering
    /// `lifespan.startup` does not speak the lifespan protocol and is
    /// tolerated. One that returns an error fails startup with it.
    pub(crate) fn start(
        runner: &LoopRunner,
        app: Arc<dyn Application>,
        channel_capacity: usize,
    ) -> Result<Self, TestError> {
        let (to_app, app_rx) = mpsc::channel(channel_capacity);
        let (app_tx, from_app) = mpsc::channel(channel_capacity);
        let receive = Receiver::channel(app_rx, Message::LifespanShutdown);
        let send = Sender::channel(app_tx);

        let task = runner.spawn(async move {
            run_guarded(app.as_ref(), Scope::Lifespan, receive, send).await
        });
        let mut session = Self {
            to_app,
            from_app,
            task: Some(task),
        };

        tracing::debug!("Running lifespan startup");
        if runner
            .block_on(session.to_app.send(Message::LifespanStartup))?
            .is_err()
        {
            tracing::trace!("Application finished before lifespan startup");
        }
        match runner.block_on(session.from_app.recv())? {
            Some(Message::LifespanStartupComplete) => Ok(session),
            Some(Message::LifespanStartupFailed { message }) => {
                Err(match session.finish(runner) {
                    Err(err) => TestError::Application(err),
                    Ok(()) => TestError::StartupFailed(message),
                })
            }
            Some(other) => Err(ProtocolError::unexpected(
                "lifespan.startup.complete or lifespan.startup.failed",
                other.kind(),
            )
            .into()),
            None => {
                session.finish(runner).map_err(TestError::Application)?;
                tracing::warn!("Application returned during lifespan startup, continuing without lifespan");
                Ok(session)
            }
        }
    }

    /// Run shutdown. Does nothing once the application has finished.
    pub(crate) fn shutdown(&mut self, runner: &LoopRunner) -> Result<(), TestError> {
        if self.task.is_none() {
            return Ok(());
        }

        tracing::debug!("Running lifespan shutdown");
        if runner
            .block_on(self.to_app.send(Message::LifespanShutdown))?
            .is_err()
        {
            tracing::trace!("Application finished before lifespan shutdown");
        }
        let reply = runner.block_on(self.from_app.recv())?;
        let outcome = self.finish(runner);
        match reply {
            Some(Message::LifespanShutdownFailed { message }) => Err(match outcome {
                Err(err) => TestError::Application(err),
                Ok(()) => TestError::ShutdownFailed(message),
            }),
            Some(Message::LifespanShutdownComplete) | None => outcome.map_err(TestError::Application),
            Some(other) => Err(ProtocolError::unexpected(
                "lifespan.shutdown.complete or lifespan.shutdown.failed",
                other.kind(),
            )
            .into()),
        }
    }

    fn finish(&mut self, runner: &LoopRunner) -> AppResult {
        match self.task.take() {
            Some(task) => match runner.block_on(task) {
                Ok(joined) => task_outcome(joined),
                Err(err) => Err(Box::new(err)),
            },
            None => Ok(()),
        }
    }
}

/// A test client whose application has completed lifespan startup.
///
/// Dereferences to the [`TestClient`]. Shutdown runs exactly once: on
/// [`exit`](Self::exit), or when the scope is dropped.
///
/// ```ignore
/// let client = TestClient::new(app).enter()?;
/// client.get("/").send()?.assert_success();
/// client.exit()?;
/// ```
pub struct LifespanScope {
    client: TestClient,
    lifespan: Option<LifespanSession>,
}

impl LifespanScope {
    pub(crate) fn new(client: TestClient, lifespan: LifespanSession) -> Self {
        Self {
            client,
            lifespan: Some(lifespan),
        }
    }

    /// The wrapped client.
    pub fn client(&self) -> &TestClient {
        &self.client
    }

    /// Run lifespan shutdown and release the client.
    pub fn exit(mut self) -> Result<(), TestError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<(), TestError> {
        match self.lifespan.take() {
            Some(mut lifespan) => lifespan.shutdown(self.client.runner()?),
            None => Ok(()),
        }
    }
}

impl Deref for LifespanScope {
    type Target = TestClient;

    fn deref(&self) -> &TestClient {
        &self.client
    }
}

impl Drop for LifespanScope {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            tracing::error!(error = %err, "Lifespan shutdown failed");
        }
    }
}

impl std::fmt::Debug for LifespanScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifespanScope")
            .field("client", &self.client)
            .field("active", &self.lifespan.is_some())
            .finish()
    }
}

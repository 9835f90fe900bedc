//! The application entry contract.
//!
//! An [`Application`] is invoked once per connection with a [`Scope`] and a
//! pair of event handles: a [`Receiver`] to pull request events and a
//! [`Sender`] to emit response events. Two entry styles are accepted and
//! normalised into one callable by [`AppEntry`]:
//!
//! - the single-stage style `(scope, receive, send) -> future`
//! - the legacy two-stage style `scope -> instance`, `instance(receive, send) -> future`

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::{mpsc, Mutex};

use crate::error::{AppResult, ApplicationPanic, ProtocolError};
use crate::protocol::{Message, Scope};

/// A boxed future that can be sent across threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Source of inbound protocol events.
pub trait Inbound: Send + Sync + 'static {
    /// Wait for the next event.
    fn receive(&self) -> BoxFuture<'_, Message>;
}

/// Sink for outbound protocol events.
pub trait Outbound: Send + Sync + 'static {
    /// Emit an event.
    fn send(&self, message: Message) -> BoxFuture<'_, Result<(), ProtocolError>>;
}

/// Inbound events backed by a bounded channel.
///
/// Once every producer is gone the configured terminal message is returned
/// on every call.
pub struct ChannelInbound {
    rx: Mutex<mpsc::Receiver<Message>>,
    terminal: Message,
}

impl ChannelInbound {
    /// Wrap a channel receiver.
    pub fn new(rx: mpsc::Receiver<Message>, terminal: Message) -> Self {
        Self {
            rx: Mutex::new(rx),
            terminal,
        }
    }
}

impl Inbound for ChannelInbound {
    fn receive(&self) -> BoxFuture<'_, Message> {
        Box::pin(async move {
            let mut rx = self.rx.lock().await;
            match rx.recv().await {
                Some(message) => message,
                None => self.terminal.clone(),
            }
        })
    }
}

/// Outbound events backed by a bounded channel.
pub struct ChannelOutbound {
    tx: mpsc::Sender<Message>,
}

impl ChannelOutbound {
    /// Wrap a channel sender.
    pub fn new(tx: mpsc::Sender<Message>) -> Self {
        Self { tx }
    }
}

impl Outbound for ChannelOutbound {
    fn send(&self, message: Message) -> BoxFuture<'_, Result<(), ProtocolError>> {
        Box::pin(async move {
            self.tx
                .send(message)
                .await
                .map_err(|_| ProtocolError::Closed)
        })
    }
}

/// The `receive` handle given to an application.
#[derive(Clone)]
pub struct Receiver {
    inner: Arc<dyn Inbound>,
}

impl Receiver {
    /// Wrap an inbound event source.
    pub fn new(inbound: impl Inbound) -> Self {
        Self {
            inner: Arc::new(inbound),
        }
    }

    /// Receive from a channel, yielding `terminal` once it is closed.
    pub fn channel(rx: mpsc::Receiver<Message>, terminal: Message) -> Self {
        Self::new(ChannelInbound::new(rx, terminal))
    }

    /// Wait for the next inbound event.
    pub async fn receive(&self) -> Message {
        self.inner.receive().await
    }
}

impl std::fmt::Debug for Receiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Receiver").finish_non_exhaustive()
    }
}

/// The `send` handle given to an application.
#[derive(Clone)]
pub struct Sender {
    inner: Arc<dyn Outbound>,
}

impl Sender {
    /// Wrap an outbound event sink.
    pub fn new(outbound: impl Outbound) -> Self {
        Self {
            inner: Arc::new(outbound),
        }
    }

    /// Send into a channel.
    pub fn channel(tx: mpsc::Sender<Message>) -> Self {
        Self::new(ChannelOutbound::new(tx))
    }

    /// Emit an event.
    ///
    /// Fails with [`ProtocolError::Closed`] once the consumer is gone.
    pub async fn send(&self, message: Message) -> Result<(), ProtocolError> {
        self.inner.send(message).await
    }
}

impl std::fmt::Debug for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sender").finish_non_exhaustive()
    }
}

/// An application speaking the event protocol.
///
/// # Example
///
/// ```rust,ignore
/// use sextant_core::{Application, AppResult, BoxFuture, Message, Receiver, Scope, Sender};
///
/// struct Hello;
///
/// impl Application for Hello {
///     fn call(&self, _scope: Scope, _receive: Receiver, send: Sender) -> BoxFuture<'_, AppResult> {
///         Box::pin(async move {
///             sextant_core::Response::text("Hello, world!").send(&send).await?;
///             Ok(())
///         })
///     }
/// }
/// ```
pub trait Application: Send + Sync + 'static {
    /// Handle one connection.
    fn call(&self, scope: Scope, receive: Receiver, send: Sender) -> BoxFuture<'_, AppResult>;
}

impl<A: Application + ?Sized> Application for Arc<A> {
    fn call(&self, scope: Scope, receive: Receiver, send: Sender) -> BoxFuture<'_, AppResult> {
        (**self).call(scope, receive, send)
    }
}

/// An application built from an async function of `(scope, receive, send)`.
pub struct AppFn<F> {
    func: F,
}

impl<F> AppFn<F> {
    /// Wrap a function.
    pub const fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F, Fut> Application for AppFn<F>
where
    F: Fn(Scope, Receiver, Sender) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult> + Send + 'static,
{
    fn call(&self, scope: Scope, receive: Receiver, send: Sender) -> BoxFuture<'_, AppResult> {
        Box::pin((self.func)(scope, receive, send))
    }
}

/// Build an application from an async function.
pub fn app_fn<F, Fut>(func: F) -> AppFn<F>
where
    F: Fn(Scope, Receiver, Sender) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult> + Send + 'static,
{
    AppFn::new(func)
}

/// The per-connection callable returned by a two-stage application.
pub type AppInstance = Box<dyn FnOnce(Receiver, Sender) -> BoxFuture<'static, AppResult> + Send>;

/// Factory of a two-stage application.
pub type AppFactory = Arc<dyn Fn(Scope) -> AppInstance + Send + Sync>;

/// Box an async closure as an [`AppInstance`].
pub fn app_instance<F, Fut>(func: F) -> AppInstance
where
    F: FnOnce(Receiver, Sender) -> Fut + Send + 'static,
    Fut: Future<Output = AppResult> + Send + 'static,
{
    Box::new(move |receive, send| Box::pin(func(receive, send)))
}

struct TwoStageApp {
    factory: AppFactory,
}

impl Application for TwoStageApp {
    fn call(&self, scope: Scope, receive: Receiver, send: Sender) -> BoxFuture<'_, AppResult> {
        let instance = (self.factory)(scope);
        instance(receive, send)
    }
}

/// An application in either entry style.
#[derive(Clone)]
pub enum AppEntry {
    /// Single-stage `(scope, receive, send)` application.
    Single(Arc<dyn Application>),
    /// Legacy two-stage application.
    TwoStage(AppFactory),
}

impl AppEntry {
    /// Wrap a single-stage application.
    pub fn new(app: impl Application) -> Self {
        Self::Single(Arc::new(app))
    }

    /// Wrap an async function of `(scope, receive, send)`.
    pub fn from_fn<F, Fut>(func: F) -> Self
    where
        F: Fn(Scope, Receiver, Sender) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult> + Send + 'static,
    {
        Self::new(AppFn::new(func))
    }

    /// Wrap a two-stage factory: a function of the scope returning the
    /// callable that is then invoked with the event handles.
    pub fn two_stage<F>(factory: F) -> Self
    where
        F: Fn(Scope) -> AppInstance + Send + Sync + 'static,
    {
        Self::TwoStage(Arc::new(factory))
    }

    /// Normalise into a single callable.
    pub fn into_application(self) -> Arc<dyn Application> {
        match self {
            Self::Single(app) => app,
            Self::TwoStage(factory) => Arc::new(TwoStageApp { factory }),
        }
    }
}

impl std::fmt::Debug for AppEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single(_) => f.write_str("AppEntry::Single"),
            Self::TwoStage(_) => f.write_str("AppEntry::TwoStage"),
        }
    }
}

/// Run an application, converting panics into [`ApplicationPanic`] errors.
pub async fn run_guarded(
    app: &dyn Application,
    scope: Scope,
    receive: Receiver,
    send: Sender,
) -> AppResult {
    let kind = scope.kind();
    let future = match std::panic::catch_unwind(AssertUnwindSafe(|| app.call(scope, receive, send)))
    {
        Ok(future) => future,
        Err(payload) => return Err(Box::new(panicked(kind, payload))),
    };
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(Box::new(panicked(kind, payload))),
    }
}

fn panicked(scope: &'static str, payload: Box<dyn std::any::Any + Send>) -> ApplicationPanic {
    let panic = ApplicationPanic::from_payload(payload);
    tracing::error!(scope, message = panic.message(), "Application panicked");
    panic
}

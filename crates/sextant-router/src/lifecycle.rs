//! Lifespan hooks.
//!
//! # Execution Order
//!
//! - **Startup hooks**: run in registration order when `lifespan.startup`
//!   arrives. The first failure stops startup and is reported with
//!   `lifespan.startup.failed`.
//! - **Shutdown hooks**: run in reverse registration order when
//!   `lifespan.shutdown` arrives. Every hook runs even if an earlier one
//!   failed.
//!
//! # Example
//!
//! ```rust,ignore
//! use sextant_router::Lifecycle;
//!
//! let lifecycle = Lifecycle::new()
//!     .on_startup(|| async { Ok(()) })
//!     .on_shutdown(|| async { Ok(()) });
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use sextant_core::{AppResult, BoxFuture, Message, ProtocolError, Receiver, Sender};

use crate::error::{LifecycleError, LifecycleResult};

/// A lifespan hook.
pub type LifecycleHook = Arc<dyn Fn() -> BoxFuture<'static, AppResult> + Send + Sync>;

/// Startup and shutdown hooks of an application.
#[derive(Clone, Default)]
#[must_use]
pub struct Lifecycle {
    startup_hooks: Vec<(String, LifecycleHook)>,
    shutdown_hooks: Vec<(String, LifecycleHook)>,
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("startup_hooks", &self.startup_hooks.len())
            .field("shutdown_hooks", &self.shutdown_hooks.len())
            .finish()
    }
}

impl Lifecycle {
    /// Creates an empty lifecycle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a startup hook.
    pub fn on_startup<F, Fut>(self, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult> + Send + 'static,
    {
        let name = format!("startup_{}", self.startup_hooks.len());
        self.on_startup_named(name, hook)
    }

    /// Registers a named startup hook.
    pub fn on_startup_named<F, Fut>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult> + Send + 'static,
    {
        let hook: LifecycleHook = Arc::new(move || Box::pin(hook()));
        self.startup_hooks.push((name.into(), hook));
        self
    }

    /// Registers a shutdown hook.
    pub fn on_shutdown<F, Fut>(self, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult> + Send + 'static,
    {
        let name = format!("shutdown_{}", self.shutdown_hooks.len());
        self.on_shutdown_named(name, hook)
    }

    /// Registers a named shutdown hook.
    pub fn on_shutdown_named<F, Fut>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult> + Send + 'static,
    {
        let hook: LifecycleHook = Arc::new(move || Box::pin(hook()));
        self.shutdown_hooks.push((name.into(), hook));
        self
    }

    /// Returns the number of startup hooks.
    pub fn startup_hook_count(&self) -> usize {
        self.startup_hooks.len()
    }

    /// Returns the number of shutdown hooks.
    pub fn shutdown_hook_count(&self) -> usize {
        self.shutdown_hooks.len()
    }

    /// Runs all startup hooks in registration order.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::StartupFailed`] carrying the first
    /// failing hook's error.
    pub async fn run_startup(&self) -> LifecycleResult {
        for (name, hook) in &self.startup_hooks {
            tracing::debug!(hook = %name, "Running startup hook");
            if let Err(source) = hook().await {
                tracing::error!(hook = %name, error = %source, "Startup hook failed");
                return Err(LifecycleError::StartupFailed {
                    hook: name.clone(),
                    source,
                });
            }
        }
        Ok(())
    }

    /// Runs all shutdown hooks in reverse registration order.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::ShutdownFailed`] summarising every failure.
    pub async fn run_shutdown(&self) -> LifecycleResult {
        let mut errors: Vec<String> = Vec::new();

        for (name, hook) in self.shutdown_hooks.iter().rev() {
            tracing::debug!(hook = %name, "Running shutdown hook");
            if let Err(e) = hook().await {
                tracing::error!(hook = %name, error = %e, "Shutdown hook failed");
                errors.push(format!("{name}: {e}"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(LifecycleError::ShutdownFailed(errors.join("; ")))
        }
    }

    /// Speak the lifespan protocol until shutdown completes.
    ///
    /// A failing startup hook is reported with `lifespan.startup.failed`
    /// and its own error is returned, so the server sees the original
    /// error value.
    pub async fn serve(&self, receive: &Receiver, send: &Sender) -> AppResult {
        loop {
            match receive.receive().await {
                Message::LifespanStartup => match self.run_startup().await {
                    Ok(()) => send.send(Message::LifespanStartupComplete).await?,
                    Err(err) => {
                        let source = err.into_source();
                        send.send(Message::LifespanStartupFailed {
                            message: source.to_string(),
                        })
                        .await?;
                        return Err(source);
                    }
                },
                Message::LifespanShutdown => {
                    return match self.run_shutdown().await {
                        Ok(()) => {
                            send.send(Message::LifespanShutdownComplete).await?;
                            Ok(())
                        }
                        Err(err) => {
                            send.send(Message::LifespanShutdownFailed {
                                message: err.to_string(),
                            })
                            .await?;
                            Err(err.into())
                        }
                    };
                }
                other => {
                    return Err(ProtocolError::unexpected(
                        "lifespan.startup or lifespan.shutdown",
                        other.kind(),
                    )
                    .into());
                }
            }
        }
    }

    /// Appends another lifecycle's hooks to this one.
    pub fn merge(mut self, other: Lifecycle) -> Self {
        self.startup_hooks.extend(other.startup_hooks);
        self.shutdown_hooks.extend(other.shutdown_hooks);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    #[derive(Debug, thiserror::Error)]
    #[error("startup exploded")]
    struct Exploded;

    async fn explode() -> AppResult {
        Err(Exploded.into())
    }

    async fn broken() -> AppResult {
        Err("boom".into())
    }

    fn recorder(order: &Arc<Mutex<Vec<u8>>>, value: u8) -> impl Fn() -> BoxFuture<'static, AppResult> {
        let order = Arc::clone(order);
        move || {
            let order = Arc::clone(&order);
            Box::pin(async move {
                order.lock().unwrap().push(value);
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn test_empty_lifecycle() {
        let lifecycle = Lifecycle::new();
        assert!(lifecycle.run_startup().await.is_ok());
        assert!(lifecycle.run_shutdown().await.is_ok());
    }

    #[tokio::test]
    async fn test_startup_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let lifecycle = Lifecycle::new()
            .on_startup(recorder(&order, 1))
            .on_startup(recorder(&order, 2))
            .on_startup(recorder(&order, 3));

        lifecycle.run_startup().await.unwrap();
        assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_shutdown_reverse_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let lifecycle = Lifecycle::new()
            .on_shutdown(recorder(&order, 1))
            .on_shutdown(recorder(&order, 2))
            .on_shutdown(recorder(&order, 3));

        lifecycle.run_shutdown().await.unwrap();
        assert_eq!(*order.lock().unwrap(), vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn test_startup_stops_at_first_failure() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let lifecycle = Lifecycle::new()
            .on_startup_named("explode", explode)
            .on_startup(recorder(&order, 2));

        let err = lifecycle.run_startup().await.unwrap_err();
        assert!(matches!(&err, LifecycleError::StartupFailed { hook, .. } if hook == "explode"));
        assert!(order.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_runs_all_hooks() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let lifecycle = Lifecycle::new()
            .on_shutdown(recorder(&order, 1))
            .on_shutdown_named("broken", broken);

        let err = lifecycle.run_shutdown().await.unwrap_err();
        assert_eq!(err.to_string(), "shutdown hooks failed: broken: boom");
        assert_eq!(*order.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_serve_reports_startup_failure() {
        let lifecycle = Lifecycle::new().on_startup(explode);

        let (in_tx, in_rx) = mpsc::channel(2);
        let (out_tx, mut out_rx) = mpsc::channel(2);
        in_tx.send(Message::LifespanStartup).await.unwrap();

        let err = lifecycle
            .serve(
                &Receiver::channel(in_rx, Message::LifespanShutdown),
                &Sender::channel(out_tx),
            )
            .await
            .unwrap_err();

        assert!(err.downcast_ref::<Exploded>().is_some());
        assert_eq!(
            out_rx.recv().await,
            Some(Message::LifespanStartupFailed {
                message: "startup exploded".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_serve_full_cycle() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let lifecycle = Lifecycle::new()
            .on_startup(recorder(&order, 1))
            .merge(Lifecycle::new().on_shutdown(recorder(&order, 2)));
        assert_eq!(lifecycle.startup_hook_count(), 1);
        assert_eq!(lifecycle.shutdown_hook_count(), 1);

        let (in_tx, in_rx) = mpsc::channel(2);
        let (out_tx, mut out_rx) = mpsc::channel(2);
        in_tx.send(Message::LifespanStartup).await.unwrap();
        in_tx.send(Message::LifespanShutdown).await.unwrap();

        lifecycle
            .serve(
                &Receiver::channel(in_rx, Message::LifespanShutdown),
                &Sender::channel(out_tx),
            )
            .await
            .unwrap();

        assert_eq!(out_rx.recv().await, Some(Message::LifespanStartupComplete));
        assert_eq!(out_rx.recv().await, Some(Message::LifespanShutdownComplete));
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }
}

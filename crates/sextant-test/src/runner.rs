//! Background loop runner.
//!
//! Every [`TestClient`](crate::TestClient) owns one [`LoopRunner`]: a
//! current-thread Tokio runtime that drives the application while the
//! caller waits synchronously. Tasks spawned on the runner (lifespan and
//! WebSocket applications) only make progress while some `block_on` call
//! is driving it, which is exactly when the client is waiting for them.
//!
//! # Nested use
//!
//! A runtime cannot be driven from a thread that is already inside one.
//! When [`LoopRunner::driving_context_active`] reports an active runtime,
//! `block_on` moves the work to a scoped worker thread and blocks on its
//! completion instead. This lets a handler served by one test client use
//! another test client internally.

use std::future::Future;
use std::thread;

use tokio::runtime::{Handle, Runtime};
use tokio::task::JoinHandle;

use crate::error::TestError;

/// A current-thread runtime driven on demand by synchronous callers.
#[derive(Debug)]
pub struct LoopRunner {
    // Only taken on drop.
    runtime: Option<Runtime>,
    thread_name: String,
}

impl LoopRunner {
    /// Build the runtime.
    pub fn new(thread_name: impl Into<String>) -> Result<Self, TestError> {
        let thread_name = thread_name.into();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .thread_name(&thread_name)
            .build()
            .map_err(TestError::Runtime)?;

        tracing::debug!(thread_name = %thread_name, "Started loop runner");
        Ok(Self {
            runtime: Some(runtime),
            thread_name,
        })
    }

    /// Returns true if a Tokio runtime is already driving the current
    /// thread.
    pub fn driving_context_active() -> bool {
        Handle::try_current().is_ok()
    }

    /// Drive `future`, and every task spawned on this runner, until
    /// `future` completes.
    ///
    /// Fails only when the worker thread for nested use cannot be started.
    /// Panics raised while driving are resumed on the caller.
    pub fn block_on<F>(&self, future: F) -> Result<F::Output, TestError>
    where
        F: Future + Send,
        F::Output: Send,
    {
        let runtime = self.runtime();
        if !Self::driving_context_active() {
            return Ok(runtime.block_on(future));
        }

        tracing::trace!(thread_name = %self.thread_name, "Driving loop runner from worker thread");
        thread::scope(|scope| {
            let worker = thread::Builder::new()
                .name(self.thread_name.clone())
                .spawn_scoped(scope, || runtime.block_on(future))
                .map_err(TestError::Runtime)?;
            match worker.join() {
                Ok(output) => Ok(output),
                Err(payload) => std::panic::resume_unwind(payload),
            }
        })
    }

    /// Schedule a long-lived task on the runner.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.runtime().spawn(future)
    }

    fn runtime(&self) -> &Runtime {
        match &self.runtime {
            Some(runtime) => runtime,
            None => unreachable!("runtime is present until the runner is dropped"),
        }
    }
}

impl Drop for LoopRunner {
    fn drop(&mut self) {
        let Some(runtime) = self.runtime.take() else {
            return;
        };
        if Self::driving_context_active() {
            // Blocking shutdown is not allowed inside another runtime.
            runtime.shutdown_background();
        } else {
            drop(runtime);
        }
        tracing::debug!(thread_name = %self.thread_name, "Stopped loop runner");
    }
}

//! HTTP middleware.
//!
//! Middleware wraps the request dispatch of a [`Router`](crate::Router).
//! Each stage receives the request and a [`Next`] handle for the rest of
//! the chain; it may inspect or rewrite the request, short-circuit with its
//! own response, or post-process the downstream response. Errors returned
//! by downstream handlers propagate through the chain unchanged.
//!
//! # Example
//!
//! ```rust,ignore
//! use sextant_router::{Middleware, Next};
//! use sextant_core::{AppResult, BoxFuture, Request, Response};
//!
//! struct Timing;
//!
//! impl Middleware for Timing {
//!     fn name(&self) -> &'static str {
//!         "timing"
//!     }
//!
//!     fn process<'a>(&'a self, request: Request, next: Next<'a>) -> BoxFuture<'a, AppResult<Response>> {
//!         Box::pin(async move {
//!             let start = std::time::Instant::now();
//!             let response = next.run(request).await;
//!             tracing::debug!(elapsed = ?start.elapsed(), "request handled");
//!             response
//!         })
//!     }
//! }
//! ```

use sextant_core::{AppResult, BoxFuture, Request, Response};

/// A middleware stage.
pub trait Middleware: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Process a request, calling `next` to continue the chain.
    fn process<'a>(&'a self, request: Request, next: Next<'a>) -> BoxFuture<'a, AppResult<Response>>;
}

/// The rest of the middleware chain.
///
/// Consumed by [`Next::run`], so it can be invoked at most once.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    Chain {
        middleware: &'a dyn Middleware,
        next: Box<Next<'a>>,
    },
    Endpoint(Box<dyn FnOnce(Request) -> BoxFuture<'a, AppResult<Response>> + Send + 'a>),
}

impl<'a> Next<'a> {
    pub(crate) fn new(middleware: &'a dyn Middleware, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Chain {
                middleware,
                next: Box::new(next),
            },
        }
    }

    pub(crate) fn endpoint<F>(f: F) -> Self
    where
        F: FnOnce(Request) -> BoxFuture<'a, AppResult<Response>> + Send + 'a,
    {
        Self {
            inner: NextInner::Endpoint(Box::new(f)),
        }
    }

    /// Invoke the next middleware, or the route dispatch at the end of the
    /// chain.
    pub fn run(self, request: Request) -> BoxFuture<'a, AppResult<Response>> {
        match self.inner {
            NextInner::Chain { middleware, next } => {
                tracing::trace!(middleware = middleware.name(), "entering middleware");
                middleware.process(request, *next)
            }
            NextInner::Endpoint(endpoint) => endpoint(request),
        }
    }
}

/// A middleware built from a function.
///
/// ```rust,ignore
/// let passthrough = FnMiddleware::new("passthrough", |request, next| next.run(request));
/// ```
pub struct FnMiddleware<F> {
    name: &'static str,
    func: F,
}

impl<F> FnMiddleware<F> {
    /// Creates a function-based middleware.
    pub const fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(Request, Next<'a>) -> BoxFuture<'a, AppResult<Response>> + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn process<'a>(&'a self, request: Request, next: Next<'a>) -> BoxFuture<'a, AppResult<Response>> {
        (self.func)(request, next)
    }
}

/// Build a middleware from a function.
pub fn from_fn<F>(name: &'static str, func: F) -> FnMiddleware<F>
where
    F: for<'a> Fn(Request, Next<'a>) -> BoxFuture<'a, AppResult<Response>> + Send + Sync + 'static,
{
    FnMiddleware::new(name, func)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderName, HeaderValue, Method, StatusCode};
    use sextant_core::{ConnectionScope, Message, Receiver};
    use tokio::sync::mpsc;

    struct Tag(&'static str);

    impl Middleware for Tag {
        fn name(&self) -> &'static str {
            self.0
        }

        fn process<'a>(
            &'a self,
            request: Request,
            next: Next<'a>,
        ) -> BoxFuture<'a, AppResult<Response>> {
            Box::pin(async move {
                let response = next.run(request).await?;
                Ok(response.with_header(
                    HeaderName::from_static("x-stage"),
                    HeaderValue::from_static(self.0),
                ))
            })
        }
    }

    struct Deny;

    impl Middleware for Deny {
        fn name(&self) -> &'static str {
            "deny"
        }

        fn process<'a>(
            &'a self,
            _request: Request,
            _next: Next<'a>,
        ) -> BoxFuture<'a, AppResult<Response>> {
            Box::pin(async { Ok(Response::text("denied").with_status(StatusCode::FORBIDDEN)) })
        }
    }

    fn request() -> Request {
        let (_tx, rx) = mpsc::channel(1);
        Request::new(
            ConnectionScope::new(Method::GET, "/"),
            Receiver::channel(rx, Message::HttpDisconnect),
        )
    }

    fn endpoint<'a>() -> Next<'a> {
        Next::endpoint(|_request| Box::pin(async { Ok(Response::text("endpoint")) }))
    }

    #[tokio::test]
    async fn test_chain_order() {
        let outer = Tag("outer");
        let inner = Tag("inner");
        let next = Next::new(&outer, Next::new(&inner, endpoint()));

        let response = next.run(request()).await.unwrap();
        let stages: Vec<_> = response
            .headers()
            .iter()
            .filter(|(name, _)| name == "x-stage")
            .map(|(_, value)| value.to_str().unwrap().to_string())
            .collect();
        assert_eq!(stages, vec!["inner", "outer"]);
    }

    #[tokio::test]
    async fn test_short_circuit() {
        let deny = Deny;
        let response = Next::new(&deny, endpoint()).run(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_fn_middleware() {
        let passthrough = from_fn("passthrough", |request, next| next.run(request));
        assert_eq!(passthrough.name(), "passthrough");

        let response = Next::new(&passthrough, endpoint())
            .run(request())
            .await
            .unwrap();
        assert_eq!(response.body().as_ref(), b"endpoint");
    }
}

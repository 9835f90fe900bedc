//! The router application.
//!
//! [`Router`] is an [`Application`]: it answers `lifespan` scopes with its
//! [`Lifecycle`], and dispatches `http` and `websocket` scopes to the first
//! route table entry that matches.
//!
//! Dispatch rules:
//!
//! - routes are tried in registration order and the first full match (path
//!   and method) wins; mounts match on their prefix alone
//! - a path match with an unsupported method answers `405 Method Not Allowed`
//! - no match answers `404 Not Found`; an unmatched WebSocket is closed
//!   with code 1000
//! - `HEAD` is answered by the `GET` endpoint without a body

use std::fmt;
use std::sync::Arc;

use http::header::ALLOW;
use http::{HeaderValue, Method, StatusCode};
use sextant_core::{
    AppResult, Application, BoxFuture, ConnectionScope, Message, Receiver, Request, Response,
    Scope, Sender, WebSocket,
};
use tracing::{debug, error};

use crate::error::RouterError;
use crate::handler::WebSocketHandler;
use crate::lifecycle::Lifecycle;
use crate::method_router::MethodRouter;
use crate::middleware::{Middleware, Next};
use crate::pattern::PrefixMatch;
use crate::route::{Mount, Route, RouteEntry, WebSocketRoute};

/// The route table of the application serving a connection.
///
/// The outermost [`Router`] stores it in the connection scope extensions,
/// so handlers can reach it, e.g. to generate a schema of the application
/// that serves them.
#[derive(Clone)]
pub struct RouteTable(Arc<Vec<RouteEntry>>);

impl RouteTable {
    /// The entries of the table, in registration order.
    pub fn routes(&self) -> &[RouteEntry] {
        &self.0
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.0.iter().map(RouteEntry::path))
            .finish()
    }
}

/// A route table with middleware and lifespan hooks.
///
/// # Example
///
/// ```rust,ignore
/// use sextant_router::{MethodRouter, Router};
///
/// let app = Router::new()
///     .route("/", MethodRouter::new().get(homepage))?
///     .mount("/api", api_router)?
///     .on_startup(connect_database);
/// ```
#[derive(Clone, Default)]
pub struct Router {
    routes: Arc<Vec<RouteEntry>>,
    middleware: Vec<Arc<dyn Middleware>>,
    lifecycle: Lifecycle,
}

impl Router {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an HTTP route.
    pub fn route(self, path: &str, methods: MethodRouter) -> Result<Self, RouterError> {
        Ok(self.add_route(Route::new(path, methods)?))
    }

    /// Adds a WebSocket route.
    pub fn websocket_route(
        self,
        path: &str,
        handler: impl WebSocketHandler,
    ) -> Result<Self, RouterError> {
        Ok(self.add_route(WebSocketRoute::new(path, handler)?))
    }

    /// Mounts a router under a prefix.
    pub fn mount(self, prefix: &str, router: Router) -> Result<Self, RouterError> {
        Ok(self.add_route(Mount::new(prefix, router)?))
    }

    /// Appends a prebuilt entry.
    #[must_use]
    pub fn add_route(mut self, entry: impl Into<RouteEntry>) -> Self {
        Arc::make_mut(&mut self.routes).push(entry.into());
        self
    }

    /// Adds a middleware stage. Stages run in registration order, the first
    /// registered being the outermost.
    #[must_use]
    pub fn middleware(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Registers a startup hook.
    #[must_use]
    pub fn on_startup<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = AppResult> + Send + 'static,
    {
        self.lifecycle = self.lifecycle.on_startup(hook);
        self
    }

    /// Registers a shutdown hook.
    #[must_use]
    pub fn on_shutdown<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = AppResult> + Send + 'static,
    {
        self.lifecycle = self.lifecycle.on_shutdown(hook);
        self
    }

    /// Replaces the lifecycle.
    #[must_use]
    pub fn lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    /// The route table entries, in registration order.
    pub fn routes(&self) -> &[RouteEntry] {
        &self.routes
    }

    /// The route table as a shareable value.
    pub fn route_table(&self) -> RouteTable {
        RouteTable(Arc::clone(&self.routes))
    }

    /// Run a request through the middleware chain and the route table.
    pub fn handle(&self, request: Request) -> BoxFuture<'_, AppResult<Response>> {
        let endpoint = Next::endpoint(move |request| self.dispatch(request));
        let chain = self
            .middleware
            .iter()
            .rev()
            .fold(endpoint, |next, middleware| Next::new(middleware.as_ref(), next));
        chain.run(request)
    }

    fn dispatch(&self, mut request: Request) -> BoxFuture<'_, AppResult<Response>> {
        Box::pin(async move {
            let path = request.path().to_string();
            let method = request.method().clone();
            let mut allowed: Option<Vec<Method>> = None;

            for entry in self.routes.iter() {
                match entry {
                    RouteEntry::Route(route) => {
                        let Some(params) = route.pattern().matches(&path) else {
                            continue;
                        };
                        if let Some(endpoint) = route.methods().endpoint(&method) {
                            debug!(%method, route = route.path(), "dispatching request");
                            params.merge_into(&mut request.scope_mut().path_params);
                            return endpoint.call(request).await;
                        }
                        if allowed.is_none() {
                            allowed = Some(route.methods().allowed_methods());
                        }
                    }
                    RouteEntry::Mount(mount) => {
                        let Some(matched) = mount.prefix().match_prefix(&path) else {
                            continue;
                        };
                        debug!(%method, mount = mount.path(), "entering mount");
                        enter_mount(request.scope_mut(), matched);
                        return mount.router().handle(request).await;
                    }
                    RouteEntry::WebSocket(_) => {}
                }
            }

            Ok(match allowed {
                Some(methods) => {
                    debug!(%method, %path, "method not allowed");
                    method_not_allowed(&methods)
                }
                None => {
                    debug!(%method, %path, "no route matched");
                    Response::text("Not Found").with_status(StatusCode::NOT_FOUND)
                }
            })
        })
    }

    fn dispatch_websocket(
        &self,
        mut scope: ConnectionScope,
        receive: Receiver,
        send: Sender,
    ) -> BoxFuture<'_, AppResult> {
        Box::pin(async move {
            let path = scope.path.clone();

            for entry in self.routes.iter() {
                match entry {
                    RouteEntry::WebSocket(route) => {
                        let Some(params) = route.pattern().matches(&path) else {
                            continue;
                        };
                        debug!(route = route.path(), "dispatching websocket");
                        params.merge_into(&mut scope.path_params);
                        let socket = WebSocket::new(scope, receive, send);
                        return route.handler().call(socket).await;
                    }
                    RouteEntry::Mount(mount) => {
                        let Some(matched) = mount.prefix().match_prefix(&path) else {
                            continue;
                        };
                        enter_mount(&mut scope, matched);
                        return mount.router().dispatch_websocket(scope, receive, send).await;
                    }
                    RouteEntry::Route(_) => {}
                }
            }

            debug!(%path, "no websocket route matched, closing");
            send.send(Message::WebSocketClose {
                code: 1000,
                reason: None,
            })
            .await?;
            Ok(())
        })
    }

    fn publish_route_table(&self, scope: &mut ConnectionScope) {
        if scope.extensions.get::<RouteTable>().is_none() {
            scope.extensions.insert(self.route_table());
        }
    }

    async fn serve_http(&self, mut scope: ConnectionScope, receive: Receiver, send: Sender) -> AppResult {
        self.publish_route_table(&mut scope);
        let is_head = scope.method == Method::HEAD;
        let request = Request::new(scope, receive);

        match self.handle(request).await {
            Ok(response) if is_head => response.send_head(&send).await?,
            Ok(response) => response.send(&send).await?,
            Err(err) => {
                error!(error = %err, "request handler failed");
                let internal = Response::text("Internal Server Error")
                    .with_status(StatusCode::INTERNAL_SERVER_ERROR);
                if internal.send(&send).await.is_err() {
                    debug!("client gone before the error response was sent");
                }
                return Err(err);
            }
        }
        Ok(())
    }
}

fn enter_mount(scope: &mut ConnectionScope, matched: PrefixMatch) {
    scope.root_path.push_str(&matched.matched);
    scope.path = matched.remainder;
    matched.params.merge_into(&mut scope.path_params);
}

fn method_not_allowed(methods: &[Method]) -> Response {
    let response =
        Response::text("Method Not Allowed").with_status(StatusCode::METHOD_NOT_ALLOWED);
    let allow = methods
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    match HeaderValue::from_str(&allow) {
        Ok(value) => response.with_header(ALLOW, value),
        Err(_) => response,
    }
}

impl Application for Router {
    fn call(&self, scope: Scope, receive: Receiver, send: Sender) -> BoxFuture<'_, AppResult> {
        Box::pin(async move {
            match scope {
                Scope::Lifespan => self.lifecycle.serve(&receive, &send).await,
                Scope::Http(scope) => self.serve_http(scope, receive, send).await,
                Scope::WebSocket(mut scope) => {
                    self.publish_route_table(&mut scope);
                    self.dispatch_websocket(scope, receive, send).await
                }
            }
        })
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes)
            .field(
                "middleware",
                &self.middleware.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .field("lifecycle", &self.lifecycle)
            .finish()
    }
}

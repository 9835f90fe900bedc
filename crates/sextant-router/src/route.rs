//! Route table entries.

use std::fmt;
use std::sync::Arc;

use crate::error::RouterError;
use crate::handler::WebSocketHandler;
use crate::method_router::MethodRouter;
use crate::pattern::PathPattern;
use crate::router::Router;

/// An HTTP route: a path pattern and the endpoints serving it.
#[derive(Debug, Clone)]
pub struct Route {
    pattern: PathPattern,
    methods: MethodRouter,
    include_in_schema: bool,
}

impl Route {
    /// Creates a route.
    pub fn new(path: &str, methods: MethodRouter) -> Result<Self, RouterError> {
        Ok(Self {
            pattern: PathPattern::new(path)?,
            methods,
            include_in_schema: true,
        })
    }

    /// Sets whether the route appears in generated schemas.
    #[must_use]
    pub fn include_in_schema(mut self, include: bool) -> Self {
        self.include_in_schema = include;
        self
    }

    /// The declared path pattern.
    pub fn path(&self) -> &str {
        self.pattern.path()
    }

    /// The compiled pattern.
    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    /// The endpoints by method.
    pub fn methods(&self) -> &MethodRouter {
        &self.methods
    }

    /// Whether the route appears in generated schemas.
    pub fn is_included_in_schema(&self) -> bool {
        self.include_in_schema
    }
}

/// A WebSocket route.
#[derive(Clone)]
pub struct WebSocketRoute {
    pattern: PathPattern,
    handler: Arc<dyn WebSocketHandler>,
}

impl WebSocketRoute {
    /// Creates a WebSocket route.
    pub fn new(path: &str, handler: impl WebSocketHandler) -> Result<Self, RouterError> {
        Ok(Self {
            pattern: PathPattern::new(path)?,
            handler: Arc::new(handler),
        })
    }

    /// The declared path pattern.
    pub fn path(&self) -> &str {
        self.pattern.path()
    }

    pub(crate) fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub(crate) fn handler(&self) -> &dyn WebSocketHandler {
        self.handler.as_ref()
    }
}

impl fmt::Debug for WebSocketRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketRoute")
            .field("path", &self.pattern.path())
            .finish_non_exhaustive()
    }
}

/// A nested router served under a path prefix.
#[derive(Debug, Clone)]
pub struct Mount {
    prefix: PathPattern,
    router: Router,
}

impl Mount {
    /// Mounts `router` at `prefix`.
    pub fn new(prefix: &str, router: Router) -> Result<Self, RouterError> {
        Ok(Self {
            prefix: PathPattern::prefix(prefix)?,
            router,
        })
    }

    /// The mount prefix, without a trailing slash.
    pub fn path(&self) -> &str {
        self.prefix.path()
    }

    pub(crate) fn prefix(&self) -> &PathPattern {
        &self.prefix
    }

    /// The mounted router.
    pub fn router(&self) -> &Router {
        &self.router
    }
}

/// One entry of a route table.
#[derive(Debug, Clone)]
pub enum RouteEntry {
    /// HTTP route.
    Route(Route),
    /// WebSocket route.
    WebSocket(WebSocketRoute),
    /// Nested router.
    Mount(Mount),
}

impl RouteEntry {
    /// The declared path or prefix.
    pub fn path(&self) -> &str {
        match self {
            Self::Route(route) => route.path(),
            Self::WebSocket(route) => route.path(),
            Self::Mount(mount) => mount.path(),
        }
    }
}

impl From<Route> for RouteEntry {
    fn from(route: Route) -> Self {
        Self::Route(route)
    }
}

impl From<WebSocketRoute> for RouteEntry {
    fn from(route: WebSocketRoute) -> Self {
        Self::WebSocket(route)
    }
}

impl From<Mount> for RouteEntry {
    fn from(mount: Mount) -> Self {
        Self::Mount(mount)
    }
}

//! HTTP method-based routing.
//!
//! [`MethodRouter`] maps HTTP methods to endpoints for a single path. A
//! router with a `GET` endpoint also answers `HEAD` with it unless a `HEAD`
//! endpoint is registered explicitly.

use http::Method;

use crate::handler::{Endpoint, IntoEndpoint};

/// Maps HTTP methods to endpoints for a single route.
///
/// # Example
///
/// ```rust,ignore
/// use sextant_router::{Endpoint, MethodRouter};
///
/// let methods = MethodRouter::new()
///     .get(Endpoint::new(list_users).with_doc(LIST_USERS_DOC))
///     .post(create_user);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MethodRouter {
    endpoints: Vec<(Method, Endpoint)>,
}

impl MethodRouter {
    /// Creates an empty method router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a GET endpoint.
    #[must_use]
    pub fn get(self, endpoint: impl IntoEndpoint) -> Self {
        self.on(Method::GET, endpoint)
    }

    /// Registers a POST endpoint.
    #[must_use]
    pub fn post(self, endpoint: impl IntoEndpoint) -> Self {
        self.on(Method::POST, endpoint)
    }

    /// Registers a PUT endpoint.
    #[must_use]
    pub fn put(self, endpoint: impl IntoEndpoint) -> Self {
        self.on(Method::PUT, endpoint)
    }

    /// Registers a PATCH endpoint.
    #[must_use]
    pub fn patch(self, endpoint: impl IntoEndpoint) -> Self {
        self.on(Method::PATCH, endpoint)
    }

    /// Registers a DELETE endpoint.
    #[must_use]
    pub fn delete(self, endpoint: impl IntoEndpoint) -> Self {
        self.on(Method::DELETE, endpoint)
    }

    /// Registers an explicit HEAD endpoint.
    #[must_use]
    pub fn head(self, endpoint: impl IntoEndpoint) -> Self {
        self.on(Method::HEAD, endpoint)
    }

    /// Registers an OPTIONS endpoint.
    #[must_use]
    pub fn options(self, endpoint: impl IntoEndpoint) -> Self {
        self.on(Method::OPTIONS, endpoint)
    }

    /// Registers an endpoint for any method, replacing a previous one.
    #[must_use]
    pub fn on(mut self, method: Method, endpoint: impl IntoEndpoint) -> Self {
        let endpoint = endpoint.into_endpoint();
        match self.endpoints.iter_mut().find(|(m, _)| *m == method) {
            Some((_, existing)) => *existing = endpoint,
            None => self.endpoints.push((method, endpoint)),
        }
        self
    }

    /// Returns the endpoint serving a method.
    pub fn endpoint(&self, method: &Method) -> Option<&Endpoint> {
        self.find(method).or_else(|| {
            if *method == Method::HEAD {
                self.find(&Method::GET)
            } else {
                None
            }
        })
    }

    fn find(&self, method: &Method) -> Option<&Endpoint> {
        self.endpoints
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, endpoint)| endpoint)
    }

    /// Methods this router answers, implicit `HEAD` included.
    pub fn allowed_methods(&self) -> Vec<Method> {
        let mut methods: Vec<Method> = self.endpoints.iter().map(|(m, _)| m.clone()).collect();
        if self.find(&Method::GET).is_some() && self.find(&Method::HEAD).is_none() {
            methods.push(Method::HEAD);
        }
        methods
    }

    /// Registered endpoints in registration order. Implicit `HEAD` is not
    /// listed.
    pub fn iter(&self) -> impl Iterator<Item = (&Method, &Endpoint)> {
        self.endpoints.iter().map(|(m, endpoint)| (m, endpoint))
    }

    /// Returns true if no endpoint is registered.
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

//! Router implementation using radix tree (matchit)
//!
//! A thin host multiplexer: handlers are registered per `METHOD /path`
//! pattern and looked up per request. Endpoints are normally registered
//! through [`mount`](crate::mount), which builds the handler for you.
//!
//! # Path Patterns
//!
//! Routes support dynamic path parameters using `{param}` syntax:
//!
//! - `GET /queues` - Static path
//! - `GET /queues/{name}` - Single parameter
//! - `DELETE /queues/{name}/jobs/{id}` - Multiple parameters
//!
//! # Route Conflict Detection
//!
//! Registering the same method twice for one path, or two paths matchit
//! cannot tell apart, panics at registration time.

use crate::request::{Body, Request};
use crate::response::{plain_text, Response};
use http::{header, HeaderValue, Method, StatusCode};
use matchit::Router as MatchitRouter;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future returned by handlers and middleware.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// A type-erased request handler.
pub type BoxedHandler = Arc<dyn Fn(Request) -> BoxFuture<Response> + Send + Sync>;

/// Error in a `"METHOD /path"` pattern.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("pattern is empty")]
    Empty,
    #[error("pattern {0:?} must be of the form \"METHOD /path\"")]
    MissingPath(String),
    #[error("pattern {0:?} has an invalid HTTP method")]
    InvalidMethod(String),
    #[error("pattern {0:?} has a path that does not start with '/'")]
    InvalidPath(String),
}

/// Split a `"METHOD /path"` pattern.
pub fn parse_pattern(pattern: &str) -> Result<(Method, &str), PatternError> {
    let trimmed = pattern.trim();
    if trimmed.is_empty() {
        return Err(PatternError::Empty);
    }

    let (method, path) = trimmed
        .split_once(char::is_whitespace)
        .ok_or_else(|| PatternError::MissingPath(pattern.to_string()))?;

    let method = Method::from_bytes(method.as_bytes())
        .map_err(|_| PatternError::InvalidMethod(pattern.to_string()))?;

    let path = path.trim_start();
    if !path.starts_with('/') {
        return Err(PatternError::InvalidPath(pattern.to_string()));
    }

    Ok((method, path))
}

/// Error returned when a route conflict is detected
#[derive(Debug, Clone)]
pub struct RouteConflictError {
    /// The path that was being registered
    pub new_path: String,
    /// The HTTP method that conflicts
    pub method: Method,
    /// The existing path that conflicts
    pub existing_path: Option<String>,
    /// Detailed error message from the underlying router
    pub details: String,
}

impl std::fmt::Display for RouteConflictError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "route conflict registering {} {}", self.method, self.new_path)?;
        if let Some(existing) = &self.existing_path {
            write!(f, " (conflicts with {existing})")?;
        }
        write!(f, ": {}", self.details)
    }
}

impl std::error::Error for RouteConflictError {}

/// HTTP method router for a single path
struct MethodRouter {
    path: String,
    handlers: HashMap<Method, BoxedHandler>,
}

impl MethodRouter {
    fn allowed_methods(&self) -> Vec<Method> {
        let mut allowed: Vec<Method> = self.handlers.keys().cloned().collect();
        allowed.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        allowed
    }
}

/// Host request multiplexer.
pub struct Router {
    inner: MatchitRouter<usize>,
    routes: Vec<MethodRouter>,
    /// matchit path -> index into `routes`
    paths: HashMap<String, usize>,
}

impl Router {
    /// Create a new router
    pub fn new() -> Self {
        Self {
            inner: MatchitRouter::new(),
            routes: Vec::new(),
            paths: HashMap::new(),
        }
    }

    /// Register a handler for a `"METHOD /path"` pattern.
    ///
    /// # Panics
    ///
    /// On a malformed pattern or a route conflict.
    pub fn handle(&mut self, pattern: &str, handler: BoxedHandler) {
        let (method, path) = parse_pattern(pattern)
            .unwrap_or_else(|err| panic!("invalid route pattern: {err}"));
        self.route(method, path, handler);
    }

    /// Register a handler for one method on one path.
    ///
    /// # Panics
    ///
    /// On a route conflict.
    pub fn route(&mut self, method: Method, path: &str, handler: BoxedHandler) {
        // Convert {param} style to :param for matchit
        let matchit_path = convert_path_params(path);

        if let Some(&index) = self.paths.get(&matchit_path) {
            let route = &mut self.routes[index];
            if route.handlers.contains_key(&method) {
                panic!(
                    "{}",
                    RouteConflictError {
                        new_path: path.to_string(),
                        method,
                        existing_path: Some(route.path.clone()),
                        details: "a handler for this method is already registered".to_string(),
                    }
                );
            }
            route.handlers.insert(method, handler);
            return;
        }

        let index = self.routes.len();
        if let Err(err) = self.inner.insert(matchit_path.clone(), index) {
            let existing_path = self.find_conflicting_route(&matchit_path);
            panic!(
                "{}",
                RouteConflictError {
                    new_path: path.to_string(),
                    method,
                    existing_path,
                    details: err.to_string(),
                }
            );
        }

        self.paths.insert(matchit_path, index);
        self.routes.push(MethodRouter {
            path: path.to_string(),
            handlers: HashMap::from([(method, handler)]),
        });
    }

    /// Find a conflicting route by comparing parameter-agnostic shapes
    fn find_conflicting_route(&self, matchit_path: &str) -> Option<String> {
        let normalized_new = normalize_path_for_comparison(matchit_path);
        self.paths
            .iter()
            .find(|(registered, _)| normalize_path_for_comparison(registered) == normalized_new)
            .map(|(_, &index)| self.routes[index].path.clone())
    }

    /// Match a request and return the handler + params
    pub(crate) fn match_route(&self, path: &str, method: &Method) -> RouteMatch<'_> {
        match self.inner.at(path) {
            Ok(matched) => {
                let method_router = &self.routes[*matched.value];

                if let Some(handler) = method_router.handlers.get(method) {
                    let params: HashMap<String, String> = matched
                        .params
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect();

                    RouteMatch::Found { handler, params }
                } else {
                    RouteMatch::MethodNotAllowed {
                        allowed: method_router.allowed_methods(),
                    }
                }
            }
            Err(_) => RouteMatch::NotFound,
        }
    }

    /// Dispatch one request.
    ///
    /// Unknown paths get a plain-text 404 and known paths with another
    /// method a plain-text 405 listing the allowed methods.
    pub async fn call(&self, req: http::Request<Body>) -> Response {
        let (parts, body) = req.into_parts();

        match self.match_route(parts.uri.path(), &parts.method) {
            RouteMatch::Found { handler, params } => {
                let future = handler(Request::new(parts, body, params));
                future.await
            }
            RouteMatch::NotFound => plain_text(StatusCode::NOT_FOUND, "404 page not found\n"),
            RouteMatch::MethodNotAllowed { allowed } => {
                let mut response =
                    plain_text(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed\n");
                let allowed: Vec<&str> = allowed.iter().map(Method::as_str).collect();
                if let Ok(value) = HeaderValue::from_str(&allowed.join(", ")) {
                    response.headers_mut().insert(header::ALLOW, value);
                }
                response
            }
        }
    }

    /// Registered routes as `"METHOD /path"` strings, sorted.
    pub fn registered_routes(&self) -> Vec<String> {
        let mut routes: Vec<String> = self
            .routes
            .iter()
            .flat_map(|route| {
                route
                    .handlers
                    .keys()
                    .map(move |method| format!("{} {}", method, route.path))
            })
            .collect();
        routes.sort();
        routes
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of route matching
pub(crate) enum RouteMatch<'a> {
    Found {
        handler: &'a BoxedHandler,
        params: HashMap<String, String>,
    },
    NotFound,
    MethodNotAllowed {
        allowed: Vec<Method>,
    },
}

/// Convert {param} style to :param for matchit
fn convert_path_params(path: &str) -> String {
    let mut result = String::with_capacity(path.len());

    for ch in path.chars() {
        match ch {
            '{' => result.push(':'),
            '}' => {}
            _ => result.push(ch),
        }
    }

    result
}

/// Normalize a path for conflict comparison by replacing parameter names with a placeholder
fn normalize_path_for_comparison(path: &str) -> String {
    let mut result = String::with_capacity(path.len());
    let mut in_param = false;

    for ch in path.chars() {
        match ch {
            ':' => {
                in_param = true;
                result.push_str(":_");
            }
            '/' => {
                in_param = false;
                result.push('/');
            }
            _ if in_param => {}
            _ => result.push(ch),
        }
    }

    result
}

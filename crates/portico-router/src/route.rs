//! Registered routes and path matching.

use std::future::Future;
use std::sync::Arc;

use http::Method;
use parking_lot::RwLock;
use percent_encoding::percent_decode_str;
use portico_core::{BoxFuture, IntoResponse, Params, Response};
use portico_validate::{DomainRequest, RequestShape};

use crate::group::Group;
use crate::{Middleware, RouteError};

/// A request handler.
///
/// Implemented for every `Fn(DomainRequest) -> impl Future` whose output
/// converts into a response, so plain async functions and closures work:
///
/// ```rust,ignore
/// async fn show_user(req: DomainRequest) -> HandlerResult<Json<User>> { ... }
/// router.get("/users/{id}", show_user);
/// ```
pub trait Handler: Send + Sync + 'static {
    /// Invokes the handler.
    fn call(&self, request: DomainRequest) -> BoxFuture<'static, Response>;
}

impl<F, Fut, R> Handler for F
where
    F: Fn(DomainRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    fn call(&self, request: DomainRequest) -> BoxFuture<'static, Response> {
        let fut = self(request);
        Box::pin(async move { fut.await.into_response() })
    }
}

/// A segment of a path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

fn parse_segments(pattern: &str) -> Vec<Segment> {
    pattern
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(name) => Segment::Param(name.to_string()),
            None => Segment::Literal(s.to_string()),
        })
        .collect()
}

#[derive(Default)]
struct RouteMeta {
    name: Option<String>,
    shape: Option<Arc<RequestShape>>,
    middleware: Vec<Arc<dyn Middleware>>,
}

/// A registered route.
///
/// The pattern is the full path including group prefixes; `{name}`
/// segments capture one path segment each.
pub struct Route {
    method: Method,
    pattern: String,
    segments: Vec<Segment>,
    handler: Arc<dyn Handler>,
    group: Arc<Group>,
    meta: RwLock<RouteMeta>,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .field("name", &self.meta.read().name)
            .finish_non_exhaustive()
    }
}

impl Route {
    pub(crate) fn new(
        method: Method,
        pattern: String,
        handler: Arc<dyn Handler>,
        group: Arc<Group>,
    ) -> Self {
        Self {
            segments: parse_segments(&pattern),
            method,
            pattern,
            handler,
            group,
            meta: RwLock::new(RouteMeta::default()),
        }
    }

    /// HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Full path pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Route name, if one was given.
    #[must_use]
    pub fn name(&self) -> Option<String> {
        self.meta.read().name.clone()
    }

    /// Request shape checked by the gate before the handler runs.
    #[must_use]
    pub fn shape(&self) -> Option<Arc<RequestShape>> {
        self.meta.read().shape.clone()
    }

    /// Fills the pattern's `{param}` segments from `params`.
    ///
    /// ```rust
    /// use portico_router::Router;
    ///
    /// let router = Router::new();
    /// let route = router.get("/users/{id}/posts/{post}", |_req| async { "ok" }).into_route();
    /// assert_eq!(
    ///     route.build_uri(&[("id", "7"), ("post", "12")]).unwrap(),
    ///     "/users/7/posts/12"
    /// );
    /// ```
    pub fn build_uri(&self, params: &[(&str, &str)]) -> Result<String, RouteError> {
        if self.segments.is_empty() {
            return Ok("/".to_string());
        }

        let mut uri = String::with_capacity(self.pattern.len());
        for segment in &self.segments {
            uri.push('/');
            match segment {
                Segment::Literal(lit) => uri.push_str(lit),
                Segment::Param(name) => {
                    let value = params
                        .iter()
                        .find(|(n, _)| *n == name.as_str())
                        .map(|(_, v)| *v)
                        .ok_or_else(|| RouteError::MissingParameter {
                            route: self.pattern.clone(),
                            param: name.clone(),
                        })?;
                    uri.push_str(value);
                }
            }
        }
        Ok(uri)
    }

    /// Matches a request path, returning captured parameters.
    ///
    /// Segments are split on `/` first and percent-decoded afterwards, so
    /// `%2F` stays inside its segment. A segment that does not decode to
    /// UTF-8 matches nothing.
    pub(crate) fn match_path(&self, path: &str) -> Option<Params> {
        let mut actual = path.split('/').filter(|s| !s.is_empty());
        let mut params = Params::new();

        for segment in &self.segments {
            let part = percent_decode_str(actual.next()?).decode_utf8().ok()?;
            match segment {
                Segment::Literal(expected) => {
                    if *expected != part {
                        return None;
                    }
                }
                Segment::Param(name) => params.push(name.as_str(), part.as_ref()),
            }
        }

        if actual.next().is_some() {
            return None;
        }
        Some(params)
    }

    pub(crate) fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    /// Group middleware (outermost group first) followed by route middleware.
    pub(crate) fn middleware_chain(&self) -> Vec<Arc<dyn Middleware>> {
        let mut chain = Vec::new();
        self.group.collect_middleware(&mut chain);
        chain.extend(self.meta.read().middleware.iter().cloned());
        chain
    }
}

/// Handle returned by route registration, used to attach a name, a shape
/// or route-level middleware.
#[derive(Debug, Clone)]
pub struct RouteRef {
    route: Arc<Route>,
}

impl RouteRef {
    pub(crate) fn new(route: Arc<Route>) -> Self {
        Self { route }
    }

    /// Names the route for [`Router::route_by_name`](crate::Router::route_by_name).
    pub fn name(self, name: impl Into<String>) -> Self {
        self.route.meta.write().name = Some(name.into());
        self
    }

    /// Attaches a request shape.
    pub fn shape(self, shape: RequestShape) -> Self {
        self.route.meta.write().shape = Some(Arc::new(shape));
        self
    }

    /// Adds middleware that runs only for this route, inside group middleware.
    pub fn middleware(self, middleware: impl Middleware) -> Self {
        self.route.meta.write().middleware.push(Arc::new(middleware));
        self
    }

    /// The registered route.
    #[must_use]
    pub fn into_route(self) -> Arc<Route> {
        self.route
    }
}

/// A route matched against a request, with its captured parameters.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    route: Arc<Route>,
    params: Params,
}

impl RouteMatch {
    pub(crate) fn new(route: Arc<Route>, params: Params) -> Self {
        Self { route, params }
    }

    /// The matched route.
    #[must_use]
    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }

    /// Captured path parameters.
    #[must_use]
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// A single captured parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    pub(crate) fn into_parts(self) -> (Arc<Route>, Params) {
        (self.route, self.params)
    }
}

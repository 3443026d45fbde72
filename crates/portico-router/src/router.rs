//! The route table and dispatch.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use http::{Method, StatusCode};
use parking_lot::RwLock;
use portico_core::{response, IntoResponse, Request, Response};
use portico_validate::{DomainRequest, RequestGate, ValidationOutcome};

use crate::group::Group;
use crate::route::{Handler, Route, RouteMatch, RouteRef};
use crate::Middleware;

struct Table {
    routes: RwLock<Vec<Arc<Route>>>,
    gate: RequestGate,
}

/// Maps `(method, path)` to a handler.
///
/// A `Router` is a cheap handle: [`group`](Self::group) returns another
/// handle onto the same table with a longer prefix and its own middleware
/// scope. Routes are matched in registration order across the whole table,
/// so when two patterns overlap the one registered first wins.
///
/// Register routes before the server starts.
///
/// # Example
///
/// ```rust
/// use portico_router::Router;
/// use portico_validate::{RequestShape, Rule};
/// use http::Method;
///
/// let router = Router::new();
/// router.get("/health", |_req| async { "ok" });
///
/// let api = router.group("/api");
/// api.post("/users", |_req| async { http::StatusCode::CREATED })
///     .name("users.create")
///     .shape(RequestShape::new().field("name", [Rule::Required, Rule::String]));
///
/// let matched = router.resolve(&Method::POST, "/api/users").unwrap();
/// assert_eq!(matched.route().name().as_deref(), Some("users.create"));
/// assert!(router.resolve(&Method::GET, "/api/users").is_none());
/// ```
#[derive(Clone)]
pub struct Router {
    table: Arc<Table>,
    group: Arc<Group>,
    prefix: String,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("prefix", &self.prefix)
            .field("routes", &self.len())
            .finish_non_exhaustive()
    }
}

impl Router {
    /// Creates an empty router with the default `en-US` gate.
    #[must_use]
    pub fn new() -> Self {
        Self::with_gate(RequestGate::default())
    }

    /// Creates an empty router that validates requests through `gate`.
    #[must_use]
    pub fn with_gate(gate: RequestGate) -> Self {
        Self {
            table: Arc::new(Table {
                routes: RwLock::new(Vec::new()),
                gate,
            }),
            group: Arc::new(Group::root()),
            prefix: String::new(),
        }
    }

    /// Path prefix applied to routes registered through this handle.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Creates a group under `prefix`.
    ///
    /// The group inherits this router's prefix and middleware; middleware
    /// added to the group applies only to routes registered through it.
    #[must_use]
    pub fn group(&self, prefix: &str) -> Self {
        Self {
            table: Arc::clone(&self.table),
            group: Arc::new(Group::child(&self.group)),
            prefix: join(&self.prefix, prefix),
        }
    }

    /// Adds middleware to this router's scope.
    pub fn middleware(&self, middleware: impl Middleware) -> &Self {
        self.group.push(Arc::new(middleware));
        self
    }

    /// Registers a route.
    pub fn route<H, Fut, R>(&self, method: Method, path: &str, handler: H) -> RouteRef
    where
        H: Fn(DomainRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse + 'static,
    {
        self.route_handler(method, path, Arc::new(handler))
    }

    /// Registers a route with an already type-erased handler.
    pub fn route_handler(&self, method: Method, path: &str, handler: Arc<dyn Handler>) -> RouteRef {
        let pattern = join(&self.prefix, path);
        let route = Arc::new(Route::new(method, pattern, handler, Arc::clone(&self.group)));
        tracing::debug!(method = %route.method(), pattern = %route.pattern(), "Route registered");
        self.table.routes.write().push(Arc::clone(&route));
        RouteRef::new(route)
    }

    /// Registers a `GET` route.
    pub fn get<H, Fut, R>(&self, path: &str, handler: H) -> RouteRef
    where
        H: Fn(DomainRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse + 'static,
    {
        self.route(Method::GET, path, handler)
    }

    /// Registers a `POST` route.
    pub fn post<H, Fut, R>(&self, path: &str, handler: H) -> RouteRef
    where
        H: Fn(DomainRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse + 'static,
    {
        self.route(Method::POST, path, handler)
    }

    /// Registers a `PUT` route.
    pub fn put<H, Fut, R>(&self, path: &str, handler: H) -> RouteRef
    where
        H: Fn(DomainRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse + 'static,
    {
        self.route(Method::PUT, path, handler)
    }

    /// Registers a `PATCH` route.
    pub fn patch<H, Fut, R>(&self, path: &str, handler: H) -> RouteRef
    where
        H: Fn(DomainRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse + 'static,
    {
        self.route(Method::PATCH, path, handler)
    }

    /// Registers a `DELETE` route.
    pub fn delete<H, Fut, R>(&self, path: &str, handler: H) -> RouteRef
    where
        H: Fn(DomainRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse + 'static,
    {
        self.route(Method::DELETE, path, handler)
    }

    /// Registers an `OPTIONS` route.
    pub fn options<H, Fut, R>(&self, path: &str, handler: H) -> RouteRef
    where
        H: Fn(DomainRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse + 'static,
    {
        self.route(Method::OPTIONS, path, handler)
    }

    /// Number of registered routes in the whole table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.routes.read().len()
    }

    /// Whether no route is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.routes.read().is_empty()
    }

    /// All routes in registration order.
    #[must_use]
    pub fn routes(&self) -> Vec<Arc<Route>> {
        self.table.routes.read().clone()
    }

    /// Finds the first route registered under `name`.
    #[must_use]
    pub fn route_by_name(&self, name: &str) -> Option<Arc<Route>> {
        self.table
            .routes
            .read()
            .iter()
            .find(|r| r.name().as_deref() == Some(name))
            .cloned()
    }

    /// Matches a method and path. `None` means no route matches.
    #[must_use]
    pub fn resolve(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        self.table
            .routes
            .read()
            .iter()
            .filter(|r| r.method() == method)
            .find_map(|r| r.match_path(path).map(|params| RouteMatch::new(Arc::clone(r), params)))
    }

    /// Routes a request through middleware, the gate and the handler.
    ///
    /// - no matching route: `404` with `{"error": "Not Found", "path": ...}`
    /// - gate refuses: `400` or `422`, the handler is not called
    /// - handler or middleware panics: `500`, logged
    pub async fn dispatch(&self, mut request: Request) -> Response {
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let Some(matched) = self.resolve(&method, &path) else {
            tracing::debug!(%method, %path, "No route matched");
            return not_found(&path);
        };

        let (route, params) = matched.into_parts();
        let chain = route.middleware_chain();
        let shape = route.shape();
        let handler = Arc::clone(route.handler());
        let gate = self.table.gate.clone();

        request.extensions_mut().insert(params.clone());

        let next = crate::Next::chain(&chain, move |request| {
            Box::pin(async move {
                match gate.evaluate(request, params, shape.as_deref()) {
                    ValidationOutcome::Valid(domain) => handler.call(domain).await,
                    ValidationOutcome::Invalid(errors) => errors.into_response(),
                }
            })
        });

        match AssertUnwindSafe(async move { next.run(request).await })
            .catch_unwind()
            .await
        {
            Ok(response) => response,
            Err(panic) => {
                tracing::error!(
                    %method,
                    %path,
                    panic = %panic_message(panic.as_ref()),
                    "Handler panicked"
                );
                response::json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal Server Error",
                )
            }
        }
    }
}

/// The `404` response for an unmatched path.
#[must_use]
pub fn not_found(path: &str) -> Response {
    response::json(
        StatusCode::NOT_FOUND,
        &serde_json::json!({
            "error": "Not Found",
            "path": path
        }),
    )
}

/// Extracts a printable message from a panic payload.
#[must_use]
pub fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn join(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    match (prefix.is_empty(), path.is_empty()) {
        (true, true) => "/".to_string(),
        (false, true) => prefix.to_string(),
        _ => format!("{prefix}/{path}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::from_fn;
    use bytes::Bytes;
    use http::HeaderValue;
    use http_body_util::BodyExt;
    use parking_lot::Mutex;
    use portico_validate::{RequestShape, Rule};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn request(method: Method, uri: &str, body: &'static str) -> Request {
        http::Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Bytes::from_static(body.as_bytes()))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_join() {
        assert_eq!(join("", "/"), "/");
        assert_eq!(join("", "users"), "/users");
        assert_eq!(join("/api/", "/users"), "/api/users");
        assert_eq!(join("/api", ""), "/api");
    }

    #[test]
    fn test_first_registered_wins() {
        let router = Router::new();
        router.get("/users/{id}", |_req| async { "param" }).name("by_id");
        router.get("/users/me", |_req| async { "literal" }).name("me");

        let matched = router.resolve(&Method::GET, "/users/me").unwrap();
        assert_eq!(matched.route().name().as_deref(), Some("by_id"));
        assert_eq!(matched.param("id"), Some("me"));
    }

    #[test]
    fn test_resolve_decodes_params() {
        let router = Router::new();
        router.get("/users/{name}", |_req| async { "user" });

        let matched = router.resolve(&Method::GET, "/users/John%20Doe").unwrap();
        assert_eq!(matched.param("name"), Some("John Doe"));
        assert!(router.resolve(&Method::GET, "/users/%C3%28").is_none());
    }

    #[tokio::test]
    async fn test_dispatch_invalid_escape_is_not_found() {
        let router = Router::new();
        router.get("/users/{name}", |_req| async { "user" });

        let response = router.dispatch(request(Method::GET, "/users/%FF", "")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_method_must_match() {
        let router = Router::new();
        router.post("/users", |_req| async { "created" });
        assert!(router.resolve(&Method::GET, "/users").is_none());
        assert!(router.resolve(&Method::POST, "/users").is_some());
    }

    #[test]
    fn test_route_by_name() {
        let router = Router::new();
        router.get("/a", |_req| async { "a" }).name("dup");
        router.get("/b", |_req| async { "b" }).name("dup");

        let route = router.route_by_name("dup").unwrap();
        assert_eq!(route.pattern(), "/a");
        assert!(router.route_by_name("missing").is_none());
        assert_eq!(router.len(), 2);
    }

    #[test]
    fn test_group_prefix() {
        let router = Router::new();
        let v1 = router.group("/api").group("v1");
        assert_eq!(v1.prefix(), "/api/v1");

        v1.get("/users/{id}", |_req| async { "ok" });
        assert_eq!(router.routes()[0].pattern(), "/api/v1/users/{id}");
        assert!(router.resolve(&Method::GET, "/api/v1/users/3").is_some());
    }

    #[tokio::test]
    async fn test_dispatch_not_found() {
        let router = Router::new();
        let response = router.dispatch(request(Method::GET, "/nowhere", "")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["error"], "Not Found");
        assert_eq!(body["path"], "/nowhere");
    }

    #[tokio::test]
    async fn test_dispatch_passes_params_and_data() {
        let router = Router::new();
        router
            .post("/users/{id}", |req: DomainRequest| async move {
                let id = req.param("id").unwrap_or_default().to_string();
                let name = req.get("name").cloned().unwrap_or_default();
                portico_core::Json(serde_json::json!({ "id": id, "name": name }))
            })
            .shape(RequestShape::new().field("name", [Rule::Required, Rule::String]));

        let response = router
            .dispatch(request(Method::POST, "/users/9", r#"{"name":"Ada"}"#))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["id"], "9");
        assert_eq!(body["name"], "Ada");
    }

    #[tokio::test]
    async fn test_handler_not_invoked_when_gate_refuses() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let router = Router::new();
        router
            .post("/users", move |_req| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { StatusCode::CREATED }
            })
            .shape(RequestShape::new().field("name", [Rule::Required]));

        let response = router.dispatch(request(Method::POST, "/users", "{}")).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = router
            .dispatch(request(Method::POST, "/users", "{not json"))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_group_middleware_scope() {
        let log = Arc::new(Mutex::new(Vec::new()));

        let router = Router::new();
        let root_log = Arc::clone(&log);
        router.middleware(from_fn("root", move |request, next| {
            root_log.lock().push("root");
            next.run(request)
        }));

        let admin = router.group("/admin");
        let admin_log = Arc::clone(&log);
        admin.middleware(from_fn("admin", move |request, next| {
            admin_log.lock().push("admin");
            next.run(request)
        }));

        router.get("/public", |_req| async { "public" });
        admin.get("/panel", |_req| async { "panel" });

        router.dispatch(request(Method::GET, "/public", "")).await;
        assert_eq!(*log.lock(), ["root"]);

        log.lock().clear();
        router.dispatch(request(Method::GET, "/admin/panel", "")).await;
        assert_eq!(*log.lock(), ["root", "admin"]);
    }

    #[tokio::test]
    async fn test_route_middleware_sees_params() {
        let router = Router::new();
        router
            .get("/items/{id}", |_req| async { "item" })
            .middleware(from_fn("echo_id", |request, next| {
                Box::pin(async move {
                    let id = request
                        .extensions()
                        .get::<portico_core::Params>()
                        .and_then(|p| p.get("id"))
                        .unwrap_or_default()
                        .to_string();
                    let mut response = next.run(request).await;
                    if let Ok(value) = HeaderValue::from_str(&id) {
                        response.headers_mut().insert("x-item", value);
                    }
                    response
                })
            }));

        let response = router.dispatch(request(Method::GET, "/items/5", "")).await;
        assert_eq!(response.headers()["x-item"], "5");
    }

    #[tokio::test]
    async fn test_panicking_handler_is_500() {
        let router = Router::new();
        router.get("/boom", |_req| async {
            if true {
                panic!("kaboom");
            }
            "never"
        });

        let response = router.dispatch(request(Method::GET, "/boom", "")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(boxed.as_ref()), "static");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}

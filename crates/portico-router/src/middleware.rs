//! Middleware trait and chain.
//!
//! Middleware wraps everything downstream of it: inner middleware, the
//! request gate and the handler. A middleware may inspect or rewrite the
//! request, call [`Next::run`] once, and inspect or rewrite the response.
//! Returning without calling `next` short-circuits the route, in which case
//! neither the gate nor the handler runs.
//!
//! The path parameters of the matched route are available to middleware as
//! a [`Params`](portico_core::Params) request extension.
//!
//! # Example
//!
//! ```rust
//! use portico_core::{BoxFuture, Request, Response};
//! use portico_router::{Middleware, Next};
//!
//! struct RequireTenant;
//!
//! impl Middleware for RequireTenant {
//!     fn name(&self) -> &'static str {
//!         "require_tenant"
//!     }
//!
//!     fn process<'a>(&'a self, request: Request, next: Next<'a>) -> BoxFuture<'a, Response> {
//!         Box::pin(async move {
//!             if request.headers().contains_key("x-tenant") {
//!                 next.run(request).await
//!             } else {
//!                 let mut response = Response::default();
//!                 *response.status_mut() = http::StatusCode::FORBIDDEN;
//!                 response
//!             }
//!         })
//!     }
//! }
//! ```

use portico_core::{BoxFuture, Request, Response};

/// A request/response interceptor attached to a router group or a route.
pub trait Middleware: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Processes the request, usually by delegating to `next`.
    fn process<'a>(&'a self, request: Request, next: Next<'a>) -> BoxFuture<'a, Response>;
}

/// The rest of the chain after the current middleware.
///
/// Consumed by [`run`](Self::run), so it can be invoked at most once.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    Chain {
        middleware: &'a dyn Middleware,
        next: Box<Next<'a>>,
    },
    Endpoint(Box<dyn FnOnce(Request) -> BoxFuture<'a, Response> + Send + 'a>),
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
        F: FnOnce(Request) -> BoxFuture<'a, Response> + Send + 'a,
    {
        Self {
            inner: NextInner::Endpoint(Box::new(f)),
        }
    }

    /// Builds a chain that runs `middleware` in order, then `endpoint`.
    pub(crate) fn chain<F>(middleware: &'a [std::sync::Arc<dyn Middleware>], endpoint: F) -> Self
    where
        F: FnOnce(Request) -> BoxFuture<'a, Response> + Send + 'a,
    {
        middleware
            .iter()
            .rev()
            .fold(Self::endpoint(endpoint), |next, mw| Self::new(mw.as_ref(), next))
    }

    /// Invokes the next middleware, or the route endpoint at the end of the
    /// chain.
    pub fn run(self, request: Request) -> BoxFuture<'a, Response> {
        match self.inner {
            NextInner::Chain { middleware, next } => middleware.process(request, *next),
            NextInner::Endpoint(endpoint) => endpoint(request),
        }
    }
}

/// Middleware built from a closure. See [`from_fn`].
pub struct FnMiddleware<F> {
    name: &'static str,
    func: F,
}

/// Creates middleware from a closure returning a boxed future.
///
/// ```rust
/// use portico_router::middleware::from_fn;
///
/// let timing = from_fn("timing", |request, next| {
///     Box::pin(async move {
///         let start = std::time::Instant::now();
///         let response = next.run(request).await;
///         tracing::debug!(elapsed_ms = start.elapsed().as_millis() as u64, "Route finished");
///         response
///     })
/// });
/// ```
pub fn from_fn<F>(name: &'static str, func: F) -> FnMiddleware<F>
where
    F: for<'a> Fn(Request, Next<'a>) -> BoxFuture<'a, Response> + Send + Sync + 'static,
{
    FnMiddleware { name, func }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(Request, Next<'a>) -> BoxFuture<'a, Response> + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn process<'a>(&'a self, request: Request, next: Next<'a>) -> BoxFuture<'a, Response> {
        (self.func)(request, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{HeaderValue, StatusCode};
    use parking_lot::Mutex;
    use portico_core::IntoResponse;
    use std::sync::Arc;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Middleware for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        fn process<'a>(&'a self, request: Request, next: Next<'a>) -> BoxFuture<'a, Response> {
            Box::pin(async move {
                self.log.lock().push(format!("{}:before", self.name));
                let response = next.run(request).await;
                self.log.lock().push(format!("{}:after", self.name));
                response
            })
        }
    }

    fn request() -> Request {
        http::Request::get("/").body(Bytes::new()).unwrap()
    }

    #[tokio::test]
    async fn test_chain_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(Recorder { name: "outer", log: Arc::clone(&log) }),
            Arc::new(Recorder { name: "inner", log: Arc::clone(&log) }),
        ];

        let endpoint_log = Arc::clone(&log);
        let response = Next::chain(&chain, move |_req| {
            Box::pin(async move {
                endpoint_log.lock().push("endpoint".to_string());
                StatusCode::OK.into_response()
            })
        })
        .run(request())
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            *log.lock(),
            ["outer:before", "inner:before", "endpoint", "inner:after", "outer:after"]
        );
    }

    #[tokio::test]
    async fn test_fn_middleware_rewrites_response() {
        let stamp = from_fn("stamp", |request, next| {
            Box::pin(async move {
                let mut response = next.run(request).await;
                response
                    .headers_mut()
                    .insert("x-stamped", HeaderValue::from_static("yes"));
                response
            })
        });
        assert_eq!(stamp.name(), "stamp");

        let chain: Vec<Arc<dyn Middleware>> = vec![Arc::new(stamp)];
        let response = Next::chain(&chain, |_req| {
            Box::pin(async { StatusCode::NO_CONTENT.into_response() })
        })
        .run(request())
        .await;

        assert_eq!(response.headers()["x-stamped"], "yes");
    }

    #[tokio::test]
    async fn test_short_circuit_skips_endpoint() {
        let deny = from_fn("deny", |_request, _next| {
            Box::pin(async { StatusCode::FORBIDDEN.into_response() })
        });
        let chain: Vec<Arc<dyn Middleware>> = vec![Arc::new(deny)];

        let reached = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&reached);
        let response = Next::chain(&chain, move |_req| {
            Box::pin(async move {
                *flag.lock() = true;
                StatusCode::OK.into_response()
            })
        })
        .run(request())
        .await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(!*reached.lock());
    }
}

//! The Portico server host.
//!
//! A [`Server`] owns the listening socket, the lifecycle state machine,
//! startup and shutdown hooks, the service registry and the database
//! handle. It is a cheap, cloneable handle: hooks receive a clone, and
//! [`stop`](Server::stop) may be called from any task while another task
//! is blocked in [`start`](Server::start).
//!
//! # Example
//!
//! ```rust,no_run
//! use portico_server::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::builder().build();
//!     server.router().get("/health", |_req| async { "ok" });
//!
//!     server.register_signal_hook()?;
//!     server.start().await?;
//!     Ok(())
//! }
//! ```

use std::convert::Infallible;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use http::StatusCode;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use parking_lot::{Mutex, RwLock};
use portico_config::{Config, ConfigError};
use portico_core::response::json_error;
use portico_core::Response;
use portico_router::{RouteError, Router};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, watch};

use crate::address;
use crate::database::{Database, Transaction};
use crate::error::{ServerError, ServerResult};
use crate::error_sink::ErrorSink;
use crate::lifecycle::{boxed, run_hooks, Hooks, LifecycleResult, Phase};
use crate::services::{Service, ServiceError, ServiceRegistry};
use crate::shutdown::{ConnectionTracker, OsSignals, ShutdownSignal};
use crate::state::{AtomicState, ServerState};
use crate::ServerConfig;

tokio::task_local! {
    /// Set on the task running `start`, so a `stop` issued from a shutdown
    /// hook does not wait on its own caller.
    static LIFECYCLE_TASK: ();
}

struct Inner {
    config: Config,
    server_config: ServerConfig,
    router: Router,
    host: String,
    base_url: String,
    proxy_base_url: String,

    state: AtomicState,
    shutdown: ShutdownSignal,
    force: ShutdownSignal,
    tracker: ConnectionTracker,
    done: watch::Sender<bool>,
    local_addr: Mutex<Option<SocketAddr>>,
    signal_listener: Mutex<Option<oneshot::Sender<()>>>,

    hooks: Mutex<Hooks>,
    services: ServiceRegistry,
    db: RwLock<Option<Arc<dyn Database>>>,
    error_sink: ErrorSink,
}

/// Marks the lifecycle finished when `start` returns or is dropped.
struct DoneGuard<'a> {
    inner: &'a Inner,
}

impl Drop for DoneGuard<'_> {
    fn drop(&mut self) {
        self.inner.state.stop();
        self.inner.done.send_replace(true);
    }
}

/// The application host.
///
/// Single-use: once stopped, [`start`](Self::start) fails with
/// [`ServerError::AlreadyStopped`]. Register routes, hooks and services
/// before starting.
#[derive(Clone)]
pub struct Server {
    inner: Arc<Inner>,
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("host", &self.inner.host)
            .field("state", &self.state())
            .field("router", &self.inner.router)
            .field("hooks", &*self.inner.hooks.lock())
            .field("services", &self.inner.services)
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Creates a server builder.
    #[must_use]
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// The application configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// The server section of the configuration.
    #[must_use]
    pub fn server_config(&self) -> &ServerConfig {
        &self.inner.server_config
    }

    /// The root router.
    #[must_use]
    pub fn router(&self) -> &Router {
        &self.inner.router
    }

    /// The `host:port` the server binds to.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.inner.host
    }

    /// The address actually bound, once the listener is up. Useful when
    /// binding port `0`.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.inner.local_addr.lock()
    }

    /// The direct base URL. See [`address::base_url`].
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// The base URL behind the reverse proxy. See [`address::proxy_base_url`].
    #[must_use]
    pub fn proxy_base_url(&self) -> &str {
        &self.inner.proxy_base_url
    }

    /// Absolute URL of the named route.
    ///
    /// # Errors
    ///
    /// [`RouteError::UnknownRoute`] if no route has that name,
    /// [`RouteError::MissingParameter`] if a `{param}` is not supplied.
    pub fn route_url(&self, name: &str, params: &[(&str, &str)]) -> Result<String, RouteError> {
        self.url_for(self.base_url(), name, params)
    }

    /// Like [`route_url`](Self::route_url), prefixed with the proxy base URL.
    ///
    /// # Errors
    ///
    /// Same as [`route_url`](Self::route_url).
    pub fn proxy_route_url(&self, name: &str, params: &[(&str, &str)]) -> Result<String, RouteError> {
        self.url_for(self.proxy_base_url(), name, params)
    }

    fn url_for(&self, base: &str, name: &str, params: &[(&str, &str)]) -> Result<String, RouteError> {
        let route = self
            .inner
            .router
            .route_by_name(name)
            .ok_or_else(|| RouteError::UnknownRoute(name.to_string()))?;
        Ok(format!("{base}{}", route.build_uri(params)?))
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ServerState {
        self.inner.state.load()
    }

    /// Whether the server is bound and accepting connections. Lock-free.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state() == ServerState::Ready
    }

    /// The sink transport errors are reported to.
    #[must_use]
    pub fn error_sink(&self) -> ErrorSink {
        self.inner.error_sink
    }

    // Services

    /// The service registry.
    #[must_use]
    pub fn services(&self) -> &ServiceRegistry {
        &self.inner.services
    }

    /// Initialises `service` and registers it under its name. A service
    /// already registered under that name is replaced.
    pub fn register_service<S: Service>(&self, service: S) {
        service.init(self);
        let name = service.name().to_string();
        tracing::debug!(service = %name, "Service registered");
        self.inner.services.register(name, Arc::new(service));
    }

    /// The service registered under `name`.
    ///
    /// # Errors
    ///
    /// [`ServiceError`] if it is missing or not an `S`.
    pub fn service<S: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<S>, ServiceError> {
        self.inner.services.get(name)
    }

    /// The service registered under `name`, if any.
    #[must_use]
    pub fn lookup_service<S: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<S>> {
        self.inner.services.lookup(name)
    }

    // Hooks

    /// Registers a startup hook. Register before starting: hooks added
    /// after the server became ready never run.
    pub fn register_startup_hook<F, Fut>(&self, hook: F)
    where
        F: Fn(Server) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = LifecycleResult> + Send + 'static,
    {
        self.inner.hooks.lock().push(Phase::Startup, None, boxed(hook));
    }

    /// Registers a startup hook with a name used in logs.
    pub fn register_startup_hook_named<F, Fut>(&self, name: impl Into<String>, hook: F)
    where
        F: Fn(Server) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = LifecycleResult> + Send + 'static,
    {
        self.inner
            .hooks
            .lock()
            .push(Phase::Startup, Some(name.into()), boxed(hook));
    }

    /// Registers a shutdown hook. Shutdown hooks block `start` from
    /// returning until they finish.
    pub fn register_shutdown_hook<F, Fut>(&self, hook: F)
    where
        F: Fn(Server) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = LifecycleResult> + Send + 'static,
    {
        self.inner.hooks.lock().push(Phase::Shutdown, None, boxed(hook));
    }

    /// Registers a shutdown hook with a name used in logs.
    pub fn register_shutdown_hook_named<F, Fut>(&self, name: impl Into<String>, hook: F)
    where
        F: Fn(Server) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = LifecycleResult> + Send + 'static,
    {
        self.inner
            .hooks
            .lock()
            .push(Phase::Shutdown, Some(name.into()), boxed(hook));
    }

    /// Removes all startup hooks.
    pub fn clear_startup_hooks(&self) {
        self.inner.hooks.lock().clear(Phase::Startup);
    }

    /// Removes all shutdown hooks.
    pub fn clear_shutdown_hooks(&self) {
        self.inner.hooks.lock().clear(Phase::Shutdown);
    }

    /// Number of registered startup hooks.
    #[must_use]
    pub fn startup_hook_count(&self) -> usize {
        self.inner.hooks.lock().count(Phase::Startup)
    }

    /// Number of registered shutdown hooks.
    #[must_use]
    pub fn shutdown_hook_count(&self) -> usize {
        self.inner.hooks.lock().count(Phase::Shutdown)
    }

    // Database

    /// The database handle.
    ///
    /// # Errors
    ///
    /// [`ServerError::NoDatabase`] when none is attached.
    pub fn db(&self) -> ServerResult<Arc<dyn Database>> {
        self.inner.db.read().clone().ok_or(ServerError::NoDatabase)
    }

    /// Closes the current handle, if any, and attaches `db`.
    ///
    /// # Errors
    ///
    /// Fails if closing the previous handle fails; `db` is not attached then.
    pub async fn replace_db(&self, db: impl Database) -> ServerResult {
        self.close_db().await?;
        tracing::debug!(driver = db.name(), "Database connection attached");
        *self.inner.db.write() = Some(Arc::new(db));
        Ok(())
    }

    /// Closes and detaches the database handle. Does nothing without one.
    ///
    /// # Errors
    ///
    /// [`ServerError::Database`] if the driver fails to close.
    pub async fn close_db(&self) -> ServerResult {
        let db = self.inner.db.write().take();
        if let Some(db) = db {
            db.close().await?;
            tracing::debug!(driver = db.name(), "Database connection closed");
        }
        Ok(())
    }

    /// Begins a transaction on the database handle.
    ///
    /// # Errors
    ///
    /// [`ServerError::NoDatabase`] without a handle, [`ServerError::Database`]
    /// if the driver refuses.
    pub async fn transaction(&self) -> ServerResult<Box<dyn Transaction>> {
        Ok(self.db()?.begin().await?)
    }

    // Lifecycle

    /// Binds the listener and serves until stopped.
    ///
    /// Returns `Ok(())` after a graceful stop, once shutdown hooks have run
    /// and the database handle is closed.
    ///
    /// # Errors
    ///
    /// - [`ServerError::AlreadyRunning`] if another `start` is in progress
    /// - [`ServerError::AlreadyStopped`] if the server has stopped
    /// - [`ServerError::InvalidAddress`] or [`ServerError::Bind`] if the
    ///   listener cannot be bound
    /// - [`ServerError::Serve`] if accepting connections fails fatally
    pub async fn start(&self) -> ServerResult {
        self.inner.state.begin_start()?;
        LIFECYCLE_TASK.scope((), self.run()).await
    }

    async fn run(&self) -> ServerResult {
        let _done = DoneGuard { inner: &self.inner };

        let listener = match self.bind().await {
            Ok(listener) => listener,
            Err(e) => {
                self.inner.state.stop();
                tracing::error!(addr = %self.inner.host, error = %e, "Failed to start server");
                self.teardown().await;
                return Err(e);
            }
        };

        let local_addr = listener.local_addr().ok();
        *self.inner.local_addr.lock() = local_addr;

        if !self.inner.state.mark_ready() {
            tracing::info!("Server stopped before accepting connections");
            drop(listener);
            self.teardown().await;
            return Ok(());
        }

        tracing::info!(
            addr = ?local_addr,
            base_url = %self.inner.base_url,
            "Server listening"
        );

        self.spawn_startup_hooks();
        let result = self.accept_loop(&listener).await;

        self.inner.state.stop();
        drop(listener);
        self.drain().await;
        self.teardown().await;

        tracing::info!("Server stopped");
        result
    }

    /// Stops the server and waits until `start` has finished its cleanup.
    ///
    /// Safe to call from any task, any number of times. Before `start`, it
    /// only marks the server stopped. Also removes the signal listener.
    pub async fn stop(&self) {
        self.disarm_signal_hook();

        let previous = self.inner.state.stop();
        if previous == ServerState::Created {
            self.inner.done.send_replace(true);
            return;
        }

        if previous != ServerState::Stopped {
            tracing::info!(state = %previous, "Stopping server");
        }
        self.inner.shutdown.trigger();

        if LIFECYCLE_TASK.try_with(|()| ()).is_ok() {
            // Called from a shutdown hook; `start` finishes once it returns.
            return;
        }

        let mut done = self.inner.done.subscribe();
        let finished = done.wait_for(|done| *done).await.is_ok();
        if !finished {
            tracing::warn!("Lifecycle ended without signalling completion");
        }
    }

    /// Stops the server on SIGINT or SIGTERM.
    ///
    /// At most one signal listener is active: installing again replaces the
    /// previous one. The listener is removed when it fires or when
    /// [`stop`](Self::stop) is called.
    ///
    /// # Errors
    ///
    /// [`ServerError::Signal`] outside a Tokio runtime or if the OS handlers
    /// cannot be installed.
    pub fn register_signal_hook(&self) -> ServerResult {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ServerError::Signal(std::io::Error::other(e)))?;
        let mut signals = OsSignals::install().map_err(ServerError::Signal)?;

        let (disarm, disarmed) = oneshot::channel::<()>();
        if let Some(previous) = self.inner.signal_listener.lock().replace(disarm) {
            let _ = previous.send(());
        }

        let server = self.clone();
        runtime.spawn(async move {
            tokio::select! {
                received = signals.recv() => match received {
                    Ok(signal) => {
                        tracing::info!(signal, "Received signal, initiating graceful shutdown");
                        server.stop().await;
                    }
                    Err(e) => tracing::error!(error = %e, "Signal listener failed"),
                },
                _ = disarmed => tracing::debug!("Signal listener removed"),
            }
        });
        Ok(())
    }

    fn disarm_signal_hook(&self) {
        if let Some(listener) = self.inner.signal_listener.lock().take() {
            let _ = listener.send(());
        }
    }

    async fn bind(&self) -> ServerResult<TcpListener> {
        let addr = self.inner.host.clone();
        let invalid = |reason: String| ServerError::InvalidAddress {
            addr: addr.clone(),
            reason,
        };

        let resolved = tokio::net::lookup_host(addr.as_str())
            .await
            .map_err(|e| invalid(e.to_string()))?
            .next()
            .ok_or_else(|| invalid("no address found".to_string()))?;

        TcpListener::bind(resolved)
            .await
            .map_err(|source| ServerError::Bind { addr, source })
    }

    fn spawn_startup_hooks(&self) {
        let hooks = self.inner.hooks.lock().snapshot(Phase::Startup);
        if hooks.is_empty() {
            return;
        }

        let server = self.clone();
        tokio::spawn(async move {
            // The accept loop may already have failed
            if !server.is_ready() {
                tracing::debug!("Server no longer ready, skipping startup hooks");
                return;
            }
            if let Err(e) = run_hooks(Phase::Startup, hooks, &server).await {
                tracing::warn!(error = %e, "Startup finished with failed hooks");
            }
        });
    }

    async fn accept_loop(&self, listener: &TcpListener) -> ServerResult {
        let shutdown = self.inner.shutdown.clone();
        loop {
            tokio::select! {
                biased;

                () = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting connections");
                    return Ok(());
                }

                accepted = listener.accept() => match accepted {
                    Ok((stream, remote_addr)) => self.spawn_connection(stream, remote_addr),
                    Err(e) if is_transient(&e) => self.inner.error_sink.accept_error(&e),
                    Err(e) => {
                        self.inner.error_sink.accept_error(&e);
                        return Err(ServerError::Serve(e));
                    }
                },
            }
        }
    }

    fn spawn_connection(&self, stream: TcpStream, remote_addr: SocketAddr) {
        let token = self.inner.tracker.acquire();
        let server = self.clone();
        tokio::spawn(async move {
            server.serve_connection(stream, remote_addr).await;
            drop(token);
        });
    }

    async fn serve_connection(&self, stream: TcpStream, remote_addr: SocketAddr) {
        let config = &self.inner.server_config;

        let mut builder = http1::Builder::new();
        builder
            .timer(TokioTimer::new())
            .keep_alive(config.idle_timeout().is_some());
        if let Some(timeout) = config.read_timeout() {
            builder.header_read_timeout(timeout);
        }

        let server = self.clone();
        let service = service_fn(move |request: hyper::Request<Incoming>| {
            let server = server.clone();
            async move { Ok::<_, Infallible>(server.handle_request(request).await) }
        });

        let conn = builder.serve_connection(TokioIo::new(stream), service);
        tokio::pin!(conn);

        let shutdown = self.inner.shutdown.clone();
        let force = self.inner.force.clone();
        let result = tokio::select! {
            result = conn.as_mut() => result,
            () = shutdown.recv() => {
                conn.as_mut().graceful_shutdown();
                tokio::select! {
                    result = conn.as_mut() => result,
                    () = force.recv() => {
                        tracing::debug!(%remote_addr, "Connection closed at drain deadline");
                        Ok(())
                    }
                }
            }
        };

        if let Err(e) = result {
            if e.is_incomplete_message() {
                tracing::debug!(%remote_addr, error = %e, "Client closed connection mid-request");
            } else {
                self.inner.error_sink.connection_error(remote_addr, &e);
            }
        }
    }

    async fn handle_request(&self, request: hyper::Request<Incoming>) -> Response {
        let config = &self.inner.server_config;
        let (parts, body) = request.into_parts();

        let collected = match config.read_timeout() {
            Some(limit) => match tokio::time::timeout(limit, body.collect()).await {
                Ok(collected) => collected,
                Err(_) => {
                    tracing::warn!(method = %parts.method, path = %parts.uri.path(), "Request body read timed out");
                    return json_error(
                        StatusCode::REQUEST_TIMEOUT,
                        "REQUEST_TIMEOUT",
                        "Request body read timed out",
                    );
                }
            },
            None => body.collect().await,
        };

        let body = match collected {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                tracing::debug!(error = %e, "Failed to read request body");
                return json_error(
                    StatusCode::BAD_REQUEST,
                    "BODY_READ_ERROR",
                    "Failed to read request body",
                );
            }
        };

        let request = http::Request::from_parts(parts, body);
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        tracing::debug!(%method, %path, "Request received");

        let dispatch = self.inner.router.dispatch(request);
        let response = match config.write_timeout() {
            Some(limit) => match tokio::time::timeout(limit, dispatch).await {
                Ok(response) => response,
                Err(_) => {
                    tracing::warn!(%method, %path, "Handler execution timed out");
                    json_error(
                        StatusCode::SERVICE_UNAVAILABLE,
                        "HANDLER_TIMEOUT",
                        "Handler execution timed out",
                    )
                }
            },
            None => dispatch.await,
        };

        tracing::debug!(%method, %path, status = response.status().as_u16(), "Request completed");
        response
    }

    /// Closes idle connections, then waits for busy ones up to the drain
    /// deadline before closing them too.
    async fn drain(&self) {
        let inner = &self.inner;
        inner.shutdown.trigger();

        let active = inner.tracker.active_connections();
        if active > 0 {
            tracing::info!(
                connections = active,
                timeout = ?inner.server_config.drain_timeout(),
                "Draining connections"
            );
        }

        let drained = tokio::time::timeout(
            inner.server_config.drain_timeout(),
            inner.tracker.wait_idle(),
        )
        .await;
        if drained.is_err() {
            tracing::warn!(
                connections = inner.tracker.active_connections(),
                "Drain deadline reached, closing remaining connections"
            );
            inner.force.trigger();
        }
    }

    /// Runs shutdown hooks, then closes the database handle.
    async fn teardown(&self) {
        let hooks = self.inner.hooks.lock().snapshot(Phase::Shutdown);
        if let Err(e) = run_hooks(Phase::Shutdown, hooks, self).await {
            tracing::warn!(error = %e, "Shutdown finished with failed hooks");
        }
        if let Err(e) = self.close_db().await {
            tracing::error!(error = %e, "Failed to close database connection");
        }
    }
}

/// Accept errors that concern a single connection, not the listener.
fn is_transient(e: &std::io::Error) -> bool {
    use std::io::ErrorKind;

    matches!(
        e.kind(),
        ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionRefused
            | ErrorKind::Interrupted
            | ErrorKind::WouldBlock
            | ErrorKind::TimedOut
    )
}

/// Builder for [`Server`].
///
/// ```rust
/// use portico_server::{Server, ServerConfig};
///
/// let server = Server::builder()
///     .config(ServerConfig::builder().host("0.0.0.0").port(3000).build())
///     .build();
///
/// assert_eq!(server.host(), "0.0.0.0:3000");
/// assert_eq!(server.base_url(), "http://127.0.0.1:3000");
/// ```
#[must_use]
pub struct ServerBuilder {
    config: Config,
    server_config: ServerConfig,
    router: Router,
    database: Option<Arc<dyn Database>>,
    error_sink: ErrorSink,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("server_config", &self.server_config)
            .field("database", &self.database.as_ref().map(|db| db.name().to_string()))
            .finish_non_exhaustive()
    }
}

impl ServerBuilder {
    /// Creates a builder with default configuration and an empty router.
    pub fn new() -> Self {
        Self {
            config: Config::defaults(),
            server_config: ServerConfig::default(),
            router: Router::new(),
            database: None,
            error_sink: ErrorSink::default(),
        }
    }

    /// Creates a builder from a loaded configuration, reading the
    /// `server.*` section from it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the `server.*` values are invalid.
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let server_config = ServerConfig::from_config(&config)?;
        Ok(Self {
            config,
            server_config,
            ..Self::new()
        })
    }

    /// Overrides the server section.
    pub fn config(mut self, server_config: ServerConfig) -> Self {
        self.server_config = server_config;
        self
    }

    /// Uses `router` as the root router.
    pub fn router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    /// Attaches a database handle.
    pub fn database(mut self, db: impl Database) -> Self {
        self.database = Some(Arc::new(db));
        self
    }

    /// Overrides the transport error sink.
    pub fn error_sink(mut self, sink: ErrorSink) -> Self {
        self.error_sink = sink;
        self
    }

    /// Builds the server. Nothing is bound until [`Server::start`].
    pub fn build(self) -> Server {
        let (done, _) = watch::channel(false);
        let server_config = self.server_config;

        Server {
            inner: Arc::new(Inner {
                host: address::host(&server_config),
                base_url: address::base_url(&server_config),
                proxy_base_url: address::proxy_base_url(&server_config),
                config: self.config,
                server_config,
                router: self.router,
                state: AtomicState::new(),
                shutdown: ShutdownSignal::new(),
                force: ShutdownSignal::new(),
                tracker: ConnectionTracker::new(),
                done,
                local_addr: Mutex::new(None),
                signal_listener: Mutex::new(None),
                hooks: Mutex::new(Hooks::default()),
                services: ServiceRegistry::new(),
                db: RwLock::new(self.database),
                error_sink: self.error_sink,
            }),
        }
    }
}

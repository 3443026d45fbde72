//! Startup and shutdown hooks.
//!
//! # Execution
//!
//! - **Startup hooks** run once the listener is bound, in registration
//!   order, one after another on a single dedicated task. They are skipped
//!   entirely if the server is no longer ready when that task starts.
//! - **Shutdown hooks** run in registration order on the task that called
//!   `start`, after the accept loop exits and connections have drained,
//!   before the database handle is closed.
//!
//! A failing or panicking hook is logged and the remaining hooks still run.
//!
//! # Example
//!
//! ```rust
//! use portico_server::{LifecycleError, Server};
//!
//! let server = Server::builder().build();
//!
//! server.register_startup_hook(|server| async move {
//!     tracing::info!(url = %server.base_url(), "Warming caches");
//!     Ok(())
//! });
//!
//! server.register_shutdown_hook_named("flush_queue", |_server| async {
//!     Err(LifecycleError::new("queue backend unreachable"))
//! });
//!
//! assert_eq!(server.startup_hook_count(), 1);
//! assert_eq!(server.shutdown_hook_count(), 1);
//! ```

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use portico_core::BoxFuture;
use thiserror::Error;

use crate::Server;

/// Error type for lifecycle hook failures.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// One or more startup hooks failed.
    #[error("Startup hook failed: {0}")]
    StartupFailed(String),

    /// One or more shutdown hooks failed.
    #[error("Shutdown hook failed: {0}")]
    ShutdownFailed(String),

    /// Error returned by a hook body.
    #[error("Lifecycle hook error: {message}")]
    HookError {
        /// Error message
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl LifecycleError {
    /// Creates a hook error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self::HookError {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a hook error with a source.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::HookError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Result type for lifecycle hooks.
pub type LifecycleResult<T = ()> = Result<T, LifecycleError>;

/// A lifecycle hook callback. Receives a handle to the server.
pub type LifecycleHook = Arc<dyn Fn(Server) -> BoxFuture<'static, LifecycleResult> + Send + Sync>;

/// Which hook sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Startup,
    Shutdown,
}

impl Phase {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Shutdown => "shutdown",
        }
    }
}

#[derive(Clone)]
pub(crate) struct NamedHook {
    name: String,
    hook: LifecycleHook,
}

/// The two append-only hook sequences of a server.
#[derive(Default)]
pub(crate) struct Hooks {
    startup: Vec<NamedHook>,
    shutdown: Vec<NamedHook>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("startup_hooks", &self.startup.len())
            .field("shutdown_hooks", &self.shutdown.len())
            .finish()
    }
}

impl Hooks {
    fn list(&self, phase: Phase) -> &Vec<NamedHook> {
        match phase {
            Phase::Startup => &self.startup,
            Phase::Shutdown => &self.shutdown,
        }
    }

    fn list_mut(&mut self, phase: Phase) -> &mut Vec<NamedHook> {
        match phase {
            Phase::Startup => &mut self.startup,
            Phase::Shutdown => &mut self.shutdown,
        }
    }

    /// Appends a hook. Unnamed hooks are called `{phase}_{index}`.
    pub(crate) fn push(&mut self, phase: Phase, name: Option<String>, hook: LifecycleHook) {
        let list = self.list_mut(phase);
        let name = name.unwrap_or_else(|| format!("{}_{}", phase.as_str(), list.len()));
        list.push(NamedHook { name, hook });
    }

    pub(crate) fn clear(&mut self, phase: Phase) {
        self.list_mut(phase).clear();
    }

    pub(crate) fn count(&self, phase: Phase) -> usize {
        self.list(phase).len()
    }

    /// Copies the sequence so it can run without holding the lock.
    pub(crate) fn snapshot(&self, phase: Phase) -> Vec<NamedHook> {
        self.list(phase).clone()
    }
}

/// Runs `hooks` in order, logging each failure and panic.
///
/// Every hook runs regardless of earlier failures; the returned error
/// summarises all of them.
pub(crate) async fn run_hooks(phase: Phase, hooks: Vec<NamedHook>, server: &Server) -> LifecycleResult {
    let mut failures: Vec<String> = Vec::new();

    for NamedHook { name, hook } in hooks {
        tracing::debug!(hook = %name, phase = phase.as_str(), "Running lifecycle hook");

        let call = AssertUnwindSafe(async { hook(server.clone()).await });
        match call.catch_unwind().await {
            Ok(Ok(())) => {
                tracing::debug!(hook = %name, phase = phase.as_str(), "Lifecycle hook completed");
            }
            Ok(Err(e)) => {
                tracing::error!(hook = %name, phase = phase.as_str(), error = %e, "Lifecycle hook failed");
                failures.push(format!("{name}: {e}"));
            }
            Err(panic) => {
                let message = portico_router::panic_message(panic.as_ref());
                tracing::error!(hook = %name, phase = phase.as_str(), panic = %message, "Lifecycle hook panicked");
                failures.push(format!("{name}: panicked: {message}"));
            }
        }
    }

    if failures.is_empty() {
        return Ok(());
    }
    let summary = failures.join("; ");
    Err(match phase {
        Phase::Startup => LifecycleError::StartupFailed(summary),
        Phase::Shutdown => LifecycleError::ShutdownFailed(summary),
    })
}

/// Boxes a hook closure.
pub(crate) fn boxed<F, Fut>(hook: F) -> LifecycleHook
where
    F: Fn(Server) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = LifecycleResult> + Send + 'static,
{
    Arc::new(move |server| Box::pin(hook(server)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recorder(order: &Arc<Mutex<Vec<u8>>>, n: u8) -> LifecycleHook {
        let order = Arc::clone(order);
        boxed(move |_| {
            let order = Arc::clone(&order);
            async move {
                order.lock().push(n);
                Ok(())
            }
        })
    }

    #[tokio::test]
    async fn test_empty_sequence() {
        let server = Server::builder().build();
        let hooks = Hooks::default();
        assert!(run_hooks(Phase::Startup, hooks.snapshot(Phase::Startup), &server)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_registration_order() {
        let server = Server::builder().build();
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut hooks = Hooks::default();
        for n in 1..=3 {
            hooks.push(Phase::Shutdown, None, recorder(&order, n));
        }

        run_hooks(Phase::Shutdown, hooks.snapshot(Phase::Shutdown), &server)
            .await
            .unwrap();
        assert_eq!(*order.lock(), [1, 2, 3]);
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_later_hooks() {
        let server = Server::builder().build();
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut hooks = Hooks::default();
        hooks.push(Phase::Startup, None, recorder(&order, 1));
        hooks.push(
            Phase::Startup,
            Some("broken".to_string()),
            boxed(|_| async { Err(LifecycleError::new("boom")) }),
        );
        hooks.push(
            Phase::Startup,
            Some("panicky".to_string()),
            boxed(|_| async {
                if true {
                    panic!("hook exploded");
                }
                Ok(())
            }),
        );
        hooks.push(Phase::Startup, None, recorder(&order, 4));

        let err = run_hooks(Phase::Startup, hooks.snapshot(Phase::Startup), &server)
            .await
            .unwrap_err();

        assert_eq!(*order.lock(), [1, 4]);
        let message = err.to_string();
        assert!(message.contains("broken: Lifecycle hook error: boom"));
        assert!(message.contains("panicky: panicked: hook exploded"));
        assert!(matches!(err, LifecycleError::StartupFailed(_)));
    }

    #[test]
    fn test_default_names_and_clear() {
        let mut hooks = Hooks::default();
        hooks.push(Phase::Startup, None, boxed(|_| async { Ok(()) }));
        hooks.push(Phase::Startup, Some("warmup".into()), boxed(|_| async { Ok(()) }));

        let names: Vec<_> = hooks
            .snapshot(Phase::Startup)
            .into_iter()
            .map(|h| h.name)
            .collect();
        assert_eq!(names, ["startup_0", "warmup"]);
        assert_eq!(hooks.count(Phase::Shutdown), 0);

        hooks.clear(Phase::Startup);
        assert_eq!(hooks.count(Phase::Startup), 0);
        assert!(format!("{hooks:?}").contains("startup_hooks"));
    }

    #[test]
    fn test_error_with_source() {
        let io = std::io::Error::from(std::io::ErrorKind::NotFound);
        let err = LifecycleError::with_source("cache dir missing", io);
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("cache dir missing"));
    }
}

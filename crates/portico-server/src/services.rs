//! Name-keyed service registry.
//!
//! Services are pluggable subsystems (mailers, caches, repositories)
//! registered on the server before it starts and looked up by name from
//! hooks and handlers. Registering twice under one name replaces the
//! earlier entry.
//!
//! # Example
//!
//! ```rust
//! use portico_server::{Server, Service};
//!
//! struct Mailer {
//!     sender: String,
//! }
//!
//! impl Service for Mailer {
//!     fn name(&self) -> &str {
//!         "mailer"
//!     }
//! }
//!
//! let server = Server::builder().build();
//! server.register_service(Mailer { sender: "noreply@example.com".into() });
//!
//! let mailer = server.service::<Mailer>("mailer").unwrap();
//! assert_eq!(mailer.sender, "noreply@example.com");
//! assert!(server.lookup_service::<Mailer>("sms").is_none());
//! ```

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use portico_core::HandlerError;
use thiserror::Error;

use crate::Server;

/// A pluggable subsystem registered on a [`Server`].
pub trait Service: Any + Send + Sync {
    /// Unique name the service is registered under.
    fn name(&self) -> &str;

    /// Called once, on registration.
    fn init(&self, _server: &Server) {}
}

/// Error when a service cannot be resolved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// No service is registered under the name.
    #[error("service \"{0}\" does not exist")]
    Missing(String),

    /// A service exists under the name but has another type.
    #[error("service \"{name}\" is not a {expected}")]
    TypeMismatch {
        /// Registered name.
        name: String,
        /// The requested type.
        expected: &'static str,
    },
}

impl From<ServiceError> for HandlerError {
    fn from(err: ServiceError) -> Self {
        HandlerError::internal_with_source("service unavailable", err)
    }
}

/// Services keyed by name.
#[derive(Default)]
pub struct ServiceRegistry {
    services: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl ServiceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `service` under `name`, replacing any previous entry.
    pub fn register<T: Send + Sync + 'static>(&self, name: impl Into<String>, service: Arc<T>) {
        let name = name.into();
        if self.services.write().insert(name.clone(), service).is_some() {
            tracing::debug!(service = %name, "Service replaced");
        }
    }

    /// The service under `name`, if it exists and is a `T`.
    #[must_use]
    pub fn lookup<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        self.get(name).ok()
    }

    /// The service under `name`.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Missing`] if nothing is registered under `name`,
    /// [`ServiceError::TypeMismatch`] if the entry is not a `T`. Handlers can
    /// propagate either with `?` to abort the request with a `500`.
    pub fn get<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, ServiceError> {
        let entry = self
            .services
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ServiceError::Missing(name.to_string()))?;

        entry.downcast::<T>().map_err(|_| ServiceError::TypeMismatch {
            name: name.to_string(),
            expected: type_name::<T>(),
        })
    }

    /// Whether anything is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.services.read().contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.services.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.read().len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.read().is_empty()
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.names())
            .finish()
    }
}

//! Database handle interface.
//!
//! The server owns at most one [`Database`] handle. It is attached with
//! [`ServerBuilder::database`](crate::ServerBuilder::database) or
//! [`Server::replace_db`](crate::Server::replace_db), handed out through
//! [`Server::db`](crate::Server::db), and closed by the lifecycle after the
//! shutdown hooks have run.

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by a database backend.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// The handle was already closed.
    #[error("database connection is closed")]
    Closed,

    /// Backend-specific failure.
    #[error("database error: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
        /// The driver error, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl DatabaseError {
    /// Creates a backend error with a message.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a backend error wrapping a driver error.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Backend {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Result type for database operations.
pub type DatabaseResult<T = ()> = Result<T, DatabaseError>;

/// An open database connection or pool.
#[async_trait]
pub trait Database: Send + Sync + 'static {
    /// Driver name, used in logs.
    fn name(&self) -> &str;

    /// Releases the connection.
    async fn close(&self) -> DatabaseResult;

    /// Opens a transaction.
    async fn begin(&self) -> DatabaseResult<Box<dyn Transaction>>;
}

/// A transaction opened by [`Database::begin`].
#[async_trait]
pub trait Transaction: Send {
    /// Commits the transaction.
    async fn commit(self: Box<Self>) -> DatabaseResult;

    /// Rolls the transaction back.
    async fn rollback(self: Box<Self>) -> DatabaseResult;
}

//! Server error types.

use thiserror::Error;

use crate::database::DatabaseError;

/// Errors returned to the caller of the server API.
///
/// Only configuration, bind and state-misuse failures are returned here.
/// Hook failures and teardown errors are logged instead.
#[derive(Error, Debug)]
pub enum ServerError {
    /// `start` was called while the server is preparing or ready.
    #[error("server is already running")]
    AlreadyRunning,

    /// `start` was called on a server that has stopped. Servers are single-use.
    #[error("cannot restart a stopped server")]
    AlreadyStopped,

    /// The configured bind address does not resolve.
    #[error("invalid bind address '{addr}': {reason}")]
    InvalidAddress {
        /// The configured `host:port`.
        addr: String,
        /// Why it could not be used.
        reason: String,
    },

    /// The listener could not be bound.
    #[error("failed to bind to {addr}")]
    Bind {
        /// The address bind was attempted on.
        addr: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The accept loop failed with a non-recoverable error.
    #[error("server stopped abnormally")]
    Serve(#[source] std::io::Error),

    /// The OS signal listener could not be installed.
    #[error("failed to install signal handler")]
    Signal(#[source] std::io::Error),

    /// No database handle is attached to the server.
    #[error("no database connection. Database is set to \"none\" in the config")]
    NoDatabase,

    /// A database operation failed.
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Result type for server operations.
pub type ServerResult<T = ()> = Result<T, ServerError>;

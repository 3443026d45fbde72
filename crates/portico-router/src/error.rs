//! Router error types.

use thiserror::Error;

/// Errors raised when building URLs from routes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// No route carries the requested name.
    #[error("no route named '{0}'")]
    UnknownRoute(String),

    /// A `{param}` in the pattern was not supplied.
    #[error("route '{route}' requires parameter '{param}'")]
    MissingParameter {
        /// Pattern of the route.
        route: String,
        /// Missing parameter name.
        param: String,
    },
}

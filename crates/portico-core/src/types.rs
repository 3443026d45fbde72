//! Common HTTP types used by the router, gate and server.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use http_body_util::Full;

/// Body type of every response produced by Portico.
pub type ResponseBody = Full<Bytes>;

/// An inbound request whose body has already been collected.
pub type Request = http::Request<Bytes>;

/// An outbound response.
pub type Response = http::Response<ResponseBody>;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

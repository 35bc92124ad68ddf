//! Per-connection driver.
//!
//! [`HttpConnection`] reads requests off a socket, hands each one to a
//! [`RequestHandler`](crate::handler::RequestHandler) as an
//! [`HttpRequest`](crate::protocol::HttpRequest) envelope, feeds the request body into that
//! envelope and writes the reply back. Connections are kept alive unless the client asks
//! otherwise.

mod http_connection;

pub use http_connection::{HttpConnection, ResponseHook};

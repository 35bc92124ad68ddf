//! Async message envelopes over a small HTTP/1.1 transport
//!
//! This crate is the transport half of a micro service stack. It carries requests and
//! responses as envelopes: headers, a body fed in chunk by chunk, completion handlers and a
//! reply slot, all safe to touch from any task. On top of that sit a growable byte buffer and
//! an asynchronous file pipeline used to stream files in and out of envelopes.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use http::StatusCode;
//! use micro_envelope::connection::HttpConnection;
//! use micro_envelope::envelope::Message;
//! use micro_envelope::protocol::{HttpRequest, HttpResponse};
//! use tokio::net::TcpListener;
//! use tracing::{error, info, warn};
//!
//! #[tokio::main]
//! async fn main() {
//!     let tcp_listener = match TcpListener::bind("127.0.0.1:8080").await {
//!         Ok(tcp_listener) => tcp_listener,
//!         Err(e) => {
//!             error!(cause = %e, "bind server error");
//!             return;
//!         }
//!     };
//!
//!     let handler = Arc::new(|request: HttpRequest| {
//!         let body = "Hello World!\r\n";
//!         let response = HttpResponse::new(StatusCode::OK);
//!         response.content_length(body.len() as u64);
//!         request.reply(response.clone());
//!         drop(response.write(body));
//!         response.complete();
//!     });
//!
//!     loop {
//!         let (tcp_stream, _remote_addr) = match tcp_listener.accept().await {
//!             Ok(stream_and_addr) => stream_and_addr,
//!             Err(e) => {
//!                 warn!(cause = %e, "failed to accept");
//!                 continue;
//!             }
//!         };
//!
//!         let handler = Arc::clone(&handler);
//!         tokio::spawn(async move {
//!             let (reader, writer) = tcp_stream.into_split();
//!             match HttpConnection::new(reader, writer).process(handler).await {
//!                 Ok(()) => info!("finished process, connection shutdown"),
//!                 Err(e) => error!("service has error, cause {}, connection shutdown", e),
//!             }
//!         });
//!     }
//! }
//! ```
//!
//! # Architecture
//!
//! - [`buffer`]: a growable byte buffer with a read cursor, bounded by [`buffer::BufferLimits`]
//! - [`envelope`]: the [`envelope::Envelope`] and the [`envelope::Message`] trait built on it
//! - [`file`]: chunked asynchronous file reads and writes with ordered completion
//! - [`protocol`]: [`protocol::HttpRequest`] / [`protocol::HttpResponse`] and the wire types
//! - [`codec`]: HTTP/1.1 decoding and encoding
//! - [`connection`]: drives one client connection
//! - [`handler`]: the [`handler::RequestHandler`] seam
//!
//! # Limitations
//!
//! - HTTP/1.1 only, without TLS
//! - Chunked request bodies are rejected with `501 Not Implemented`
//! - Maximum header size: 8KB
//! - Maximum number of headers: 64

pub mod buffer;
pub mod codec;
pub mod connection;
pub mod envelope;
pub mod file;
pub mod handler;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;

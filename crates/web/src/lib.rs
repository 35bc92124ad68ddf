//! Routing and server bootstrap for `micro-envelope`.
//!
//! - [`router`]: URI templates (`/{bucket}/{key}**`) compiled to anchored regular
//!   expressions, dispatched first-match-wins
//! - [`negotiate`]: `Accept` parsing and content type selection
//! - [`Server`]: binds an address and serves every connection through a [`Router`]
//!
//! ```no_run
//! use micro_envelope::envelope::Message;
//! use micro_envelope::protocol::{HttpRequest, HttpResponse};
//! use micro_route::Server;
//!
//! fn hello(request: HttpRequest) {
//!     let name = request.path_param("name").unwrap_or_default();
//!     let body = format!("hello {name}\n");
//!     let response = HttpResponse::ok();
//!     response.content_type("text/plain").content_length(body.len() as u64);
//!     request.reply(response.clone());
//!     drop(response.write(body));
//!     response.complete();
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = Server::builder().address("127.0.0.1:8080").route("/hello/{name}", hello).build().unwrap();
//!     server.start().await;
//! }
//! ```

mod date;
mod server;

pub mod negotiate;
pub mod router;

pub use date::DateService;
pub use router::Router;
pub use server::{Server, ServerBuildError, ServerBuilder};

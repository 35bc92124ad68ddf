//! Payload framing.
//!
//! Request bodies are only accepted with a `Content-Length`; responses go out either
//! `Content-Length` framed or with chunked transfer encoding.

mod chunked_encoder;
mod length_decoder;
mod length_encoder;
mod payload_decoder;
mod payload_encoder;

pub use payload_decoder::PayloadDecoder;
pub use payload_encoder::PayloadEncoder;

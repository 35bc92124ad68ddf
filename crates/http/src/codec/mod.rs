//! Wire codec for HTTP/1.x.
//!
//! [`RequestDecoder`] turns bytes into a [`Frame::Header`](crate::protocol::Frame) followed by
//! payload frames; [`ResponseEncoder`] does the reverse for responses. Both plug into
//! `tokio_util::codec::{FramedRead, FramedWrite}`.
//!
//! ```no_run
//! use bytes::BytesMut;
//! use micro_envelope::codec::RequestDecoder;
//! use tokio_util::codec::Decoder;
//!
//! let mut decoder = RequestDecoder::new();
//! let mut buffer = BytesMut::from("GET / HTTP/1.1\r\n\r\n");
//! let frame = decoder.decode(&mut buffer);
//! ```

mod body;
mod header;
mod request_decoder;
mod response_encoder;

pub use request_decoder::RequestDecoder;
pub use response_encoder::ResponseEncoder;

//! HTTP message types.
//!
//! - [`Frame`], [`PayloadItem`] and [`PayloadSize`]: what the codec produces and consumes
//! - [`RequestHeader`] / [`ResponseHead`]: wire-level heads
//! - [`HttpRequest`] / [`HttpResponse`]: envelope-backed messages handlers work with
//! - [`HttpError`], [`ParseError`], [`SendError`]: connection failures

mod frame;
pub use frame::Frame;
pub use frame::PayloadItem;
pub use frame::PayloadSize;

mod request;
pub use request::HttpRequest;
pub use request::RequestHeader;

mod response;
pub use response::HttpResponse;
pub use response::ResponseHead;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;

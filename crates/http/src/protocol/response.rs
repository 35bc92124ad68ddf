//! Response types: the encoder's head and the envelope-backed [`HttpResponse`].

use std::fmt;
use std::sync::Arc;

use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderName, HeaderValue, Response, StatusCode, Version};
use tracing::warn;

use crate::envelope::{Envelope, Message};

/// Head of a response as handed to the encoder.
pub type ResponseHead = Response<()>;

/// An outbound HTTP response carried in an [`Envelope`].
///
/// Handlers create one, set headers, pass it to [`Message::reply`] on the request and then
/// write the body through it. Writes issued before the transport picks the response up are
/// queued and flushed in order.
#[derive(Clone)]
pub struct HttpResponse {
    inner: Arc<ResponseInner>,
}

struct ResponseInner {
    status: StatusCode,
    envelope: Envelope<()>,
}

impl HttpResponse {
    pub fn new(status: StatusCode) -> Self {
        Self { inner: Arc::new(ResponseInner { status, envelope: Envelope::new() }) }
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    /// `204 No Content` with a zero length body.
    pub fn no_content() -> Self {
        let response = Self::new(StatusCode::NO_CONTENT);
        response.content_length(0);
        response
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND)
    }

    pub fn error() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn status(&self) -> StatusCode {
        self.inner.status
    }

    /// Declares the body length; the body is then sent without chunked framing.
    pub fn content_length(&self, length: u64) -> &Self {
        self.header(CONTENT_LENGTH.as_str(), length.to_string())
    }

    pub fn content_type(&self, content_type: impl Into<String>) -> &Self {
        self.header(CONTENT_TYPE.as_str(), content_type)
    }

    pub fn declared_length(&self) -> Option<u64> {
        self.header_value(CONTENT_LENGTH.as_str()).and_then(|value| value.trim().parse().ok())
    }

    /// Builds the wire head from the status and the current headers. Headers that are not
    /// valid HTTP are skipped.
    pub fn to_head(&self) -> ResponseHead {
        let mut head = Response::new(());
        *head.status_mut() = self.inner.status;
        *head.version_mut() = Version::HTTP_11;

        for (name, value) in self.envelope().headers().iter() {
            match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => {
                    head.headers_mut().append(name, value);
                }
                _ => warn!(header = name, "skipping invalid response header"),
            }
        }
        head
    }
}

impl Message for HttpResponse {
    type Reply = ();

    fn envelope(&self) -> &Envelope<()> {
        &self.inner.envelope
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse").field("status", &self.inner.status).field("envelope", &self.inner.envelope).finish()
    }
}

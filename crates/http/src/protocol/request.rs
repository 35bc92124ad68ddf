//! Request types: the decoded head and the envelope-backed [`HttpRequest`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use http::{HeaderMap, Method, Request, Uri, Version};
use parking_lot::RwLock;
use tracing::debug;

use crate::envelope::{Envelope, Headers, Message};
use crate::protocol::HttpResponse;

/// A request head as produced by the decoder, before it is turned into an [`HttpRequest`].
#[derive(Debug)]
pub struct RequestHeader {
    inner: Request<()>,
}

impl RequestHeader {
    pub fn into_inner(self) -> Request<()> {
        self.inner
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Whether a request with this method may carry a body.
    pub fn need_body(&self) -> bool {
        !matches!(self.method(), &Method::GET | &Method::HEAD | &Method::DELETE | &Method::OPTIONS | &Method::CONNECT)
    }
}

impl From<Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}

/// An inbound HTTP request carried in an [`Envelope`] whose reply is an [`HttpResponse`].
///
/// The handle is cheap to clone; all clones share headers, body delivery and the reply slot.
#[derive(Clone)]
pub struct HttpRequest {
    inner: Arc<RequestInner>,
}

struct RequestInner {
    method: Method,
    uri: Uri,
    version: Version,
    path_params: RwLock<HashMap<String, String>>,
    envelope: Envelope<HttpResponse>,
}

impl HttpRequest {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self::from_parts(method, uri, Version::HTTP_11, Headers::new())
    }

    pub fn from_parts(method: Method, uri: Uri, version: Version, headers: Headers) -> Self {
        Self {
            inner: Arc::new(RequestInner {
                method,
                uri,
                version,
                path_params: RwLock::new(HashMap::new()),
                envelope: Envelope::with_headers(headers),
            }),
        }
    }

    pub fn method(&self) -> &Method {
        &self.inner.method
    }

    pub fn uri(&self) -> &Uri {
        &self.inner.uri
    }

    pub fn path(&self) -> &str {
        self.inner.uri.path()
    }

    pub fn version(&self) -> Version {
        self.inner.version
    }

    /// Decoded query string pairs, in order. Empty when there is no query or it can't be decoded.
    pub fn query_params(&self) -> Vec<(String, String)> {
        let Some(query) = self.inner.uri.query() else {
            return Vec::new();
        };
        serde_urlencoded::from_str(query).unwrap_or_else(|e| {
            debug!(query, cause = %e, "can't decode query string");
            Vec::new()
        })
    }

    /// First value of query parameter `name`.
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.query_params().into_iter().find_map(|(key, value)| (key == name).then_some(value))
    }

    /// Variables captured from the path by the route that dispatched this request.
    pub fn path_params(&self) -> HashMap<String, String> {
        self.inner.path_params.read().clone()
    }

    pub fn path_param(&self, name: &str) -> Option<String> {
        self.inner.path_params.read().get(name).cloned()
    }

    pub fn set_path_params(&self, params: HashMap<String, String>) {
        *self.inner.path_params.write() = params;
    }

    /// The declared `Content-Length`, if present and numeric.
    pub fn content_length(&self) -> Option<u64> {
        self.header_value(http::header::CONTENT_LENGTH.as_str()).and_then(|value| value.trim().parse().ok())
    }

    /// Whether the client asked for `100 Continue` before sending the body.
    pub fn expects_continue(&self) -> bool {
        self.header_values(http::header::EXPECT.as_str()).iter().any(|value| value.eq_ignore_ascii_case("100-continue"))
    }

    /// Whether the connection should stay open after this exchange.
    pub fn keep_alive(&self) -> bool {
        let connection = self.header_values(http::header::CONNECTION.as_str());
        let has = |token: &str| connection.iter().any(|value| value.eq_ignore_ascii_case(token));
        match self.inner.version {
            Version::HTTP_10 => has("keep-alive"),
            _ => !has("close"),
        }
    }
}

impl Message for HttpRequest {
    type Reply = HttpResponse;

    fn envelope(&self) -> &Envelope<HttpResponse> {
        &self.inner.envelope
    }
}

impl From<RequestHeader> for HttpRequest {
    fn from(header: RequestHeader) -> Self {
        let (parts, ()) = header.into_inner().into_parts();
        let mut headers = Headers::new();
        for (name, value) in &parts.headers {
            headers.append(name.as_str(), String::from_utf8_lossy(value.as_bytes()));
        }
        Self::from_parts(parts.method, parts.uri, parts.version, headers)
    }
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.inner.method)
            .field("uri", &self.inner.uri)
            .field("version", &self.inner.version)
            .field("envelope", &self.inner.envelope)
            .finish()
    }
}

//! The seam between a connection and application code.

use crate::protocol::HttpRequest;

/// Receives every request a connection decodes.
///
/// `handle` is called as soon as the request head is parsed, before the body arrives, and
/// must not block: the body is delivered to the request afterwards. The handler answers by
/// calling [`Message::reply`](crate::envelope::Message::reply) on the request, now or later
/// from another task.
pub trait RequestHandler: Send + Sync {
    fn handle(&self, request: HttpRequest);
}

impl<F> RequestHandler for F
where
    F: Fn(HttpRequest) + Send + Sync,
{
    #[inline]
    fn handle(&self, request: HttpRequest) {
        (self)(request);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use http::Method;

    use super::*;

    #[test]
    fn closures_are_handlers() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let handler: Arc<dyn RequestHandler> = Arc::new(move |request: HttpRequest| {
            assert_eq!(request.path(), "/ping");
            counter.fetch_add(1, Ordering::SeqCst);
        });

        handler.handle(HttpRequest::new(Method::GET, "/ping".parse().unwrap()));
        handler.handle(HttpRequest::new(Method::GET, "/ping".parse().unwrap()));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::channel::mpsc::UnboundedReceiver;
use futures::{Stream, StreamExt};
use http_body::{Body, Frame};

/// Inbound bytes of an envelope as an async stream.
///
/// Produced by [`Envelope::subscribe`](super::Envelope::subscribe). Every chunk delivered to the
/// envelope after subscription shows up here, and the stream ends once the envelope completes.
/// It also implements [`http_body::Body`], so `http_body_util::BodyExt::collect` works on it.
#[derive(Debug)]
pub struct InboundBody {
    receiver: UnboundedReceiver<Bytes>,
}

impl InboundBody {
    pub(crate) fn new(receiver: UnboundedReceiver<Bytes>) -> Self {
        Self { receiver }
    }
}

impl Stream for InboundBody {
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_next_unpin(cx)
    }
}

impl Body for InboundBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        self.receiver.poll_next_unpin(cx).map(|chunk| chunk.map(|bytes| Ok(Frame::data(bytes))))
    }
}

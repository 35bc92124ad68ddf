use bytes::Bytes;

use super::{Envelope, EnvelopeError, InboundBody, Payload};

/// Capability set shared by every message kind carried in an [`Envelope`].
///
/// Implementors only point at their envelope; all operations are provided and delegate to it,
/// so a request and a response expose the same surface while keeping their own fields.
pub trait Message {
    /// What a reply to this message looks like.
    type Reply: Clone;

    fn envelope(&self) -> &Envelope<Self::Reply>;

    fn header(&self, name: impl Into<String>, value: impl Into<String>) -> &Self
    where
        Self: Sized,
    {
        self.envelope().header(name, value);
        self
    }

    fn append_header(&self, name: impl Into<String>, value: impl AsRef<str>) -> &Self
    where
        Self: Sized,
    {
        self.envelope().append_header(name, value);
        self
    }

    fn header_value(&self, name: &str) -> Option<String> {
        self.envelope().header_value(name)
    }

    fn header_values(&self, name: &str) -> Vec<String> {
        self.envelope().header_values(name)
    }

    fn write(&self, payload: impl Into<Payload>) -> Result<(), EnvelopeError>
    where
        Self: Sized,
    {
        self.envelope().write(payload)
    }

    fn write_with<F>(&self, payload: impl Into<Payload>, on_complete: F) -> Result<(), EnvelopeError>
    where
        Self: Sized,
        F: FnOnce() + Send + 'static,
    {
        self.envelope().write_with(payload, on_complete)
    }

    fn complete(&self) {
        self.envelope().complete();
    }

    fn is_completed(&self) -> bool {
        self.envelope().is_completed()
    }

    fn on_complete<F>(&self, handler: F) -> &Self
    where
        Self: Sized,
        F: FnOnce() + Send + 'static,
    {
        self.envelope().on_complete(handler);
        self
    }

    fn reply(&self, reply: Self::Reply) {
        self.envelope().reply(reply);
    }

    fn reply_handler<F>(&self, listener: F) -> &Self
    where
        Self: Sized,
        F: Fn(Self::Reply) + Send + Sync + 'static,
    {
        self.envelope().reply_handler(listener);
        self
    }

    fn read_handler<F>(&self, handler: F) -> &Self
    where
        Self: Sized,
        F: Fn(Bytes) + Send + Sync + 'static,
    {
        self.envelope().read_handler(handler);
        self
    }

    fn subscribe(&self) -> InboundBody {
        self.envelope().subscribe()
    }
}

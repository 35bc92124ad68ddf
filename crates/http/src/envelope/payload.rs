use std::fmt;
use std::path::PathBuf;

use bytes::Bytes;

use crate::buffer::Buffer;

/// Callback fired once a payload item has been handed to the wire.
pub type WriteCallback = Box<dyn FnOnce() + Send>;

/// An item written through an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// In-memory bytes, written as they are.
    Data(Bytes),
    /// A file streamed from disk by the transport.
    File(PathBuf),
}

impl Payload {
    pub fn is_file(&self) -> bool {
        matches!(self, Payload::File(_))
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Payload::Data(bytes) => Some(bytes),
            Payload::File(_) => None,
        }
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Payload::Data(bytes)
    }
}

impl From<Buffer> for Payload {
    fn from(buffer: Buffer) -> Self {
        Payload::Data(buffer.freeze())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::Data(Bytes::from(s))
    }
}

impl From<&'static str> for Payload {
    fn from(s: &'static str) -> Self {
        Payload::Data(Bytes::from_static(s.as_bytes()))
    }
}

impl From<Vec<u8>> for Payload {
    fn from(v: Vec<u8>) -> Self {
        Payload::Data(Bytes::from(v))
    }
}

impl From<PathBuf> for Payload {
    fn from(path: PathBuf) -> Self {
        Payload::File(path)
    }
}

/// Transport-side receiver of envelope writes.
///
/// Once attached to an envelope the sink gets every payload in write order, each with the
/// callback supplied by the writer.
pub trait WriteSink: Send + Sync {
    fn write(&self, payload: Payload, on_complete: Option<WriteCallback>);
}

impl<F> WriteSink for F
where
    F: Fn(Payload, Option<WriteCallback>) + Send + Sync,
{
    fn write(&self, payload: Payload, on_complete: Option<WriteCallback>) {
        (self)(payload, on_complete);
    }
}

pub(crate) struct Queued {
    pub(crate) payload: Payload,
    pub(crate) on_complete: Option<WriteCallback>,
}

impl fmt::Debug for Queued {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queued").field("payload", &self.payload).field("has_callback", &self.on_complete.is_some()).finish()
    }
}

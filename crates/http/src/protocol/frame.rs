use bytes::{Buf, Bytes};

/// One unit flowing through the codec: a message head or a piece of its payload.
///
/// `T` is the head type (request or response head); `Data` is the payload chunk type.
#[derive(Debug)]
pub enum Frame<T, Data: Buf = Bytes> {
    Header(T),
    Payload(PayloadItem<Data>),
}

/// A payload chunk or the end-of-payload marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem<Data: Buf = Bytes> {
    Chunk(Data),
    Eof,
}

/// How the payload following a head is framed on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PayloadSize {
    /// `Content-Length` framed
    Length(u64),
    /// `Transfer-Encoding: chunked`
    Chunked,
    /// no payload at all
    Empty,
}

impl PayloadSize {
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, PayloadSize::Empty)
    }
}

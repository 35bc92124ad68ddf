use crate::codec::body::length_decoder::LengthDecoder;
use crate::protocol::{ParseError, PayloadItem, PayloadSize};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// Request payload decoder, chosen from the request head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadDecoder {
    kind: Kind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    Length(LengthDecoder),
    NoBody,
}

impl PayloadDecoder {
    pub fn empty() -> Self {
        Self { kind: Kind::NoBody }
    }

    pub fn fix_length(size: u64) -> Self {
        Self { kind: Kind::Length(LengthDecoder::new(size)) }
    }
}

impl Decoder for PayloadDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match &mut self.kind {
            Kind::Length(decoder) => decoder.decode(src),
            Kind::NoBody => Ok(Some(PayloadItem::Eof)),
        }
    }
}

impl TryFrom<PayloadSize> for PayloadDecoder {
    type Error = ParseError;

    fn try_from(size: PayloadSize) -> Result<Self, Self::Error> {
        match size {
            PayloadSize::Length(n) => Ok(PayloadDecoder::fix_length(n)),
            PayloadSize::Empty => Ok(PayloadDecoder::empty()),
            PayloadSize::Chunked => Err(ParseError::unsupported_transfer_encoding("chunked")),
        }
    }
}

use crate::codec::body::PayloadDecoder;
use crate::codec::header::HeaderDecoder;
use crate::protocol::{Frame, ParseError, PayloadItem, PayloadSize, RequestHeader};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// Decodes a request head, then its payload, then the next request.
///
/// While `payload_decoder` is `None` the decoder is looking for a head.
#[derive(Debug)]
pub struct RequestDecoder {
    header_decoder: HeaderDecoder,
    payload_decoder: Option<PayloadDecoder>,
}

impl RequestDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for RequestDecoder {
    fn default() -> Self {
        Self { header_decoder: HeaderDecoder, payload_decoder: None }
    }
}

impl Decoder for RequestDecoder {
    type Item = Frame<(RequestHeader, PayloadSize)>;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let frame = match payload_decoder.decode(src)? {
                Some(item @ PayloadItem::Chunk(_)) => Some(Frame::Payload(item)),
                Some(item @ PayloadItem::Eof) => {
                    self.payload_decoder.take();
                    Some(Frame::Payload(item))
                }
                None => None,
            };

            return Ok(frame);
        }

        let frame = match self.header_decoder.decode(src)? {
            Some((header, payload_size)) => {
                self.payload_decoder = Some(PayloadDecoder::try_from(payload_size)?);
                Some(Frame::Header((header, payload_size)))
            }
            None => None,
        };

        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use indoc::indoc;

    #[test]
    fn head_body_then_next_request() {
        let raw = indoc! {r##"
        PUT /photos/a.jpg HTTP/1.1
        Content-Length: 5

        hello"##};
        let mut buf = BytesMut::from(raw);
        buf.extend_from_slice(b"GET /next HTTP/1.1\r\n\r\n");

        let mut decoder = RequestDecoder::new();

        let Some(Frame::Header((header, size))) = decoder.decode(&mut buf).unwrap() else {
            panic!("expected a head");
        };
        assert_eq!(header.uri().path(), "/photos/a.jpg");
        assert_eq!(size, PayloadSize::Length(5));

        let Some(Frame::Payload(chunk)) = decoder.decode(&mut buf).unwrap() else {
            panic!("expected a body chunk");
        };
        assert_eq!(chunk, PayloadItem::Chunk(Bytes::from_static(b"hello")));
        assert!(matches!(decoder.decode(&mut buf).unwrap(), Some(Frame::Payload(PayloadItem::Eof))));

        let Some(Frame::Header((next, size))) = decoder.decode(&mut buf).unwrap() else {
            panic!("expected the next head");
        };
        assert_eq!(next.uri().path(), "/next");
        assert!(size.is_empty());
    }

    #[test]
    fn bodyless_request_still_ends_with_eof() {
        let mut buf = BytesMut::from("GET / HTTP/1.1\r\n\r\n");
        let mut decoder = RequestDecoder::new();

        assert!(matches!(decoder.decode(&mut buf).unwrap(), Some(Frame::Header(_))));
        assert!(matches!(decoder.decode(&mut buf).unwrap(), Some(Frame::Payload(PayloadItem::Eof))));
        assert!(decoder.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn chunked_request_body_is_unsupported() {
        let mut buf = BytesMut::from("POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n");
        let result = RequestDecoder::new().decode(&mut buf);
        assert!(matches!(result, Err(ParseError::UnsupportedTransferEncoding { .. })));
    }
}

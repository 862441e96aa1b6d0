//! Decoder for chunked transfer encoding (RFC 7230 §4.1).
//!
//! Each chunk is a hexadecimal size line (extensions after a space or `;`
//! are tolerated and ignored), CRLF, that many payload bytes, CRLF. A
//! zero-size chunk ends the body; trailer fields before the final CRLF are
//! read and discarded. A blank line where a chunk header is expected parses
//! as size zero, since the size accumulator starts at zero.

use std::cmp;

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::protocol::{ParseError, PayloadItem};

use ChunkedState::*;

/// State machine for decoding a chunked body out of a byte buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: ChunkedState,
    remaining: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    /// Reading hex digits of the size line.
    Size,
    /// Skipping a chunk extension up to CRLF.
    Extension,
    /// Expecting the LF that closes the size line.
    SizeLf,
    /// Reading chunk payload bytes.
    Data,
    /// Expecting the CR after the payload.
    DataCr,
    /// Expecting the LF after the payload.
    DataLf,
    /// Discarding a trailer field.
    Trailer,
    /// Expecting the LF that closes a trailer field.
    TrailerLf,
    /// Expecting the CR of the terminating CRLF.
    EndCr,
    /// Expecting the LF of the terminating CRLF.
    EndLf,
    /// Terminator consumed.
    Done,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { state: Size, remaining: 0 }
    }

    fn step(&mut self, byte: u8) -> Result<ChunkedState, ParseError> {
        let next = match (self.state, byte) {
            (Size, b'0'..=b'9') => self.push_size_digit(byte - b'0')?,
            (Size, b'a'..=b'f') => self.push_size_digit(byte - b'a' + 10)?,
            (Size, b'A'..=b'F') => self.push_size_digit(byte - b'A' + 10)?,
            (Size, b' ' | b'\t' | b';') => Extension,
            (Size, b'\r') => SizeLf,
            (Size, _) => return Err(ParseError::invalid_chunk("invalid character in chunk size")),

            // extensions end at CRLF; a bare LF inside one is rejected
            (Extension, b'\r') => SizeLf,
            (Extension, b'\n') => return Err(ParseError::invalid_chunk("chunk extension contains bare newline")),
            (Extension, _) => Extension,

            (SizeLf, b'\n') => {
                if self.remaining == 0 {
                    EndCr
                } else {
                    Data
                }
            }
            (SizeLf, _) => return Err(ParseError::invalid_chunk("chunk size line not closed by LF")),

            (DataCr, b'\r') => DataLf,
            (DataCr, _) => return Err(ParseError::invalid_chunk("chunk data not followed by CR")),
            (DataLf, b'\n') => {
                self.remaining = 0;
                Size
            }
            (DataLf, _) => return Err(ParseError::invalid_chunk("chunk data not followed by LF")),

            (EndCr, b'\r') => EndLf,
            // anything else here is a trailer field, read and discarded
            (EndCr, _) => Trailer,
            (Trailer, b'\r') => TrailerLf,
            (Trailer, _) => Trailer,
            (TrailerLf, b'\n') => EndCr,
            (TrailerLf, _) => return Err(ParseError::invalid_chunk("trailer line not closed by LF")),

            (EndLf, b'\n') => Done,
            (EndLf, _) => return Err(ParseError::invalid_chunk("chunked body missing final LF")),

            (Data | Done, _) => unreachable!("handled before byte-wise stepping"),
        };
        Ok(next)
    }

    fn push_size_digit(&mut self, digit: u8) -> Result<ChunkedState, ParseError> {
        self.remaining = self
            .remaining
            .checked_mul(16)
            .and_then(|size| size.checked_add(digit as u64))
            .ok_or_else(|| ParseError::invalid_chunk("chunk size overflows"))?;
        Ok(Size)
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if self.state == Done {
                trace!("chunked body finished");
                return Ok(Some(PayloadItem::Eof));
            }

            if src.is_empty() {
                return Ok(None);
            }

            if self.state == Data {
                let take = cmp::min(self.remaining, src.len() as u64) as usize;
                let bytes = src.split_to(take).freeze();
                self.remaining -= bytes.len() as u64;
                if self.remaining == 0 {
                    self.state = DataCr;
                }
                trace!(len = bytes.len(), "decoded chunk bytes");
                return Ok(Some(PayloadItem::Chunk(bytes)));
            }

            let byte = src.get_u8();
            self.state = self.step(byte)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(decoder: &mut ChunkedDecoder, buf: &mut BytesMut) -> Result<(Vec<u8>, bool), ParseError> {
        let mut collected = Vec::new();
        loop {
            match decoder.decode(buf)? {
                Some(PayloadItem::Chunk(bytes)) => collected.extend_from_slice(&bytes),
                Some(PayloadItem::Eof) => return Ok((collected, true)),
                None => return Ok((collected, false)),
            }
        }
    }

    #[test]
    fn decodes_a_two_chunk_body() {
        let mut buf = BytesMut::from("5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n");
        let (body, done) = drain(&mut ChunkedDecoder::new(), &mut buf).unwrap();

        assert!(done);
        assert_eq!(body, b"hello world");
        assert!(buf.is_empty());
    }

    #[test]
    fn tolerates_chunk_extensions() {
        let mut buf = BytesMut::from("4;name=value\r\nabcd\r\n3 ext\r\nxyz\r\n0\r\n\r\n");
        let (body, done) = drain(&mut ChunkedDecoder::new(), &mut buf).unwrap();

        assert!(done);
        assert_eq!(body, b"abcdxyz");
    }

    #[test]
    fn blank_line_reads_as_size_zero() {
        let mut buf = BytesMut::from("\r\n\r\n");
        let (body, done) = drain(&mut ChunkedDecoder::new(), &mut buf).unwrap();

        assert!(done);
        assert!(body.is_empty());
    }

    #[test]
    fn discards_trailers() {
        let mut buf = BytesMut::from("1\r\nx\r\n0\r\nX-Trailer: ignored\r\n\r\n");
        let (body, done) = drain(&mut ChunkedDecoder::new(), &mut buf).unwrap();

        assert!(done);
        assert_eq!(body, b"x");
    }

    #[test]
    fn partial_input_asks_for_more() {
        let mut decoder = ChunkedDecoder::new();

        let mut buf = BytesMut::from("5\r\nhel");
        let (body, done) = drain(&mut decoder, &mut buf).unwrap();
        assert!(!done);
        assert_eq!(body, b"hel");

        buf.extend_from_slice(b"lo\r\n0\r\n\r\n");
        let (rest, done) = drain(&mut decoder, &mut buf).unwrap();
        assert!(done);
        assert_eq!(rest, b"lo");
    }

    #[test]
    fn uppercase_hex_sizes_parse() {
        let mut buf = BytesMut::from("A\r\n0123456789\r\n0\r\n\r\n");
        let (body, done) = drain(&mut ChunkedDecoder::new(), &mut buf).unwrap();

        assert!(done);
        assert_eq!(body, b"0123456789");
    }

    #[test]
    fn garbage_in_the_size_line_is_rejected() {
        let mut buf = BytesMut::from("zz\r\nhello\r\n");
        let err = drain(&mut ChunkedDecoder::new(), &mut buf).unwrap_err();
        assert!(matches!(err, ParseError::InvalidChunk { .. }));
    }

    #[test]
    fn overflowing_size_is_rejected() {
        let mut buf = BytesMut::from("fffffffffffffffff\r\n");
        let err = drain(&mut ChunkedDecoder::new(), &mut buf).unwrap_err();
        assert_eq!(err.to_string(), "invalid chunk: chunk size overflows");
    }
}

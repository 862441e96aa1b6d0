//! Body materialisation.
//!
//! The body is read through a [`BodyStream`] chain: [`RawBody`] at the
//! bottom (connection buffer leftover first, then the socket), optionally
//! wrapped by decoder-hook transformers, with the framing decoder running
//! on top. The decoded bytes are collected in memory, subject to the
//! configured cap.

use std::io;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::codec::Decoder;

use crate::codec::body::PayloadDecoder;
use crate::ensure;
use crate::protocol::body::{BodyStream, BoxBodyStream, READ_CHUNK_SIZE};
use crate::protocol::{ParseError, PayloadItem};

/// The raw byte source for one request body: drains the bytes already
/// buffered on the connection, then reads the socket in blocks.
pub(crate) struct RawBody<'a, R> {
    buffered: BytesMut,
    reader: &'a mut R,
}

impl<'a, R> RawBody<'a, R> {
    pub(crate) fn new(buffered: BytesMut, reader: &'a mut R) -> Self {
        Self { buffered, reader }
    }
}

#[async_trait]
impl<R> BodyStream for RawBody<'_, R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        if !self.buffered.is_empty() {
            return Ok(Some(self.buffered.split().freeze()));
        }

        let mut buf = BytesMut::with_capacity(READ_CHUNK_SIZE);
        let n = self.reader.read_buf(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(buf.freeze()))
    }
}

/// Drives `decoder` over bytes pulled from `stream` until the body ends.
///
/// Returns the materialised body and the surplus bytes the framing did not
/// consume; with keep-alive those belong to the next request. Ending input
/// mid-body is the framing-specific 400; outgrowing `limit` is a 413 that
/// names the cap and the observed minimum size.
pub(crate) async fn read_body(
    mut stream: BoxBodyStream<'_>,
    mut decoder: PayloadDecoder,
    limit: Option<usize>,
) -> Result<(Bytes, BytesMut), ParseError> {
    let mut parse_buf = BytesMut::new();
    let mut collected = BytesMut::new();

    loop {
        loop {
            match decoder.decode(&mut parse_buf)? {
                Some(PayloadItem::Chunk(bytes)) => {
                    collected.extend_from_slice(&bytes);
                    if let Some(limit) = limit {
                        ensure!(collected.len() <= limit, ParseError::body_too_large(limit, collected.len()));
                    }
                }
                Some(PayloadItem::Eof) => return Ok((collected.freeze(), parse_buf)),
                None => break,
            }
        }

        match stream.next_chunk().await.map_err(ParseError::io)? {
            Some(bytes) => parse_buf.extend_from_slice(&bytes),
            None => return Err(decoder.short_read_error()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::StreamTransform;

    fn raw<'a>(leftover: &[u8], reader: &'a mut &[u8]) -> BoxBodyStream<'a> {
        Box::new(RawBody::new(BytesMut::from(leftover), reader))
    }

    #[tokio::test]
    async fn fixed_length_body_drains_leftover_before_the_socket() {
        let mut socket: &[u8] = b"llo world";
        let stream = raw(b"he", &mut socket);

        let (body, surplus) = read_body(stream, PayloadDecoder::fix_length(11), None).await.unwrap();
        assert_eq!(&body[..], b"hello world");
        assert!(surplus.is_empty());
    }

    #[tokio::test]
    async fn surplus_after_the_body_is_returned() {
        let mut socket: &[u8] = b"helloGET /next";
        let stream = raw(b"", &mut socket);

        let (body, surplus) = read_body(stream, PayloadDecoder::fix_length(5), None).await.unwrap();
        assert_eq!(&body[..], b"hello");
        assert_eq!(&surplus[..], b"GET /next");
    }

    #[tokio::test]
    async fn chunked_body_decodes_through_the_stream() {
        let mut socket: &[u8] = b"5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n";
        let stream = raw(b"", &mut socket);

        let (body, surplus) = read_body(stream, PayloadDecoder::chunked(), None).await.unwrap();
        assert_eq!(&body[..], b"hello world");
        assert!(surplus.is_empty());
    }

    #[tokio::test]
    async fn truncated_chunk_is_a_400() {
        let mut socket: &[u8] = b"5\r\nhe";
        let stream = raw(b"", &mut socket);

        let err = read_body(stream, PayloadDecoder::chunked(), None).await.unwrap_err();
        assert_eq!(err.to_string(), "chunk is too short");
    }

    #[tokio::test]
    async fn truncated_fixed_body_is_a_400() {
        let mut socket: &[u8] = b"abc";
        let stream = raw(b"", &mut socket);

        let err = read_body(stream, PayloadDecoder::fix_length(10), None).await.unwrap_err();
        assert_eq!(err.to_string(), "body is too short");
    }

    #[tokio::test]
    async fn cap_breach_names_cap_and_observed_size() {
        let mut socket: &[u8] = b"10\r\n0123456789abcdef\r\n0\r\n\r\n";
        let stream = raw(b"", &mut socket);

        let err = read_body(stream, PayloadDecoder::chunked(), Some(10)).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("at most 10"), "{message}");
        assert!(message.contains("at least 16"), "{message}");
    }

    struct Uppercase;

    impl StreamTransform for Uppercase {
        fn wrap<'a>(self: Box<Self>, inner: BoxBodyStream<'a>) -> BoxBodyStream<'a> {
            struct Upper<'a>(BoxBodyStream<'a>);

            #[async_trait]
            impl BodyStream for Upper<'_> {
                async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
                    Ok(self.0.next_chunk().await?.map(|bytes| {
                        Bytes::from(bytes.iter().map(u8::to_ascii_uppercase).collect::<Vec<u8>>())
                    }))
                }
            }

            Box::new(Upper(inner))
        }
    }

    #[tokio::test]
    async fn transformers_wrap_the_raw_stream_below_the_framing() {
        let mut socket: &[u8] = b"abc";
        let stream = Box::new(Uppercase).wrap(raw(b"", &mut socket));

        let (body, _) = read_body(stream, PayloadDecoder::fix_length(3), None).await.unwrap();
        assert_eq!(&body[..], b"ABC");
    }
}

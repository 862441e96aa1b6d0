//! Body byte streams.
//!
//! [`BodyStream`] is the uniform pull interface over everything a body can
//! come from or go to: the raw socket, in-memory bytes, or another stream
//! wrapped by a decoder hook. Streamed response bodies implement it too and
//! are emitted with chunked transfer encoding.

use std::io;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Bytes read per chunk when pulling from an [`AsyncRead`].
pub(crate) const READ_CHUNK_SIZE: usize = 4 * 1024;

/// A pull-based byte source.
#[async_trait]
pub trait BodyStream: Send {
    /// The next run of bytes, or `None` at end of input.
    async fn next_chunk(&mut self) -> io::Result<Option<Bytes>>;
}

/// A boxed stream; `'a` bounds what the stream may borrow.
pub type BoxBodyStream<'a> = Box<dyn BodyStream + 'a>;

/// A body served from a single in-memory byte string.
pub struct FullBodyStream {
    bytes: Option<Bytes>,
}

impl FullBodyStream {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self { bytes: Some(bytes.into()) }
    }
}

#[async_trait]
impl BodyStream for FullBodyStream {
    async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        Ok(self.bytes.take().filter(|b| !b.is_empty()))
    }
}

/// Adapts any [`AsyncRead`] (a file, a socket, an in-memory reader) into a
/// body stream, yielding up to a few KiB per chunk.
pub struct ReaderStream<R> {
    reader: R,
}

impl<R> ReaderStream<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl<R> BodyStream for ReaderStream<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        let mut buf = BytesMut::with_capacity(READ_CHUNK_SIZE);
        let n = self.reader.read_buf(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(buf.freeze()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn full_body_yields_once() {
        let mut stream = FullBodyStream::new("payload");
        assert_eq!(stream.next_chunk().await.unwrap(), Some(Bytes::from("payload")));
        assert_eq!(stream.next_chunk().await.unwrap(), None);
    }

    #[tokio::test]
    async fn empty_full_body_is_immediately_done() {
        let mut stream = FullBodyStream::new("");
        assert_eq!(stream.next_chunk().await.unwrap(), None);
    }

    #[tokio::test]
    async fn reader_stream_drains_the_reader() {
        let payload = vec![7u8; 10_000];
        let mut stream = ReaderStream::new(&payload[..]);

        let mut collected = Vec::new();
        while let Some(chunk) = stream.next_chunk().await.unwrap() {
            assert!(chunk.len() <= READ_CHUNK_SIZE);
            collected.extend_from_slice(&chunk);
        }

        assert_eq!(collected, payload);
    }
}

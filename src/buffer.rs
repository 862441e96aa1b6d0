//! The read buffer shared by every parsing stage of a connection.
//!
//! One [`ReadBuffer`] lives for the whole lifetime of a connection and is
//! reused across keep-alive requests. It grows on demand while a request is
//! being read and gives its backing store back once it has grown past
//! [`SHRINK_CAPACITY_LIMIT`], so a single oversized request cannot pin
//! memory for the rest of the session.

use std::io;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Initial capacity of a fresh buffer, matching one typical head read.
pub const DEFAULT_CAPACITY: usize = 8 * 1024;

/// Backing stores larger than this are replaced on [`ReadBuffer::reset`].
pub const SHRINK_CAPACITY_LIMIT: usize = 4 * 1024 * 1024;

/// A growable append-at-end byte buffer fed by an [`AsyncRead`].
///
/// Only the bytes before `len()` are live. Decoders consume from the front
/// through [`as_mut`](ReadBuffer::as_mut); whatever they leave behind is the
/// start of the next message on the connection.
#[derive(Debug)]
pub struct ReadBuffer {
    buf: BytesMut,
}

impl ReadBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { buf: BytesMut::with_capacity(capacity) }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Live contents, in arrival order.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Mutable access for codecs, which consume parsed bytes from the front.
    pub(crate) fn as_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    /// Appends one read worth of bytes at the tail, growing the buffer by
    /// roughly an eighth of its current size (plus a small constant) when it
    /// is full. Returns the number of bytes read; `0` means end of input.
    pub async fn read_once<R>(&mut self, reader: &mut R) -> io::Result<usize>
    where
        R: AsyncRead + Unpin,
    {
        if self.buf.capacity() - self.buf.len() == 0 {
            let grow = self.buf.len() / 8 + 10;
            self.buf.reserve(grow);
        }
        reader.read_buf(&mut self.buf).await
    }

    /// Drops the first `count` live bytes.
    ///
    /// # Panics
    ///
    /// Panics if `count` exceeds the number of live bytes.
    pub fn advance(&mut self, count: usize) {
        assert!(count <= self.buf.len(), "cannot drop {count} bytes, only {} buffered", self.buf.len());
        self.buf.advance(count);
    }

    /// Hands the live bytes out, leaving the buffer empty.
    pub(crate) fn take(&mut self) -> BytesMut {
        std::mem::take(&mut self.buf)
    }

    /// Puts surplus bytes back after a body read moved the buffer contents
    /// elsewhere. The buffer must be empty.
    pub(crate) fn restore(&mut self, bytes: BytesMut) {
        debug_assert!(self.buf.is_empty());
        self.buf = bytes;
    }

    /// Clears the buffer and, when the backing store has grown beyond
    /// [`SHRINK_CAPACITY_LIMIT`], replaces it with a fresh default-sized one.
    pub fn reset(&mut self) {
        self.buf.clear();
        if self.buf.capacity() > SHRINK_CAPACITY_LIMIT {
            self.buf = BytesMut::with_capacity(DEFAULT_CAPACITY);
        }
    }
}

impl Default for ReadBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_once_appends_at_tail() {
        let mut buffer = ReadBuffer::with_capacity(4);
        let mut input: &[u8] = b"hello world";

        let mut total = 0;
        loop {
            let n = buffer.read_once(&mut input).await.unwrap();
            if n == 0 {
                break;
            }
            total += n;
        }

        assert_eq!(total, 11);
        assert_eq!(buffer.as_slice(), b"hello world");
    }

    #[tokio::test]
    async fn read_all_round_trips() {
        // writing a string through the buffer and draining it yields the
        // string exactly
        let payload = "x".repeat(50_000);
        let mut buffer = ReadBuffer::new();
        let mut input = payload.as_bytes();

        while buffer.read_once(&mut input).await.unwrap() != 0 {}

        assert_eq!(buffer.as_slice(), payload.as_bytes());
        buffer.reset();
        assert!(buffer.is_empty());
    }

    #[test]
    fn advance_keeps_the_suffix() {
        let mut buffer = ReadBuffer::new();
        buffer.as_mut().extend_from_slice(b"abcdef");

        buffer.advance(2);
        assert_eq!(buffer.as_slice(), b"cdef");

        buffer.advance(4);
        assert!(buffer.is_empty());
    }

    #[test]
    #[should_panic(expected = "cannot drop")]
    fn advance_past_end_panics() {
        let mut buffer = ReadBuffer::new();
        buffer.as_mut().extend_from_slice(b"ab");
        buffer.advance(3);
    }

    #[test]
    fn reset_shrinks_oversized_backing_store() {
        let mut buffer = ReadBuffer::with_capacity(SHRINK_CAPACITY_LIMIT + 1);
        buffer.as_mut().extend_from_slice(b"leftover");

        buffer.reset();

        assert!(buffer.is_empty());
        assert!(buffer.as_mut().capacity() <= SHRINK_CAPACITY_LIMIT);
    }

    #[test]
    fn take_and_restore() {
        let mut buffer = ReadBuffer::new();
        buffer.as_mut().extend_from_slice(b"payload");

        let taken = buffer.take();
        assert!(buffer.is_empty());

        buffer.restore(taken);
        assert_eq!(buffer.as_slice(), b"payload");
    }
}

//! The per-connection loop.
//!
//! One [`HttpConnection`] owns the socket halves and a single
//! [`ReadBuffer`] for its whole lifetime. Requests and responses are
//! strictly serial: a response is fully written and flushed before the next
//! request is read.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, error, trace};

use crate::buffer::ReadBuffer;
use crate::codec::{HeadDecoder, ResponseEncoder};
use crate::connection::{read_body, RawBody};
use crate::debug::debug_enabled;
use crate::handler::HandlerError;
use crate::protocol::body::BoxBodyStream;
use crate::protocol::{
    Body, HttpError, Message, ParseError, PayloadItem, PayloadSize, Request, Response, SendError, StatusCode,
};
use crate::server::{Selection, Server};

/// A single accepted connection.
pub struct HttpConnection<R, W> {
    reader: R,
    writer: W,
    buffer: ReadBuffer,
}

enum LoopFlow {
    Continue,
    Close,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer, buffer: ReadBuffer::new() }
    }

    /// Serves requests until the peer goes away, the server is stopped, or
    /// an error makes the connection unsafe to reuse.
    pub async fn process(mut self, server: Arc<Server>) -> Result<(), HttpError> {
        while server.is_running() {
            let (request, payload_size) = match self.read_head().await {
                Ok(Some(head)) => head,
                Ok(None) => {
                    trace!("peer closed the connection");
                    return Ok(());
                }
                Err(ParseError::Io { source }) => {
                    // transport failure: close silently, no response
                    trace!(error = %source, "transport error while reading a request head");
                    return Ok(());
                }
                Err(e) => {
                    self.answer_error(&e).await?;
                    return Err(e.into());
                }
            };

            if debug_enabled() {
                debug!(method = %request.method(), target = request.target(), "request");
            }

            match self.dispatch(&server, request, payload_size).await? {
                LoopFlow::Continue => {
                    if self.buffer.is_empty() {
                        self.buffer.reset();
                    }
                }
                LoopFlow::Close => return Ok(()),
            }
        }
        Ok(())
    }

    /// Append-and-scan until a complete head is buffered. `Ok(None)` is a
    /// clean EOF between requests.
    async fn read_head(&mut self) -> Result<Option<(Request<()>, PayloadSize)>, ParseError> {
        loop {
            if let Some(head) = HeadDecoder.decode(self.buffer.as_mut())? {
                return Ok(Some(head));
            }

            let n = self.buffer.read_once(&mut self.reader).await?;
            if n == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                // the peer hung up mid-head
                return Err(ParseError::InvalidRequestLine);
            }
        }
    }

    /// Runs one request through the dispatch pipeline: handler selection,
    /// `Expect`, decoder hooks, body read, the handler itself, encoder
    /// hooks, response write.
    async fn dispatch(
        &mut self,
        server: &Server,
        mut request: Request<()>,
        payload_size: PayloadSize,
    ) -> Result<LoopFlow, HttpError> {
        let handler = match server.select_handler(&request) {
            Selection::Handler(handler) => handler,
            Selection::Reject { status, message } => {
                // the entry claimed the request and refused it pre-body
                self.write_response(Response::fail(status, message)).await?;
                return Ok(LoopFlow::Close);
            }
        };

        if let Err(e) = self.handle_expect(&request).await {
            self.answer_error(&e).await?;
            return Err(e.into());
        }

        let body = match self.read_request_body(server, &mut request, payload_size).await {
            Ok(body) => body,
            Err(e) => {
                // the framing may be corrupt, answering then closing is all
                // that is safe
                self.answer_error(&e).await?;
                return Err(e.into());
            }
        };

        let head = request.clone_head();
        let mut response = match handler.handle(request.with_body(body)).await {
            Ok(response) => response,
            Err(HandlerError::Fail { status, message }) => {
                self.write_response(Response::fail(status, message)).await?;
                return Ok(LoopFlow::Close);
            }
            Err(HandlerError::Internal(e)) => {
                error!(error = %e, "handler failed");
                self.write_response(Response::fail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())).await?;
                return Ok(LoopFlow::Continue);
            }
        };

        for hook in server.encode_hooks() {
            response = hook.encode(&head, response);
        }

        self.write_response(response).await?;
        Ok(LoopFlow::Continue)
    }

    /// `Expect: 100-continue` gets its interim response before any body
    /// byte is read; any other expectation fails with 417.
    async fn handle_expect(&mut self, request: &Request<()>) -> Result<(), ParseError> {
        let Some(expect) = request.headers().get("Expect") else {
            return Ok(());
        };

        let expect = expect.trim();
        if expect != "100-continue" {
            return Err(ParseError::unknown_expectation(expect));
        }

        self.writer.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").await?;
        self.writer.flush().await?;
        trace!("sent 100 Continue");
        Ok(())
    }

    /// Folds the decoder hooks over the request, then materialises the body
    /// through the composed stream chain.
    async fn read_request_body(
        &mut self,
        server: &Server,
        request: &mut Request<()>,
        payload_size: PayloadSize,
    ) -> Result<Bytes, ParseError> {
        let mut transforms = Vec::new();
        for hook in server.decode_hooks() {
            if let Some(transform) = hook.decode(request) {
                transforms.push(transform);
            }
        }

        if payload_size.is_empty() {
            return Ok(Bytes::new());
        }

        let transformed = !transforms.is_empty();
        let leftover = self.buffer.take();
        let mut stream: BoxBodyStream<'_> = Box::new(RawBody::new(leftover, &mut self.reader));
        for transform in transforms {
            stream = transform.wrap(stream);
        }

        let (body, surplus) = read_body(stream, payload_size.into(), server.max_body_size()).await?;

        if transformed {
            // surplus bytes went through the transformer chain, they no
            // longer belong to the wire
            if !surplus.is_empty() {
                trace!(len = surplus.len(), "dropping surplus bytes after a transformed body");
            }
        } else {
            self.buffer.restore(surplus);
        }

        Ok(body)
    }

    /// Answers a classified failure; transport errors have no response.
    async fn answer_error(&mut self, error: &ParseError) -> Result<(), SendError> {
        match error.status() {
            Some(status) => self.write_response(Response::fail(status, error.to_string())).await,
            None => Ok(()),
        }
    }

    /// Encodes and writes one response, flushing before returning.
    async fn write_response(&mut self, response: Response) -> Result<(), SendError> {
        let mut encoder = ResponseEncoder::new();
        let mut out = BytesMut::new();

        let payload_size = response.payload_size();
        let (status, headers, body) = response.into_parts();
        encoder.encode(Message::Header((status, headers, payload_size)), &mut out)?;

        match body {
            Body::Empty => {}
            Body::Full(bytes) => {
                encoder.encode(Message::Payload(PayloadItem::Chunk(bytes)), &mut out)?;
                encoder.encode(Message::Payload(PayloadItem::Eof), &mut out)?;
            }
            Body::Stream(mut stream) => {
                // each refill becomes one chunk on the wire
                loop {
                    self.writer.write_all(&out).await?;
                    out.clear();
                    match stream.next_chunk().await.map_err(SendError::io)? {
                        Some(bytes) => {
                            encoder.encode(Message::Payload(PayloadItem::Chunk(bytes)), &mut out)?;
                        }
                        None => {
                            encoder.encode(Message::Payload(PayloadItem::Eof), &mut out)?;
                            break;
                        }
                    }
                }
            }
        }

        self.writer.write_all(&out).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

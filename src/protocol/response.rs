use std::fmt;

use bytes::Bytes;

use crate::protocol::body::{BodyStream, BoxBodyStream};
use crate::protocol::{Headers, PayloadSize, StatusCode};

/// A response body: nothing, a fully materialised byte string, or a stream
/// that will be emitted with chunked transfer encoding.
pub enum Body {
    Empty,
    Full(Bytes),
    Stream(BoxBodyStream<'static>),
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => f.write_str("Body::Empty"),
            Body::Full(bytes) => write!(f, "Body::Full({} bytes)", bytes.len()),
            Body::Stream(_) => f.write_str("Body::Stream"),
        }
    }
}

/// An HTTP response, written to the wire exactly once.
///
/// The constructors keep `Content-Length` and `Transfer-Encoding` mutually
/// exclusive: a string body pins the exact length, a stream body pins
/// chunked encoding.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Body,
}

impl Response {
    /// An empty response with the given status.
    pub fn new(status: StatusCode) -> Self {
        Self { status, headers: Headers::new(), body: Body::Empty }
    }

    /// An empty `200 OK`.
    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    /// A `200 OK` with a fully materialised body and its exact
    /// `Content-Length`.
    pub fn with_string(body: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK).string_body(body)
    }

    /// A `200 OK` whose body is streamed with chunked transfer encoding.
    pub fn with_stream(stream: impl BodyStream + 'static) -> Self {
        Self::new(StatusCode::OK).stream_body(stream)
    }

    /// An error response carrying `message` as its body. This is a normal
    /// handler output, not an error value.
    pub fn fail(status: StatusCode, message: impl Into<String>) -> Self {
        Self::new(status).string_body(message.into())
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Replaces the body with a byte string, setting `Content-Length` and
    /// clearing any `Transfer-Encoding`.
    pub fn string_body(mut self, body: impl Into<Bytes>) -> Self {
        let bytes = body.into();
        self.headers.set("Content-Length", bytes.len().to_string());
        self.headers.remove("Transfer-Encoding");
        self.body = if bytes.is_empty() { Body::Empty } else { Body::Full(bytes) };
        self
    }

    /// Replaces the body with a stream, setting `Transfer-Encoding: chunked`
    /// and clearing any `Content-Length`.
    pub fn stream_body(mut self, stream: impl BodyStream + 'static) -> Self {
        self.headers.set("Transfer-Encoding", "chunked");
        self.headers.remove("Content-Length");
        self.body = Body::Stream(Box::new(stream));
        self
    }

    /// How the body will be framed on the wire.
    pub(crate) fn payload_size(&self) -> PayloadSize {
        match &self.body {
            Body::Empty => PayloadSize::Empty,
            Body::Full(bytes) => PayloadSize::Length(bytes.len() as u64),
            Body::Stream(_) => PayloadSize::Chunked,
        }
    }

    pub(crate) fn into_parts(self) -> (StatusCode, Headers, Body) {
        (self.status, self.headers, self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::body::FullBodyStream;

    #[test]
    fn string_body_pins_content_length() {
        let response = Response::with_string("hi");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("Content-Length"), Some("2"));
        assert!(!response.headers().contains("Transfer-Encoding"));
        assert_eq!(response.payload_size(), PayloadSize::Length(2));
    }

    #[test]
    fn stream_body_pins_chunked_encoding() {
        let response = Response::with_stream(FullBodyStream::new("streamed"));
        assert_eq!(response.headers().get("Transfer-Encoding"), Some("chunked"));
        assert!(!response.headers().contains("Content-Length"));
        assert_eq!(response.payload_size(), PayloadSize::Chunked);
    }

    #[test]
    fn switching_body_kinds_swaps_the_framing_header() {
        let response = Response::with_stream(FullBodyStream::new("s")).string_body("four");
        assert_eq!(response.headers().get("Content-Length"), Some("4"));
        assert!(!response.headers().contains("Transfer-Encoding"));
    }

    #[test]
    fn fail_carries_the_message_as_body() {
        let response = Response::fail(StatusCode::NOT_FOUND, "no such thing");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers().get("Content-Length"), Some("13"));
    }

    #[test]
    fn empty_string_body_writes_nothing() {
        let response = Response::with_string("");
        assert_eq!(response.payload_size(), PayloadSize::Empty);
        assert_eq!(response.headers().get("Content-Length"), Some("0"));
    }

    #[test]
    fn ok_is_a_bare_200() {
        let response = Response::ok();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.payload_size(), PayloadSize::Empty);
        assert!(response.headers().is_empty());
    }
}

//! Request head decoding.
//!
//! [`HeadDecoder`] parses the request line and header block out of the
//! connection buffer and decides how the body that follows is framed. It is
//! driven append-and-scan style: `decode` returns `None` until a complete
//! head is buffered, and the caller reads more bytes in between.

use bytes::{Buf, BytesMut};
use httparse::Status;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;
use crate::protocol::{Headers, Method, ParseError, PayloadSize, Request};

const MAX_HEADER_NUM: usize = 64;
const MAX_HEAD_BYTES: usize = 8 * 1024;

pub struct HeadDecoder;

impl Decoder for HeadDecoder {
    type Item = (Request<()>, PayloadSize);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let mut slots = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut parsed = httparse::Request::new(&mut slots);

        let status = parsed.parse(src).map_err(|e| match e {
            httparse::Error::HeaderName | httparse::Error::HeaderValue => {
                ParseError::invalid_header(e.to_string())
            }
            httparse::Error::TooManyHeaders => {
                ParseError::invalid_header(format!("more than {MAX_HEADER_NUM} headers"))
            }
            _ => ParseError::InvalidRequestLine,
        })?;

        match status {
            Status::Complete(head_len) => {
                trace!(head_len, "parsed request head");
                ensure!(head_len <= MAX_HEAD_BYTES, ParseError::too_large_head(head_len, MAX_HEAD_BYTES));

                // only 1.1 is spoken here
                if parsed.version != Some(1) {
                    return Err(ParseError::InvalidRequestLine);
                }

                let method: Method = parsed.method.ok_or(ParseError::InvalidRequestLine)?.parse()?;
                let target = parsed.path.ok_or(ParseError::InvalidRequestLine)?.to_string();

                let mut headers = Headers::new();
                for header in parsed.headers.iter() {
                    let value = std::str::from_utf8(header.value).map_err(|_| {
                        ParseError::invalid_header(format!("header {} has a non-UTF-8 value", header.name))
                    })?;
                    headers.append(header.name, value);
                }

                let payload_size = select_framing(&headers)?;

                src.advance(head_len);
                Ok(Some((Request::new(method, target, headers, ()), payload_size)))
            }
            Status::Partial => {
                ensure!(src.len() <= MAX_HEAD_BYTES, ParseError::too_large_head(src.len(), MAX_HEAD_BYTES));
                Ok(None)
            }
        }
    }
}

/// Picks the body framing from the head, per RFC 7230 §3.3 narrowed to what
/// this server supports: `chunked` or an exact `Content-Length`, with
/// `Transfer-Encoding` taking precedence when both appear.
fn select_framing(headers: &Headers) -> Result<PayloadSize, ParseError> {
    if let Some(encoding) = headers.get("Transfer-Encoding") {
        let encoding = encoding.trim();
        if encoding == "chunked" {
            return Ok(PayloadSize::Chunked);
        }
        return Err(ParseError::unsupported_transfer_encoding(encoding));
    }

    match headers.get("Content-Length") {
        Some(value) => {
            let length = value
                .trim()
                .parse::<u64>()
                .map_err(|_| ParseError::invalid_content_length(format!("value {value:?} is not a non-negative integer")))?;
            if length == 0 {
                Ok(PayloadSize::Empty)
            } else {
                Ok(PayloadSize::Length(length))
            }
        }
        None => Ok(PayloadSize::Empty),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::StatusCode;
    use indoc::indoc;

    fn decode(input: &str) -> Result<Option<(Request<()>, PayloadSize)>, ParseError> {
        let mut buf = BytesMut::from(input);
        HeadDecoder.decode(&mut buf)
    }

    #[test]
    fn from_curl() {
        let input = indoc! {"
            GET /index.html HTTP/1.1\r
            Host: 127.0.0.1:8080\r
            User-Agent: curl/7.79.1\r
            Accept: */*\r
            \r
        "};

        let (request, payload_size) = decode(input).unwrap().unwrap();

        assert_eq!(request.method(), Method::Get);
        assert_eq!(request.target(), "/index.html");
        assert_eq!(request.headers().len(), 3);
        assert_eq!(request.headers().get("Host"), Some("127.0.0.1:8080"));
        assert_eq!(request.headers().get("accept"), Some("*/*"));
        assert_eq!(payload_size, PayloadSize::Empty);
    }

    #[test]
    fn consumes_exactly_the_head() {
        let mut buf = BytesMut::from("POST /echo HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello");

        let (request, payload_size) = HeadDecoder.decode(&mut buf).unwrap().unwrap();

        assert_eq!(request.method(), Method::Post);
        assert_eq!(payload_size, PayloadSize::Length(5));
        assert_eq!(&buf[..], b"hello");
    }

    #[test]
    fn partial_head_wants_more_bytes() {
        assert!(decode("GET /index.html HTT").unwrap().is_none());
        assert!(decode("GET / HTTP/1.1\r\nHost: x\r\n").unwrap().is_none());
    }

    #[test]
    fn unknown_method_is_a_400_with_the_token() {
        let err = decode("FROB / HTTP/1.1\r\n\r\n").unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
        assert_eq!(err.to_string(), r#"unknown method "FROB""#);
    }

    #[test]
    fn http_10_is_rejected() {
        let err = decode("GET / HTTP/1.0\r\n\r\n").unwrap_err();
        assert_eq!(err.to_string(), "Invalid request line");
    }

    #[test]
    fn duplicate_headers_keep_wire_order() {
        let input = "GET / HTTP/1.1\r\nAccept: first\r\nAccept: second\r\n\r\n";
        let (request, _) = decode(input).unwrap().unwrap();

        assert_eq!(request.headers().len(), 2);
        assert_eq!(request.headers().get("Accept"), Some("first"));
    }

    #[test]
    fn chunked_transfer_encoding_selects_chunked_framing() {
        let input = "POST / HTTP/1.1\r\nTransfer-Encoding:  chunked \r\n\r\n";
        let (_, payload_size) = decode(input).unwrap().unwrap();
        assert!(payload_size.is_chunked());
    }

    #[test]
    fn other_transfer_encodings_are_a_500() {
        let err = decode("POST / HTTP/1.1\r\nTransfer-Encoding: gzip\r\n\r\n").unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(err.to_string(), "cannot handle transfer encoding: gzip");
    }

    #[test]
    fn malformed_content_length_is_a_400() {
        let err = decode("POST / HTTP/1.1\r\nContent-Length: five\r\n\r\n").unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));

        let err = decode("POST / HTTP/1.1\r\nContent-Length: -1\r\n\r\n").unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn zero_content_length_means_no_body() {
        let (_, payload_size) = decode("POST / HTTP/1.1\r\nContent-Length: 0\r\n\r\n").unwrap().unwrap();
        assert!(payload_size.is_empty());
    }

    #[test]
    fn transfer_encoding_wins_over_content_length() {
        let input = "POST / HTTP/1.1\r\nContent-Length: 3\r\nTransfer-Encoding: chunked\r\n\r\n";
        let (_, payload_size) = decode(input).unwrap().unwrap();
        assert!(payload_size.is_chunked());
    }

    #[test]
    fn oversized_head_is_rejected_while_partial() {
        let mut input = String::from("GET / HTTP/1.1\r\n");
        while input.len() <= MAX_HEAD_BYTES {
            input.push_str("X-Filler: yes\r\n");
        }
        // never terminated, so the head just keeps growing
        let err = decode(&input).unwrap_err();
        assert!(matches!(err, ParseError::TooLargeHead { .. }));
    }
}

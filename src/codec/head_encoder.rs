//! Response head encoding.

use std::io::Write;

use bytes::{BufMut, BytesMut};
use tokio_util::codec::Encoder;

use crate::protocol::{Headers, PayloadSize, SendError, StatusCode};

const INIT_HEAD_SIZE: usize = 4 * 1024;

/// Writes the status line, the headers in insertion order, and the blank
/// line. The framing header is filled in from the payload size here, so a
/// response can never leave with both `Content-Length` and
/// `Transfer-Encoding` set.
pub struct HeadEncoder;

impl Encoder<(StatusCode, Headers, PayloadSize)> for HeadEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (StatusCode, Headers, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (status, mut headers, payload_size) = item;

        dst.reserve(INIT_HEAD_SIZE);
        write!((&mut *dst).writer(), "HTTP/1.1 {} {}\r\n", status.as_u16(), status.describe())
            .map_err(SendError::io)?;

        match payload_size {
            PayloadSize::Length(n) => {
                headers.set("Content-Length", n.to_string());
                headers.remove("Transfer-Encoding");
            }
            PayloadSize::Chunked => {
                headers.set("Transfer-Encoding", "chunked");
                headers.remove("Content-Length");
            }
            PayloadSize::Empty => {
                headers.set("Content-Length", "0");
                headers.remove("Transfer-Encoding");
            }
        }

        for (name, value) in headers.iter() {
            dst.extend_from_slice(name.as_bytes());
            dst.extend_from_slice(b": ");
            dst.extend_from_slice(value.as_bytes());
            dst.extend_from_slice(b"\r\n");
        }
        dst.extend_from_slice(b"\r\n");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(status: StatusCode, headers: Headers, size: PayloadSize) -> String {
        let mut dst = BytesMut::new();
        HeadEncoder.encode((status, headers, size), &mut dst).unwrap();
        String::from_utf8(dst.to_vec()).unwrap()
    }

    #[test]
    fn status_line_uses_the_description_table() {
        let head = encode(StatusCode::OK, Headers::new(), PayloadSize::Length(2));
        assert_eq!(head, "HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\n");

        let head = encode(StatusCode(999), Headers::new(), PayloadSize::Empty);
        assert!(head.starts_with("HTTP/1.1 999 Unknown response code 999\r\n"));
    }

    #[test]
    fn chunked_responses_never_carry_content_length() {
        let mut headers = Headers::new();
        headers.set("Content-Length", "5");

        let head = encode(StatusCode::OK, headers, PayloadSize::Chunked);
        assert!(head.contains("Transfer-Encoding: chunked\r\n"));
        assert!(!head.contains("Content-Length"));
    }

    #[test]
    fn headers_keep_insertion_order() {
        let mut headers = Headers::new();
        headers.append("B-Second", "2");
        headers.append("A-Third", "3");

        let head = encode(StatusCode::OK, headers, PayloadSize::Empty);
        let b = head.find("B-Second").unwrap();
        let a = head.find("A-Third").unwrap();
        assert!(b < a);
    }
}

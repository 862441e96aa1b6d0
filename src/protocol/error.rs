//! The error hierarchy.
//!
//! [`ParseError`] covers everything that can go wrong while reading and
//! interpreting a request; every non-transport variant knows the HTTP
//! status used to answer the client, and its `Display` text is the
//! diagnostic sent as the response body. [`SendError`] covers response
//! emission. [`HttpError`] is the top-level error at the API boundary.

use std::io;

use thiserror::Error;

use crate::protocol::StatusCode;

/// The top-level error type for server operations.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Failed while reading or interpreting a request.
    #[error("request error: {source}")]
    Request {
        #[from]
        source: ParseError,
    },

    /// Failed while emitting a response.
    #[error("response error: {source}")]
    Response {
        #[from]
        source: SendError,
    },

    /// I/O failure outside any single request (bind, accept).
    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// The server was misconfigured.
    #[error("configuration error: {reason}")]
    Config { reason: String },
}

/// Errors raised while reading a request.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The request line is not `METHOD SP PATH SP HTTP/1.1`.
    #[error("Invalid request line")]
    InvalidRequestLine,

    /// The method token is outside the supported set.
    #[error("unknown method {token:?}")]
    UnknownMethod { token: String },

    /// A header line could not be parsed.
    #[error("invalid header line: {reason}")]
    InvalidHeader { reason: String },

    /// The head section outgrew the allowed size.
    #[error("request head too large: {current_size} bytes exceeds the limit {max_size}")]
    TooLargeHead { current_size: usize, max_size: usize },

    /// `Content-Length` is present but not a non-negative integer.
    #[error("invalid content-length: {reason}")]
    InvalidContentLength { reason: String },

    /// A transfer encoding other than `chunked` was requested.
    #[error("cannot handle transfer encoding: {encoding}")]
    UnsupportedTransferEncoding { encoding: String },

    /// A chunk header or chunk body violated the chunked framing.
    #[error("invalid chunk: {reason}")]
    InvalidChunk { reason: String },

    /// Input ended in the middle of a chunk.
    #[error("chunk is too short")]
    ChunkTooShort,

    /// Input ended before `Content-Length` bytes arrived.
    #[error("body is too short")]
    BodyTooShort,

    /// The materialised body outgrew the configured cap.
    #[error("body is too large: expected at most {limit} bytes, received at least {actual}")]
    BodyTooLarge { limit: usize, actual: usize },

    /// An `Expect` header other than `100-continue`.
    #[error("unknown expectation {expectation:?}")]
    UnknownExpectation { expectation: String },

    /// A status chosen by an accept predicate or other dispatch stage.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    /// Transport failure; the connection closes without a response.
    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn unknown_method<S: ToString>(token: S) -> Self {
        Self::UnknownMethod { token: token.to_string() }
    }

    pub fn invalid_header<S: ToString>(reason: S) -> Self {
        Self::InvalidHeader { reason: reason.to_string() }
    }

    pub fn too_large_head(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHead { current_size, max_size }
    }

    pub fn invalid_content_length<S: ToString>(reason: S) -> Self {
        Self::InvalidContentLength { reason: reason.to_string() }
    }

    pub fn unsupported_transfer_encoding<S: ToString>(encoding: S) -> Self {
        Self::UnsupportedTransferEncoding { encoding: encoding.to_string() }
    }

    pub fn invalid_chunk<S: ToString>(reason: S) -> Self {
        Self::InvalidChunk { reason: reason.to_string() }
    }

    pub fn body_too_large(limit: usize, actual: usize) -> Self {
        Self::BodyTooLarge { limit, actual }
    }

    pub fn unknown_expectation<S: ToString>(expectation: S) -> Self {
        Self::UnknownExpectation { expectation: expectation.to_string() }
    }

    pub fn rejected<S: ToString>(status: StatusCode, message: S) -> Self {
        Self::Rejected { status, message: message.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    /// The status served for this failure, or `None` for transport errors,
    /// which close the connection silently.
    pub fn status(&self) -> Option<StatusCode> {
        let status = match self {
            Self::InvalidRequestLine
            | Self::UnknownMethod { .. }
            | Self::InvalidHeader { .. }
            | Self::InvalidContentLength { .. }
            | Self::InvalidChunk { .. }
            | Self::ChunkTooShort
            | Self::BodyTooShort => StatusCode::BAD_REQUEST,
            Self::TooLargeHead { .. } | Self::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedTransferEncoding { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::UnknownExpectation { .. } => StatusCode::EXPECTATION_FAILED,
            Self::Rejected { status, .. } => *status,
            Self::Io { .. } => return None,
        };
        Some(status)
    }
}

/// Errors raised while emitting a response.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_body<S: ToString>(reason: S) -> Self {
        Self::InvalidBody { reason: reason.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

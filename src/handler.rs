//! Handlers and the hook traits of the dispatch pipeline.
//!
//! A [`Handler`] turns a fully read request into a response. Around it sit
//! two hook lists: [`DecodeRequest`] hooks run before the body is read and
//! may rewrite the request head or wrap the raw byte stream, and
//! [`EncodeResponse`] hooks run after the handler and may rewrite the
//! response.

use std::error::Error;
use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use bytes::Bytes;

use crate::protocol::{BoxBodyStream, Request, Response, StatusCode};

/// What a handler returns.
pub type HandlerResult = Result<Response, HandlerError>;

/// A handler failure.
///
/// `Fail` carries a chosen status and message; the server answers with them
/// and closes the connection. Everything else is wrapped in `Internal` and
/// becomes a 500 whose body renders the error, with the connection kept
/// alive.
#[derive(Debug)]
pub enum HandlerError {
    Fail { status: StatusCode, message: String },
    Internal(Box<dyn Error + Send + Sync>),
}

impl HandlerError {
    pub fn fail(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Fail { status, message: message.into() }
    }

    pub fn internal(error: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self::Internal(error.into())
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fail { status, message } => write!(f, "{status}: {message}"),
            Self::Internal(error) => error.fmt(f),
        }
    }
}

/// Turns a request with a materialised body into a response.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, request: Request<Bytes>) -> HandlerResult;
}

/// A [`Handler`] wrapping a plain async function.
pub struct HandlerFn<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Request<Bytes>) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send,
{
    async fn handle(&self, request: Request<Bytes>) -> HandlerResult {
        (self.f)(request).await
    }
}

pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Request<Bytes>) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send,
{
    HandlerFn { f }
}

/// A pre-body hook.
///
/// Runs on the unit-bodied request after routing and before the body is
/// read. It may rewrite the head in place and may return a transformer to
/// wrap the raw body stream. Hooks registered earlier wrap closer to the
/// socket.
pub trait DecodeRequest: Send + Sync {
    fn decode(&self, request: &mut Request<()>) -> Option<Box<dyn StreamTransform>>;
}

/// Wraps one body stream in another, e.g. to decompress or tee the bytes.
pub trait StreamTransform: Send {
    fn wrap<'a>(self: Box<Self>, inner: BoxBodyStream<'a>) -> BoxBodyStream<'a>;
}

/// A post-handler hook: observes the request head and may replace the
/// response.
pub trait EncodeResponse: Send + Sync {
    fn encode(&self, request: &Request<()>, response: Response) -> Response;
}

struct DecodeRequestFn<F>(F);

impl<F> DecodeRequest for DecodeRequestFn<F>
where
    F: Fn(&mut Request<()>) -> Option<Box<dyn StreamTransform>> + Send + Sync,
{
    fn decode(&self, request: &mut Request<()>) -> Option<Box<dyn StreamTransform>> {
        (self.0)(request)
    }
}

pub fn decode_request_fn<F>(f: F) -> impl DecodeRequest
where
    F: Fn(&mut Request<()>) -> Option<Box<dyn StreamTransform>> + Send + Sync,
{
    DecodeRequestFn(f)
}

struct EncodeResponseFn<F>(F);

impl<F> EncodeResponse for EncodeResponseFn<F>
where
    F: Fn(&Request<()>, Response) -> Response + Send + Sync,
{
    fn encode(&self, request: &Request<()>, response: Response) -> Response {
        (self.0)(request, response)
    }
}

pub fn encode_response_fn<F>(f: F) -> impl EncodeResponse
where
    F: Fn(&Request<()>, Response) -> Response + Send + Sync,
{
    EncodeResponseFn(f)
}

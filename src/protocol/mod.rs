//! Protocol types: methods, status codes, headers, requests, responses,
//! body streams and the error hierarchy.

pub mod body;

mod error;
mod header;
mod message;
mod method;
mod request;
mod response;
mod status;

pub use body::{BodyStream, BoxBodyStream, FullBodyStream, ReaderStream};
pub use error::{HttpError, ParseError, SendError};
pub use header::Headers;
pub use message::{Message, PayloadItem, PayloadSize};
pub use method::Method;
pub use request::Request;
pub use response::{Body, Response};
pub use status::StatusCode;

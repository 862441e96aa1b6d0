//! Per-connection request/response processing.

mod body_reader;
mod http_connection;

pub use http_connection::HttpConnection;

pub(crate) use body_reader::{read_body, RawBody};

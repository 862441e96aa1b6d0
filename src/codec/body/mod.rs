//! Body framing codecs.
//!
//! Exactly two inbound framings exist: an exact `Content-Length` and
//! chunked transfer encoding. [`PayloadDecoder`] and [`PayloadEncoder`]
//! dispatch between the strategies (plus the no-body case) on each side.

mod chunked_decoder;
mod chunked_encoder;
mod length_decoder;
mod length_encoder;
mod payload_decoder;
mod payload_encoder;

pub use chunked_decoder::ChunkedDecoder;
pub use chunked_encoder::ChunkedEncoder;
pub use length_decoder::LengthDecoder;
pub use length_encoder::LengthEncoder;
pub use payload_decoder::PayloadDecoder;
pub use payload_encoder::PayloadEncoder;

//! Wire codecs: request head decoding, response head encoding, and body
//! framing for both directions.

pub mod body;

mod head_decoder;
mod head_encoder;
mod response_encoder;

pub use head_decoder::HeadDecoder;
pub use head_encoder::HeadEncoder;
pub use response_encoder::ResponseEncoder;

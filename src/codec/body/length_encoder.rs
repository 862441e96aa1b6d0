use bytes::BytesMut;
use tokio_util::codec::Encoder;
use tracing::warn;

use crate::protocol::{PayloadItem, SendError};

/// Emits a fixed-length body verbatim, tracking the bytes still owed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthEncoder {
    remaining: u64,
    received_eof: bool,
}

impl LengthEncoder {
    pub fn new(length: u64) -> Self {
        Self { remaining: length, received_eof: false }
    }

    pub fn is_finish(&self) -> bool {
        self.remaining == 0 && self.received_eof
    }
}

impl Encoder<PayloadItem> for LengthEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            PayloadItem::Chunk(bytes) => {
                if bytes.is_empty() {
                    return Ok(());
                }
                if bytes.len() as u64 > self.remaining {
                    warn!(len = bytes.len(), remaining = self.remaining, "chunk exceeds declared content length");
                    return Err(SendError::invalid_body("body exceeds the declared content length"));
                }
                self.remaining -= bytes.len() as u64;
                dst.extend_from_slice(&bytes);
                Ok(())
            }
            PayloadItem::Eof => {
                self.received_eof = true;
                Ok(())
            }
        }
    }
}

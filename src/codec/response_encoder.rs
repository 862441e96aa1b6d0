//! Two-phase response encoding: a head first, then payload items until EOF.

use std::io;
use std::io::ErrorKind;

use bytes::BytesMut;
use tokio_util::codec::Encoder;
use tracing::error;

use crate::codec::body::PayloadEncoder;
use crate::codec::HeadEncoder;
use crate::protocol::{Headers, Message, PayloadSize, SendError, StatusCode};

pub struct ResponseEncoder {
    head_encoder: HeadEncoder,
    payload_encoder: Option<PayloadEncoder>,
}

impl ResponseEncoder {
    pub fn new() -> Self {
        Default::default()
    }
}

impl Default for ResponseEncoder {
    fn default() -> Self {
        Self { head_encoder: HeadEncoder, payload_encoder: None }
    }
}

impl Encoder<Message<(StatusCode, Headers, PayloadSize)>> for ResponseEncoder {
    type Error = SendError;

    fn encode(
        &mut self,
        item: Message<(StatusCode, Headers, PayloadSize)>,
        dst: &mut BytesMut,
    ) -> Result<(), Self::Error> {
        match item {
            Message::Header((status, headers, payload_size)) => {
                if self.payload_encoder.is_some() {
                    error!("expected a payload item but received a response head");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                }

                self.payload_encoder = Some(payload_size.into());
                self.head_encoder.encode((status, headers, payload_size), dst)
            }

            Message::Payload(payload_item) => {
                let Some(payload_encoder) = &mut self.payload_encoder else {
                    error!("expected a response head but received a payload item");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                };

                let result = payload_encoder.encode(payload_item, dst);
                if payload_encoder.is_finish() {
                    self.payload_encoder.take();
                }
                result
            }
        }
    }
}

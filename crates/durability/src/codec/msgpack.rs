//! MessagePack envelope codec.

use super::{CodecError, EnvelopeCodec};
use crate::format::Envelope;

/// Encodes envelopes as MessagePack via `rmp-serde`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackCodec;

impl MsgPackCodec {
    const ID: &'static str = "msgpack";
}

impl EnvelopeCodec for MsgPackCodec {
    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, CodecError> {
        rmp_serde::to_vec(envelope).map_err(|e| CodecError::encode(e.to_string(), Self::ID))
    }

    fn decode(&self, data: &[u8]) -> Result<Envelope, CodecError> {
        rmp_serde::from_slice(data)
            .map_err(|e| CodecError::decode(e.to_string(), Self::ID, data.len()))
    }

    fn codec_id(&self) -> &str {
        Self::ID
    }
}

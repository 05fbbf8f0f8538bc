//! Envelope codec abstraction
//!
//! The framer owns the length prefix and the checksum; the byte layout of the
//! envelope inside a frame is delegated to an [`EnvelopeCodec`]. The default
//! is [`MsgPackCodec`].

mod msgpack;
mod traits;

pub use msgpack::MsgPackCodec;
pub use traits::{CodecError, EnvelopeCodec};

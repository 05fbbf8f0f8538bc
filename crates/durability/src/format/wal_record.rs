//! WAL frame and envelope format.
//!
//! # Frame Layout
//!
//! ```text
//! ┌──────────────────────┬───────────────────────────────────┐
//! │ Length (4 bytes, LE, │ Envelope (Length bytes,           │
//! │ signed)              │ codec-encoded)                    │
//! └──────────────────────┴───────────────────────────────────┘
//!
//! Envelope:
//! ┌────────────────┬───────────────┬──────────────────────┐
//! │ Sequence (u32) │ CRC32 (u32)   │ Payload (variable)   │
//! └────────────────┴───────────────┴──────────────────────┘
//! ```
//!
//! The CRC is CRC-32/IEEE over the payload bytes only. The byte layout of the
//! envelope itself belongs to the [`EnvelopeCodec`]; this module only owns the
//! length prefix and the checksum.

use crate::codec::{CodecError, EnvelopeCodec};
use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, Read};

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Largest envelope a frame can describe.
pub const MAX_ENVELOPE_SIZE: usize = i32::MAX as usize;

/// Compute the CRC-32/IEEE checksum stored in an envelope.
pub fn compute_checksum(payload: &[u8]) -> u32 {
    crc32fast::hash(payload)
}

/// Logical WAL record: one client payload with its sequence number and checksum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Sequence number, gapless and strictly increasing across the log
    pub sequence_number: u32,

    /// CRC-32/IEEE of `payload`
    pub checksum: u32,

    /// Opaque client bytes, encoded as a byte string rather than a sequence
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Build an envelope, computing the checksum over `payload`.
    pub fn new(sequence_number: u32, payload: Vec<u8>) -> Self {
        let checksum = compute_checksum(&payload);
        Envelope {
            sequence_number,
            checksum,
            payload,
        }
    }

    /// Recompute the payload checksum and compare it with the stored one.
    pub fn verify(&self) -> Result<(), WalRecordError> {
        let computed = compute_checksum(&self.payload);
        if computed != self.checksum {
            return Err(WalRecordError::ChecksumMismatch {
                expected: self.checksum,
                computed,
            });
        }
        Ok(())
    }
}

/// Result of pulling one frame off a reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unframed {
    /// A complete, checksum-verified frame
    Record {
        /// Decoded envelope
        envelope: Envelope,
        /// Bytes consumed, length prefix included
        consumed: usize,
    },
    /// Clean end of input on a frame boundary
    Eof,
}

/// Encode an envelope and prefix it with its length.
pub fn frame(
    sequence_number: u32,
    payload: &[u8],
    codec: &dyn EnvelopeCodec,
) -> Result<Vec<u8>, WalRecordError> {
    let envelope = Envelope::new(sequence_number, payload.to_vec());
    let encoded = codec.encode(&envelope).map_err(WalRecordError::Encode)?;

    let length = i32::try_from(encoded.len())
        .map_err(|_| WalRecordError::EnvelopeTooLarge(encoded.len()))?;

    let mut bytes = Vec::with_capacity(LENGTH_PREFIX_SIZE + encoded.len());
    bytes.extend_from_slice(&length.to_le_bytes());
    bytes.extend_from_slice(&encoded);
    Ok(bytes)
}

/// Read and verify the next frame.
///
/// Returns [`Unframed::Eof`] only when the reader is exhausted exactly at a
/// frame boundary. A short prefix or short envelope is `TruncatedFrame`.
/// Every error other than [`WalRecordError::Io`] means the bytes at this
/// position are not a valid frame.
pub fn unframe<R: Read>(
    reader: &mut R,
    codec: &dyn EnvelopeCodec,
) -> Result<Unframed, WalRecordError> {
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    let read = read_full(reader, &mut prefix)?;
    if read == 0 {
        return Ok(Unframed::Eof);
    }
    if read < LENGTH_PREFIX_SIZE {
        return Err(WalRecordError::TruncatedFrame {
            expected: LENGTH_PREFIX_SIZE,
            available: read,
        });
    }

    let length = i32::from_le_bytes(prefix);
    if length <= 0 {
        return Err(WalRecordError::InvalidLength(length));
    }
    let length = length as usize;

    // `take` bounds the read, so a garbage length cannot force a huge allocation
    // beyond what is actually on disk.
    let mut body = Vec::new();
    reader
        .by_ref()
        .take(length as u64)
        .read_to_end(&mut body)
        .map_err(|e| WalRecordError::Io(e.to_string()))?;
    if body.len() < length {
        return Err(WalRecordError::TruncatedFrame {
            expected: length,
            available: body.len(),
        });
    }

    let envelope = codec.decode(&body).map_err(WalRecordError::Decode)?;
    envelope.verify()?;

    Ok(Unframed::Record {
        envelope,
        consumed: LENGTH_PREFIX_SIZE + length,
    })
}

/// Fill `buf` as far as the reader allows; returns the byte count read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize, WalRecordError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(WalRecordError::Io(e.to_string())),
        }
    }
    Ok(filled)
}

/// Frame encoding and decoding errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalRecordError {
    /// Input ended inside a frame
    #[error("Truncated frame: expected {expected} bytes, found {available}")]
    TruncatedFrame {
        /// Bytes the frame needed
        expected: usize,
        /// Bytes actually present
        available: usize,
    },

    /// Length prefix is zero or negative
    #[error("Invalid frame length: {0}")]
    InvalidLength(i32),

    /// Checksum verification failed
    #[error("Checksum mismatch: expected {expected:08x}, computed {computed:08x}")]
    ChecksumMismatch {
        /// Checksum stored in the envelope
        expected: u32,
        /// Checksum recomputed over the payload
        computed: u32,
    },

    /// Encoded envelope does not fit a 4-byte signed length
    #[error("Envelope too large: {0} bytes")]
    EnvelopeTooLarge(usize),

    /// Codec failed to encode the envelope
    #[error("Envelope encode failed: {0}")]
    Encode(CodecError),

    /// Codec failed to decode the envelope bytes
    #[error("Envelope decode failed: {0}")]
    Decode(CodecError),

    /// Underlying reader failed
    #[error("I/O error: {0}")]
    Io(String),
}

impl WalRecordError {
    /// Whether this error describes bad bytes rather than a failed read.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            WalRecordError::TruncatedFrame { .. }
                | WalRecordError::InvalidLength(_)
                | WalRecordError::ChecksumMismatch { .. }
                | WalRecordError::Decode(_)
        )
    }
}

//! Error types for the WAL
//!
//! Each layer has its own error enum (`WalConfigError`, `WalRecordError`,
//! `CodecError`, `SegmentError`, `WalReaderError`). The public handle
//! returns [`WalError`], which wraps them.
//!
//! Background sync failures never show up here: the flush thread logs them
//! and retries on the next tick.

use crate::format::{SegmentError, WalRecordError};
use crate::wal::{WalConfigError, WalReaderError};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for WAL operations
pub type WalResult<T> = std::result::Result<T, WalError>;

/// Error types for the WAL
#[derive(Debug, Error)]
pub enum WalError {
    /// Configuration rejected by validation
    #[error("Invalid WAL configuration: {0}")]
    Config(#[from] WalConfigError),

    /// Data directory cannot be created or used
    #[error("Cannot use WAL directory {}: {source}", .path.display())]
    InvalidDirectory {
        /// Directory that was requested
        path: PathBuf,
        /// Underlying failure
        source: io::Error,
    },

    /// Another handle or process holds the directory lock
    #[error("WAL directory {} is already in use", .0.display())]
    AlreadyLocked(PathBuf),

    /// Envelope could not be framed; nothing was written
    #[error("Failed to frame WAL record: {0}")]
    Framing(#[from] WalRecordError),

    /// Segment create/open/write/remove failed
    ///
    /// A failed write or rotation leaves the writer degraded; see
    /// [`WalError::Degraded`].
    #[error("I/O error on segment {segment}: {source}")]
    SegmentIo {
        /// Segment ordinal involved
        segment: u64,
        /// Underlying failure
        source: io::Error,
    },

    /// A file with the segment suffix has an unparsable ordinal
    #[error("Malformed segment name: {0}")]
    MalformedSegmentName(String),

    /// The 32-bit sequence space is used up
    #[error("WAL sequence numbers exhausted")]
    SequenceExhausted,

    /// The 64-bit segment ordinal space is used up; rotation is impossible
    #[error("WAL segment ordinals exhausted at segment {0}")]
    OrdinalsExhausted(u64),

    /// An earlier write or rotation failed on this segment
    ///
    /// The segment tail may hold a partial frame, so appends are refused
    /// until the WAL is closed and reopened, which truncates the tail.
    #[error("WAL is degraded after an I/O failure on segment {0}; close and reopen it")]
    Degraded(u64),

    /// The WAL has been closed
    #[error("WAL is closed")]
    Closed,

    /// Recovery scan failed to read a segment
    #[error(transparent)]
    Reader(#[from] WalReaderError),

    /// Other I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl WalError {
    /// Build a segment I/O error.
    pub fn segment_io(segment: u64, source: io::Error) -> Self {
        WalError::SegmentIo { segment, source }
    }
}

impl From<SegmentError> for WalError {
    fn from(e: SegmentError) -> Self {
        match e {
            SegmentError::MalformedName(name) => WalError::MalformedSegmentName(name),
            SegmentError::Io(e) => WalError::Io(e),
        }
    }
}

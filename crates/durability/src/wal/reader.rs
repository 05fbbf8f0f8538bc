//! WAL reader for recovery and replay.
//!
//! The reader scans segments in ascending ordinal order and decodes frames
//! until the end of the log or the first bad frame. A bad frame (short,
//! checksum mismatch, undecodable, out-of-order sequence) ends the scan:
//! everything before it is returned and everything after it, in this
//! segment and in later ones, is treated as unrecoverable tail. This is the
//! normal outcome of a crash mid-write, so it is reported on the result
//! rather than returned as an error.

use crate::codec::EnvelopeCodec;
use crate::format::{
    list_segments_ascending, segment_path, unframe, Envelope, SegmentError, Unframed,
    WalRecordError, WalSegment,
};
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// WAL reader for iterating over records in segments.
///
/// Only valid against segments with no unflushed writer buffer: either
/// before a writer is attached, or after it has been flushed.
#[derive(Clone)]
pub struct WalReader {
    codec: Arc<dyn EnvelopeCodec>,
}

impl WalReader {
    /// Create a new WAL reader.
    pub fn new(codec: Arc<dyn EnvelopeCodec>) -> Self {
        WalReader { codec }
    }

    /// Read all records from a single segment.
    ///
    /// Stops at the first invalid or incomplete frame.
    pub fn read_segment(
        &self,
        wal_dir: &Path,
        segment: u64,
    ) -> Result<SegmentScan, WalReaderError> {
        self.scan_segment(wal_dir, segment, None, None)
    }

    /// Scan one segment, rejecting any record not newer than `previous`.
    ///
    /// With a `limit`, bytes past that offset are ignored as if the file
    /// ended there.
    fn scan_segment(
        &self,
        wal_dir: &Path,
        segment: u64,
        mut previous: Option<u32>,
        limit: Option<u64>,
    ) -> Result<SegmentScan, WalReaderError> {
        let io_err = |e: std::io::Error| WalReaderError::SegmentIo {
            segment,
            detail: e.to_string(),
        };

        let file = WalSegment::open_read(wal_dir, segment).map_err(io_err)?;
        let on_disk = file.metadata().map_err(io_err)?.len();
        let file_len = limit.map_or(on_disk, |limit| limit.min(on_disk));
        let mut reader = BufReader::new(file.take(file_len));

        let mut records = Vec::new();
        let mut valid_end = 0u64;
        let mut stop_reason = ReadStopReason::EndOfData;

        loop {
            match unframe(&mut reader, self.codec.as_ref()) {
                Ok(Unframed::Eof) => break,
                Ok(Unframed::Record { envelope, consumed }) => {
                    if let Some(prev) = previous {
                        if envelope.sequence_number <= prev {
                            stop_reason = ReadStopReason::SequenceRegression {
                                offset: valid_end,
                                previous: prev,
                                found: envelope.sequence_number,
                            };
                            break;
                        }
                    }
                    previous = Some(envelope.sequence_number);
                    valid_end += consumed as u64;
                    records.push(envelope);
                }
                Err(WalRecordError::Io(detail)) => {
                    return Err(WalReaderError::SegmentIo { segment, detail });
                }
                Err(e) => {
                    stop_reason = ReadStopReason::from_record_error(&e, valid_end);
                    break;
                }
            }
        }

        debug!(
            target: "seglog::wal",
            segment,
            records = records.len(),
            valid_end,
            file_len,
            "Scanned WAL segment"
        );

        Ok(SegmentScan {
            segment,
            records,
            valid_end,
            file_len,
            stop_reason,
        })
    }

    /// Read all records from all segments in a WAL directory.
    ///
    /// Segments are read in ascending order. Scanning stops entirely at the
    /// first bad frame; later segments are not consulted.
    pub fn read_all(&self, wal_dir: &Path) -> Result<WalReadResult, WalReaderError> {
        self.read_bounded(wal_dir, None)
    }

    /// Like [`WalReader::read_all`], but ignore segments after `last_segment`
    /// and everything past `last_len` bytes of `last_segment` itself.
    ///
    /// Lets a scan run while a writer keeps appending: the bound is the
    /// writer's flushed position, so half-written frames beyond it are
    /// never mistaken for a torn tail.
    pub fn read_all_until(
        &self,
        wal_dir: &Path,
        last_segment: u64,
        last_len: u64,
    ) -> Result<WalReadResult, WalReaderError> {
        self.read_bounded(wal_dir, Some((last_segment, last_len)))
    }

    fn read_bounded(
        &self,
        wal_dir: &Path,
        end: Option<(u64, u64)>,
    ) -> Result<WalReadResult, WalReaderError> {
        let segments = list_segments_ascending(wal_dir)?;

        let mut records: Vec<Envelope> = Vec::new();
        let mut previous = None;
        let mut stop_reason = ReadStopReason::EndOfData;
        let mut stopped_at = None;
        let mut segments_scanned = 0usize;

        for segment in segments {
            let limit = match end {
                Some((last, _)) if segment > last => break,
                Some((last, len)) if segment == last => Some(len),
                _ => None,
            };
            let scan = match self.scan_segment(wal_dir, segment, previous, limit) {
                Ok(scan) => scan,
                Err(WalReaderError::SegmentIo { ref detail, .. })
                    if !segment_path(wal_dir, segment).exists() =>
                {
                    // Removed by retention between listing and opening
                    debug!(
                        target: "seglog::wal",
                        segment,
                        detail = %detail,
                        "Segment vanished during scan"
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };
            segments_scanned += 1;

            if let Some(last) = scan.last_sequence() {
                previous = Some(last);
            }
            records.extend(scan.records);

            if scan.stop_reason.is_corrupt() {
                warn!(
                    target: "seglog::wal",
                    segment,
                    offset = scan.valid_end,
                    reason = ?scan.stop_reason,
                    "WAL scan stopped at bad frame; treating remainder as lost tail"
                );
                stop_reason = scan.stop_reason;
                stopped_at = Some(StopPosition {
                    segment,
                    offset: scan.valid_end,
                });
                break;
            }
        }

        Ok(WalReadResult {
            records,
            last_sequence: previous,
            stop_reason,
            stopped_at,
            segments_scanned,
        })
    }

    /// Last sequence number in the log, or 0 for an empty log.
    ///
    /// Taken from the last record of the highest segment that holds any
    /// valid record. Normally that is the last segment and only it is read.
    pub fn last_sequence_number(&self, wal_dir: &Path) -> Result<u32, WalReaderError> {
        let segments = list_segments_ascending(wal_dir)?;

        for &segment in segments.iter().rev() {
            let scan = self.read_segment(wal_dir, segment)?;
            if let Some(last) = scan.last_sequence() {
                return Ok(last);
            }
        }

        Ok(0)
    }
}

impl std::fmt::Debug for WalReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalReader")
            .field("codec", &self.codec.codec_id())
            .finish()
    }
}

/// Records decoded from one segment.
#[derive(Debug, Clone)]
pub struct SegmentScan {
    /// Segment ordinal
    pub segment: u64,

    /// Valid records in order
    pub records: Vec<Envelope>,

    /// Byte offset where valid frames end
    pub valid_end: u64,

    /// File size at scan time
    pub file_len: u64,

    /// Why reading stopped
    pub stop_reason: ReadStopReason,
}

impl SegmentScan {
    /// Sequence number of the last valid record.
    pub fn last_sequence(&self) -> Option<u32> {
        self.records.last().map(|r| r.sequence_number)
    }

    /// Whether the segment has bytes past its last valid frame.
    pub fn is_torn(&self) -> bool {
        self.valid_end < self.file_len
    }

    /// Bytes past the last valid frame.
    pub fn torn_bytes(&self) -> u64 {
        self.file_len.saturating_sub(self.valid_end)
    }
}

/// Reason why record reading stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadStopReason {
    /// Successfully read all records to end of data
    EndOfData,
    /// Input ended inside a frame (expected after crash)
    PartialRecord {
        /// Byte offset of the partial frame within its segment
        offset: u64,
    },
    /// Length prefix is zero or negative
    InvalidLength {
        /// Byte offset of the frame within its segment
        offset: u64,
        /// Length found
        length: i32,
    },
    /// CRC checksum mismatch - data is corrupted
    ChecksumMismatch {
        /// Byte offset of the frame within its segment
        offset: u64,
    },
    /// Envelope bytes could not be decoded
    DecodeError {
        /// Byte offset of the frame within its segment
        offset: u64,
        /// Human-readable error description
        detail: String,
    },
    /// Sequence number did not increase
    SequenceRegression {
        /// Byte offset of the frame within its segment
        offset: u64,
        /// Sequence number of the preceding record
        previous: u32,
        /// Sequence number found
        found: u32,
    },
}

impl ReadStopReason {
    /// Whether the scan hit a bad frame rather than the end of data.
    pub fn is_corrupt(&self) -> bool {
        !matches!(self, ReadStopReason::EndOfData)
    }

    fn from_record_error(err: &WalRecordError, offset: u64) -> Self {
        match err {
            WalRecordError::TruncatedFrame { .. } => ReadStopReason::PartialRecord { offset },
            WalRecordError::InvalidLength(length) => ReadStopReason::InvalidLength {
                offset,
                length: *length,
            },
            WalRecordError::ChecksumMismatch { .. } => ReadStopReason::ChecksumMismatch { offset },
            other => ReadStopReason::DecodeError {
                offset,
                detail: other.to_string(),
            },
        }
    }
}

/// Where a scan stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopPosition {
    /// Segment holding the bad frame
    pub segment: u64,
    /// Byte offset of the bad frame
    pub offset: u64,
}

/// Result of reading all WAL segments.
#[derive(Debug, Clone)]
pub struct WalReadResult {
    /// All valid records in order
    pub records: Vec<Envelope>,

    /// Sequence number of the last valid record
    pub last_sequence: Option<u32>,

    /// Why reading stopped (for diagnostics)
    pub stop_reason: ReadStopReason,

    /// Position of the bad frame, if any
    pub stopped_at: Option<StopPosition>,

    /// Number of segments read
    pub segments_scanned: usize,
}

impl WalReadResult {
    /// Whether the scan ended at a bad frame instead of the end of the log.
    pub fn truncated(&self) -> bool {
        self.stop_reason.is_corrupt()
    }

    /// Clone out the payloads, in order.
    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.records.iter().map(|r| r.payload.clone()).collect()
    }

    /// Consume the result, keeping only payloads.
    pub fn into_payloads(self) -> Vec<Vec<u8>> {
        self.records.into_iter().map(|r| r.payload).collect()
    }
}

/// WAL reader errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalReaderError {
    /// I/O error
    #[error("I/O error: {0}")]
    IoError(String),

    /// Reading a particular segment failed
    #[error("I/O error reading segment {segment}: {detail}")]
    SegmentIo {
        /// Segment ordinal
        segment: u64,
        /// Human-readable error description
        detail: String,
    },

    /// A file with the segment suffix has an unparsable ordinal
    #[error("Malformed segment name: {0}")]
    MalformedSegmentName(String),
}

impl From<SegmentError> for WalReaderError {
    fn from(e: SegmentError) -> Self {
        match e {
            SegmentError::MalformedName(name) => WalReaderError::MalformedSegmentName(name),
            SegmentError::Io(e) if e.kind() == ErrorKind::NotFound => {
                WalReaderError::IoError(format!("WAL directory not found: {}", e))
            }
            SegmentError::Io(e) => WalReaderError::IoError(e.to_string()),
        }
    }
}

//! On-disk byte formats for WAL segments and frames.
//!
//! Keeping serialization separate from operational logic (how the WAL is
//! written, synced and scanned) makes format evolution easier to manage.
//!
//! # Module Structure
//!
//! - `segment`: segment naming, directory scanning, the append file handle
//! - `wal_record`: envelope, length-prefixed frames, checksums

pub mod segment;
pub mod wal_record;

pub use segment::{
    latest_segment, list_segments_ascending, parse_ordinal, segment_name, segment_path,
    sync_dir, SegmentError, WalSegment, SEGMENT_SUFFIX, WRITE_BUFFER_CAPACITY,
};
pub use wal_record::{
    compute_checksum, frame, unframe, Envelope, Unframed, WalRecordError, LENGTH_PREFIX_SIZE,
    MAX_ENVELOPE_SIZE,
};

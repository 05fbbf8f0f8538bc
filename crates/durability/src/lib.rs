//! Segmented, crash-durable write-ahead log
//!
//! Clients append opaque byte records; each gets a gapless, strictly
//! increasing 32-bit sequence number. Records are framed, checksummed and
//! written to size-bounded segment files named `<ordinal>-segment.wal`.
//! A background thread flushes and fsyncs at a fixed interval, and a bounded
//! number of segments is retained.
//!
//! - `wal`: the [`Wal`] handle, writer, flush scheduler and recovery reader
//! - `format`: segment naming and files, frame and envelope layout
//! - `codec`: envelope encoding abstraction (MessagePack by default)
//! - `error`: the [`WalError`] returned by the public API
//!
//! Logging goes through `tracing` under the `seglog::wal` and
//! `seglog::flush` targets. The crate never installs a subscriber.
//!
//! ```no_run
//! use seglog_durability::{Wal, WalConfig};
//!
//! # fn main() -> Result<(), seglog_durability::WalError> {
//! let wal = Wal::open("/var/lib/app/wal", WalConfig::default())?;
//! let seq = wal.append(b"hello")?;
//! wal.flush()?;
//! assert_eq!(seq, 1);
//! wal.close()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod error;
pub mod format;
pub mod wal;

pub use codec::{CodecError, EnvelopeCodec, MsgPackCodec};
pub use error::{WalError, WalResult};
pub use format::{
    frame, list_segments_ascending, parse_ordinal, segment_name, unframe, Envelope,
    SegmentError, Unframed, WalRecordError,
};
pub use wal::{
    ReadStopReason, StopPosition, Wal, WalConfig, WalConfigError, WalCounters, WalReadResult,
    WalReader, WalReaderError,
};

//! Segmented write-ahead log
//!
//! - `config`: WAL configuration (WalConfig, WalConfigError)
//! - `writer`: append path, rotation and retention (WalWriter)
//! - `flush`: background flush scheduler (FlushScheduler)
//! - `reader`: recovery scan (WalReader)
//! - `handle`: the public `Wal` handle tying them together

pub mod config;
pub mod flush;
pub mod handle;
pub mod reader;
pub mod writer;

pub use config::{
    WalConfig, WalConfigError, DEFAULT_MAX_SEGMENTS, DEFAULT_MAX_SEGMENT_SIZE,
    DEFAULT_SYNC_INTERVAL,
};
pub use flush::{FlushScheduler, SchedulerState};
pub use handle::{Wal, LOCK_FILE_NAME};
pub use reader::{
    ReadStopReason, SegmentScan, StopPosition, WalReadResult, WalReader, WalReaderError,
};
pub use writer::{WalCounters, WalWriter};

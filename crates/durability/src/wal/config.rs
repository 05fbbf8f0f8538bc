//! WAL configuration.
//!
//! This module provides configuration for the Write-Ahead Log. Defaults are
//! named constants rather than process-wide mutable state; every WAL instance
//! gets its own [`WalConfig`].

use std::time::Duration;

/// Default maximum segment size: 64 MB (decimal).
pub const DEFAULT_MAX_SEGMENT_SIZE: u64 = 64 * 1000 * 1000;

/// Default number of segments kept on disk.
pub const DEFAULT_MAX_SEGMENTS: usize = 5;

/// Default interval between background flush + fsync passes.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_millis(100);

/// WAL configuration parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalConfig {
    /// Maximum segment size in bytes (default: 64MB).
    ///
    /// An append whose frame would push the current segment past this size
    /// rotates to a new segment first. Only individual frames are bounded by
    /// the 4-byte length prefix; segments may be any size.
    pub max_segment_size: u64,

    /// Maximum number of segments retained on disk (default: 5).
    ///
    /// After a rotation the oldest segments are deleted until at most this
    /// many remain. Records in deleted segments are gone for good.
    pub max_segments: usize,

    /// Interval between background flush + fsync passes (default: 100ms).
    ///
    /// Bounds how long an acknowledged append can sit in memory.
    pub sync_interval: Duration,

    /// Skip fsync; buffers are still flushed to the OS (default: false).
    ///
    /// Testing only. A crash of the machine can lose anything the OS has
    /// not yet written back.
    pub no_sync: bool,
}

impl Default for WalConfig {
    fn default() -> Self {
        WalConfig {
            max_segment_size: DEFAULT_MAX_SEGMENT_SIZE,
            max_segments: DEFAULT_MAX_SEGMENTS,
            sync_interval: DEFAULT_SYNC_INTERVAL,
            no_sync: false,
        }
    }
}

impl WalConfig {
    /// Create a new WAL configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum segment size (builder pattern).
    pub fn with_max_segment_size(mut self, size: u64) -> Self {
        self.max_segment_size = size;
        self
    }

    /// Set maximum retained segments (builder pattern).
    pub fn with_max_segments(mut self, count: usize) -> Self {
        self.max_segments = count;
        self
    }

    /// Set background sync interval (builder pattern).
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Disable fsync (builder pattern).
    pub fn with_no_sync(mut self, no_sync: bool) -> Self {
        self.no_sync = no_sync;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), WalConfigError> {
        if self.max_segment_size == 0 {
            return Err(WalConfigError::ZeroSegmentSize);
        }
        if self.max_segments == 0 {
            return Err(WalConfigError::ZeroRetainedSegments);
        }
        if self.sync_interval.is_zero() {
            return Err(WalConfigError::ZeroSyncInterval);
        }
        Ok(())
    }

    /// Create a configuration optimized for testing (small segments, fast ticks).
    pub fn for_testing() -> Self {
        WalConfig {
            max_segment_size: 64 * 1024,
            max_segments: DEFAULT_MAX_SEGMENTS,
            sync_interval: Duration::from_millis(10),
            no_sync: true,
        }
    }
}

/// WAL configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalConfigError {
    /// Segment size is zero.
    #[error("Maximum segment size must be greater than zero")]
    ZeroSegmentSize,

    /// No segments would be retained.
    #[error("Maximum retained segments must be at least 1")]
    ZeroRetainedSegments,

    /// Sync interval is zero.
    #[error("Sync interval must be greater than zero")]
    ZeroSyncInterval,
}

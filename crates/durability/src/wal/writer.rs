//! Segmented WAL writer.
//!
//! Owns the current segment, assigns sequence numbers, and applies the
//! rotation and retention policy. The writer is not synchronized itself;
//! [`Wal`](crate::wal::Wal) wraps it in a mutex shared with the flush
//! scheduler so appends and syncs never interleave.
//!
//! # Rotation
//!
//! Before each write, if the current segment already holds data and the new
//! frame would push it past `max_segment_size`, the writer seals the segment
//! (flush + fsync) and opens the next ordinal. Frames are never split. A
//! frame larger than `max_segment_size` still goes into an empty segment on
//! its own.
//!
//! # Retention
//!
//! After every rotation the oldest segments are deleted until at most
//! `max_segments` remain. The current segment always has the highest
//! ordinal, so it is never a candidate.
//!
//! # Failure
//!
//! A failed segment write or rotation may leave a partial frame at the tail
//! of the current segment. The writer then refuses appends and rotations
//! with [`WalError::Degraded`] until it is reopened, because open truncates
//! the torn tail. Sync failures are not sticky: the buffer keeps the bytes
//! and the next sync retries them.

use crate::codec::EnvelopeCodec;
use crate::error::{WalError, WalResult};
use crate::format::{frame, latest_segment, list_segments_ascending, WalSegment};
use crate::wal::config::WalConfig;
use crate::wal::reader::WalReader;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Cumulative WAL operation counters.
///
/// These counters accumulate over the lifetime of the writer and are never
/// reset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalCounters {
    /// Successful appends
    pub appends: u64,
    /// Framed bytes written to segments
    pub bytes_written: u64,
    /// Successful fsync calls
    pub sync_calls: u64,
    /// Total nanoseconds spent flushing and syncing
    pub sync_nanos: u64,
    /// Flush or fsync attempts that failed
    pub sync_failures: u64,
    /// Segment rotations
    pub rotations: u64,
    /// Segments deleted by retention
    pub segments_removed: u64,
}

/// Append side of the WAL.
pub struct WalWriter {
    /// Current segment (None once closed)
    segment: Option<WalSegment>,

    /// WAL directory
    wal_dir: PathBuf,

    /// Configuration
    config: WalConfig,

    /// Envelope codec
    codec: Arc<dyn EnvelopeCodec>,

    /// Last assigned sequence number (0 for an empty log)
    last_sequence: u32,

    /// Whether bytes were written since the last successful sync
    has_unsynced_data: bool,

    /// Segment whose write or rotation failed; appends are refused once set
    degraded: Option<u64>,

    counters: WalCounters,
}

impl WalWriter {
    /// Attach to the WAL in `wal_dir`, which must already exist.
    ///
    /// An empty directory gets segment 0. Otherwise the highest segment is
    /// scanned, any torn tail past its last valid frame is truncated, and
    /// the segment is reopened for append. Numbering resumes after the last
    /// valid record.
    pub fn open(
        wal_dir: impl Into<PathBuf>,
        config: WalConfig,
        codec: Arc<dyn EnvelopeCodec>,
    ) -> WalResult<Self> {
        config.validate()?;
        let wal_dir = wal_dir.into();

        let (segment, last_sequence) = match latest_segment(&wal_dir)? {
            None => {
                let segment =
                    WalSegment::create(&wal_dir, 0).map_err(|e| WalError::segment_io(0, e))?;
                info!(target: "seglog::wal", dir = %wal_dir.display(), "Initialized new WAL");
                (segment, 0)
            }
            Some(last) => {
                let reader = WalReader::new(Arc::clone(&codec));
                let last_sequence = Self::recover_tail(&reader, &wal_dir, last)?;
                let segment = WalSegment::open_append(&wal_dir, last)
                    .map_err(|e| WalError::segment_io(last, e))?;
                info!(
                    target: "seglog::wal",
                    dir = %wal_dir.display(),
                    segment = last,
                    last_sequence,
                    "Resumed existing WAL"
                );
                (segment, last_sequence)
            }
        };

        Ok(WalWriter {
            segment: Some(segment),
            wal_dir,
            config,
            codec,
            last_sequence,
            has_unsynced_data: false,
            degraded: None,
            counters: WalCounters::default(),
        })
    }

    /// Scan the last segment, drop its torn tail, and return the last sequence.
    fn recover_tail(reader: &WalReader, wal_dir: &Path, last: u64) -> WalResult<u32> {
        let scan = reader.read_segment(wal_dir, last)?;

        if scan.is_torn() {
            warn!(
                target: "seglog::wal",
                segment = last,
                valid_end = scan.valid_end,
                torn_bytes = scan.torn_bytes(),
                reason = ?scan.stop_reason,
                "Truncating torn tail of last WAL segment"
            );
            WalSegment::truncate(wal_dir, last, scan.valid_end)
                .map_err(|e| WalError::segment_io(last, e))?;
        }

        match scan.last_sequence() {
            Some(sequence) => Ok(sequence),
            // Last segment is empty (fresh rotation): look further back
            None => Ok(reader.last_sequence_number(wal_dir)?),
        }
    }

    /// Append one payload and return its sequence number.
    ///
    /// The frame lands in the segment's in-memory buffer. It reaches disk on
    /// the next flush tick, an explicit [`WalWriter::sync`], a rotation, or
    /// close. On error nothing is committed: the sequence number is not
    /// consumed. A failed segment write degrades the writer.
    pub fn append(&mut self, payload: &[u8]) -> WalResult<u32> {
        self.check_writable()?;

        let sequence = self
            .last_sequence
            .checked_add(1)
            .ok_or(WalError::SequenceExhausted)?;

        let framed = frame(sequence, payload, self.codec.as_ref()).map_err(|e| {
            error!(
                target: "seglog::wal",
                sequence,
                payload_len = payload.len(),
                error = %e,
                "Failed to frame WAL record"
            );
            WalError::Framing(e)
        })?;

        self.maybe_rotate(framed.len() as u64)?;

        let segment = self.segment.as_mut().ok_or(WalError::Closed)?;
        let ordinal = segment.ordinal();
        if let Err(e) = segment.write(&framed) {
            return Err(self.degrade(ordinal, e));
        }

        self.last_sequence = sequence;
        self.has_unsynced_data = true;
        self.counters.appends += 1;
        self.counters.bytes_written += framed.len() as u64;

        Ok(sequence)
    }

    /// Rotate if a frame of `pending` bytes would overflow the current segment.
    ///
    /// Returns whether a rotation happened.
    pub fn maybe_rotate(&mut self, pending: u64) -> WalResult<bool> {
        let segment = self.segment.as_ref().ok_or(WalError::Closed)?;
        if segment.is_empty()
            || segment.size().saturating_add(pending) <= self.config.max_segment_size
        {
            return Ok(false);
        }
        self.rotate()?;
        Ok(true)
    }

    /// Seal the current segment, start the next ordinal, and apply retention.
    ///
    /// Rotates unconditionally, even if the current segment is empty. Fails
    /// without touching anything once the ordinal space is used up.
    pub fn rotate(&mut self) -> WalResult<()> {
        self.check_writable()?;

        let old = self.segment.as_ref().ok_or(WalError::Closed)?.ordinal();
        let next = old
            .checked_add(1)
            .ok_or(WalError::OrdinalsExhausted(old))?;

        self.sync_segment()?;

        let new_segment = match WalSegment::create(&self.wal_dir, next) {
            Ok(segment) => segment,
            Err(e) => return Err(self.degrade(next, e)),
        };

        if let Some(sealed) = self.segment.replace(new_segment) {
            if let Err(e) = sealed.close() {
                return Err(self.degrade(old, e));
            }
        }
        self.counters.rotations += 1;

        info!(target: "seglog::wal", from = old, to = next, "Rotated WAL segment");

        self.enforce_retention()?;
        Ok(())
    }

    fn check_writable(&self) -> WalResult<()> {
        if self.segment.is_none() {
            return Err(WalError::Closed);
        }
        match self.degraded {
            Some(segment) => Err(WalError::Degraded(segment)),
            None => Ok(()),
        }
    }

    /// Mark the writer degraded after a failed write or rotation.
    fn degrade(&mut self, segment: u64, source: std::io::Error) -> WalError {
        error!(
            target: "seglog::wal",
            segment,
            error = %source,
            "WAL segment I/O failed; refusing appends until reopen"
        );
        self.degraded = Some(segment);
        WalError::segment_io(segment, source)
    }

    /// Delete the oldest segments until at most `max_segments` remain.
    ///
    /// Returns the number of segments deleted. A segment that is already
    /// gone counts as deleted.
    pub fn enforce_retention(&mut self) -> WalResult<usize> {
        let segments = list_segments_ascending(&self.wal_dir)?;
        if segments.len() <= self.config.max_segments {
            return Ok(0);
        }

        let current = self.current_segment();
        let excess = segments.len() - self.config.max_segments;
        let mut removed = 0;

        for &ordinal in segments.iter().take(excess) {
            if Some(ordinal) == current {
                continue;
            }
            match WalSegment::remove(&self.wal_dir, ordinal) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!(target: "seglog::wal", segment = ordinal, "Segment already removed");
                }
                Err(e) => return Err(WalError::segment_io(ordinal, e)),
            }
            removed += 1;
            self.counters.segments_removed += 1;
        }

        info!(
            target: "seglog::wal",
            removed,
            retained = segments.len() - removed,
            oldest_retained = segments.get(removed).copied(),
            "Removed WAL segments beyond retention"
        );
        Ok(removed)
    }

    /// Flush and fsync (unless `no_sync`) if anything was written since the
    /// last sync.
    ///
    /// Returns `true` if a sync was performed.
    pub fn sync(&mut self) -> WalResult<bool> {
        if !self.has_unsynced_data {
            return Ok(false);
        }
        self.sync_segment()?;
        Ok(true)
    }

    /// Push buffered bytes to the OS without an fsync.
    ///
    /// After this, a reader sees every acknowledged append.
    pub fn flush_buffer(&mut self) -> WalResult<()> {
        let segment = self.segment.as_mut().ok_or(WalError::Closed)?;
        let ordinal = segment.ordinal();
        segment.flush().map_err(|e| WalError::segment_io(ordinal, e))
    }

    fn sync_segment(&mut self) -> WalResult<()> {
        let no_sync = self.config.no_sync;
        let segment = self.segment.as_mut().ok_or(WalError::Closed)?;
        let ordinal = segment.ordinal();

        let start = Instant::now();
        let result = segment.flush().and_then(|()| {
            if no_sync {
                Ok(())
            } else {
                segment.sync()
            }
        });
        let elapsed = start.elapsed();

        match result {
            Ok(()) => {
                if !no_sync {
                    self.counters.sync_calls += 1;
                }
                self.counters.sync_nanos += elapsed.as_nanos() as u64;
                self.has_unsynced_data = false;
                Ok(())
            }
            Err(e) => {
                self.counters.sync_failures += 1;
                Err(WalError::segment_io(ordinal, e))
            }
        }
    }

    /// Final flush + fsync, then release the segment.
    ///
    /// Later appends fail with [`WalError::Closed`]. Closing twice is a no-op.
    pub fn close(&mut self) -> WalResult<()> {
        if self.segment.is_none() {
            return Ok(());
        }
        let sync_result = self.sync_segment();

        if let Some(segment) = self.segment.take() {
            let ordinal = segment.ordinal();
            segment
                .close()
                .map_err(|e| WalError::segment_io(ordinal, e))?;
            info!(
                target: "seglog::wal",
                segment = ordinal,
                last_sequence = self.last_sequence,
                "Closed WAL"
            );
        }
        sync_result
    }

    /// Segment whose failure degraded the writer, if any.
    pub fn degraded(&self) -> Option<u64> {
        self.degraded
    }

    /// Whether [`WalWriter::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.segment.is_none()
    }

    /// Ordinal of the current segment, if open.
    pub fn current_segment(&self) -> Option<u64> {
        self.segment.as_ref().map(WalSegment::ordinal)
    }

    /// Logical size of the current segment in bytes, buffered bytes included.
    pub fn current_segment_size(&self) -> u64 {
        self.segment.as_ref().map(WalSegment::size).unwrap_or(0)
    }

    /// Last assigned sequence number (0 if nothing was ever appended).
    pub fn last_sequence(&self) -> u32 {
        self.last_sequence
    }

    /// Whether appends are waiting for a sync.
    pub fn has_unsynced_data(&self) -> bool {
        self.has_unsynced_data
    }

    /// Get a snapshot of cumulative counters.
    pub fn counters(&self) -> WalCounters {
        self.counters.clone()
    }

    /// Get the WAL directory path.
    pub fn wal_dir(&self) -> &Path {
        &self.wal_dir
    }

    /// Get the configuration.
    pub fn config(&self) -> &WalConfig {
        &self.config
    }

    /// List all segment ordinals on disk, ascending.
    pub fn list_segments(&self) -> WalResult<Vec<u64>> {
        Ok(list_segments_ascending(&self.wal_dir)?)
    }
}

impl Drop for WalWriter {
    fn drop(&mut self) {
        if self.has_unsynced_data && self.segment.is_some() {
            let _ = self.sync_segment();
        }
    }
}

impl std::fmt::Debug for WalWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalWriter")
            .field("wal_dir", &self.wal_dir)
            .field("segment", &self.segment)
            .field("last_sequence", &self.last_sequence)
            .field("has_unsynced_data", &self.has_unsynced_data)
            .field("degraded", &self.degraded)
            .finish_non_exhaustive()
    }
}

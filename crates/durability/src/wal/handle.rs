//! The `Wal` handle: one open write-ahead log directory.
//!
//! A `Wal` owns a [`WalWriter`] behind a mutex, the flush scheduler that
//! periodically syncs it, and an exclusive lock on the directory.
//!
//! # Durability
//!
//! [`Wal::append`] returns once the record is in the in-memory buffer. The
//! record becomes durable on the next scheduler tick (at most
//! `sync_interval` later), on [`Wal::flush`], on rotation, or on
//! [`Wal::close`]. Callers that need a record on stable storage before
//! moving on must call [`Wal::flush`] after appending. A crash before that
//! point can lose a suffix of acknowledged records, never a prefix, and
//! never reorders them.
//!
//! # Shutdown
//!
//! [`Wal::close`] stops and joins the scheduler first, then flushes and
//! closes the segment, so no tick can race the final sync. Dropping a `Wal`
//! does the same, ignoring errors.

use super::config::WalConfig;
use super::flush::FlushScheduler;
use super::reader::{WalReadResult, WalReader};
use super::writer::{WalCounters, WalWriter};
use crate::codec::{EnvelopeCodec, MsgPackCodec};
use crate::error::{WalError, WalResult};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Name of the exclusive lock file inside the WAL directory.
pub const LOCK_FILE_NAME: &str = ".lock";

/// Thread name of the background flush worker.
const FLUSH_THREAD_NAME: &str = "seglog-wal-flush";

/// An open, segmented write-ahead log.
///
/// `Wal` is `Send + Sync`; appends from several threads serialize on the
/// internal lock and receive strictly increasing sequence numbers.
pub struct Wal {
    /// WAL directory
    dir: PathBuf,

    /// Configuration the log was opened with
    config: WalConfig,

    /// Scanner for `read_all`/`scan`
    reader: WalReader,

    /// Append state, shared with the flush thread
    writer: Arc<Mutex<WalWriter>>,

    /// Background flush worker
    scheduler: FlushScheduler,

    /// Exclusive directory lock, held until close
    lock_file: Option<File>,

    /// Set once shutdown has run
    closed: bool,
}

impl Wal {
    /// Open (or create) the WAL in `dir` with the MessagePack envelope codec.
    pub fn open(dir: impl AsRef<Path>, config: WalConfig) -> WalResult<Self> {
        Self::open_with_codec(dir, config, Arc::new(MsgPackCodec))
    }

    /// Open (or create) the WAL in `dir` with a custom envelope codec.
    ///
    /// Creates the directory if needed, takes the directory lock, attaches
    /// to the highest segment (repairing a torn tail) or creates segment 0,
    /// and starts the flush scheduler.
    pub fn open_with_codec(
        dir: impl AsRef<Path>,
        config: WalConfig,
        codec: Arc<dyn EnvelopeCodec>,
    ) -> WalResult<Self> {
        config.validate()?;
        let dir = dir.as_ref().to_path_buf();

        std::fs::create_dir_all(&dir).map_err(|source| WalError::InvalidDirectory {
            path: dir.clone(),
            source,
        })?;

        let lock_file = Self::acquire_lock(&dir)?;

        let writer = WalWriter::open(&dir, config.clone(), Arc::clone(&codec))?;
        let writer = Arc::new(Mutex::new(writer));

        let scheduler = FlushScheduler::new(FLUSH_THREAD_NAME, config.sync_interval);
        let flushed = Arc::clone(&writer);
        scheduler.start(move || flushed.lock().sync())?;

        info!(
            target: "seglog::wal",
            dir = %dir.display(),
            codec = codec.codec_id(),
            max_segment_size = config.max_segment_size,
            max_segments = config.max_segments,
            sync_interval_ms = config.sync_interval.as_millis() as u64,
            no_sync = config.no_sync,
            "Opened WAL"
        );

        Ok(Wal {
            dir,
            config,
            reader: WalReader::new(codec),
            writer,
            scheduler,
            lock_file: Some(lock_file),
            closed: false,
        })
    }

    fn acquire_lock(dir: &Path) -> WalResult<File> {
        let lock_path = dir.join(LOCK_FILE_NAME);
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&lock_path)
            .map_err(|source| WalError::InvalidDirectory {
                path: dir.to_path_buf(),
                source,
            })?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| WalError::AlreadyLocked(dir.to_path_buf()))?;
        Ok(lock_file)
    }

    /// Append a payload and return its sequence number.
    ///
    /// The record is buffered, not yet durable; see the module docs.
    pub fn append(&self, payload: &[u8]) -> WalResult<u32> {
        self.writer.lock().append(payload)
    }

    /// All payloads in the log, in append order.
    ///
    /// Stops at the first corrupt or incomplete frame and returns what came
    /// before it. Use [`Wal::scan`] to learn whether that happened.
    pub fn read_all(&self) -> WalResult<Vec<Vec<u8>>> {
        Ok(self.scan()?.into_payloads())
    }

    /// Scan the whole log, with diagnostics about where and why it stopped.
    ///
    /// Flushes the write buffer under the append lock and notes the writer's
    /// position, then scans up to that position with the lock released. The
    /// scan sees every append acknowledged before the call; appends made
    /// while it runs are not blocked and are not included.
    pub fn scan(&self) -> WalResult<WalReadResult> {
        let (segment, len) = {
            let mut writer = self.writer.lock();
            writer.flush_buffer()?;
            let segment = writer.current_segment().ok_or(WalError::Closed)?;
            (segment, writer.current_segment_size())
        };
        Ok(self.reader.read_all_until(&self.dir, segment, len)?)
    }

    /// Seal the current segment and start a new one.
    pub fn rotate(&self) -> WalResult<()> {
        self.writer.lock().rotate()
    }

    /// Flush the buffer and fsync the current segment now.
    ///
    /// Every append that returned before this call is durable once it
    /// returns (unless `no_sync` is set).
    pub fn flush(&self) -> WalResult<()> {
        self.writer.lock().sync().map(|_| ())
    }

    /// Stop the scheduler, then flush, sync and close the current segment.
    pub fn close(mut self) -> WalResult<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> WalResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        self.scheduler.stop();
        let result = self.writer.lock().close();

        if let Some(lock_file) = self.lock_file.take() {
            if let Err(e) = FileExt::unlock(&lock_file) {
                debug!(target: "seglog::wal", error = %e, "Failed to release WAL directory lock");
            }
        }
        result
    }

    /// Snapshot of cumulative counters.
    pub fn counters(&self) -> WalCounters {
        self.writer.lock().counters()
    }

    /// WAL directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Configuration the log was opened with.
    pub fn config(&self) -> &WalConfig {
        &self.config
    }

    /// Ordinal of the segment currently being written.
    pub fn current_segment(&self) -> Option<u64> {
        self.writer.lock().current_segment()
    }

    /// Last assigned sequence number, 0 for an empty log.
    pub fn last_sequence_number(&self) -> u32 {
        self.writer.lock().last_sequence()
    }

    /// Segment ordinals on disk, ascending.
    pub fn list_segments(&self) -> WalResult<Vec<u64>> {
        self.writer.lock().list_segments()
    }
}

impl Drop for Wal {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(target: "seglog::wal", error = %e, "Error closing WAL on drop");
        }
    }
}

impl std::fmt::Debug for Wal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wal")
            .field("dir", &self.dir)
            .field("config", &self.config)
            .field("scheduler", &self.scheduler)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

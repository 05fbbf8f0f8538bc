//! WAL segment files: naming, directory scanning and the append handle.
//!
//! Segments are named `<ordinal>-segment.wal`. Ordinals start at 0, are not
//! zero-padded, and are always compared numerically, so `10-segment.wal`
//! sorts after `2-segment.wal`.
//!
//! # Segment Layout
//!
//! A segment has no header. It is a plain run of frames:
//!
//! ```text
//! ┌───────────────┬───────────────┬─────┐
//! │ Frame 1       │ Frame 2       │ ... │
//! └───────────────┴───────────────┴─────┘
//! ```

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// File name suffix shared by every segment.
pub const SEGMENT_SUFFIX: &str = "-segment.wal";

/// Capacity of the in-memory write buffer in front of the segment file.
pub const WRITE_BUFFER_CAPACITY: usize = 64 * 1024;

/// File name for the segment with the given ordinal.
pub fn segment_name(ordinal: u64) -> String {
    format!("{}{}", ordinal, SEGMENT_SUFFIX)
}

/// Full path of the segment with the given ordinal inside `dir`.
pub fn segment_path(dir: &Path, ordinal: u64) -> PathBuf {
    dir.join(segment_name(ordinal))
}

/// Parse the ordinal out of a segment file name.
///
/// Inverse of [`segment_name`]. Fails when there is no `-` separator or the
/// part before it is not a plain decimal integer.
pub fn parse_ordinal(name: &str) -> Result<u64, SegmentError> {
    let (prefix, _) = name
        .split_once('-')
        .ok_or_else(|| SegmentError::MalformedName(name.to_string()))?;

    // `str::parse` accepts a leading '+', which would make two names map to
    // the same ordinal.
    if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SegmentError::MalformedName(name.to_string()));
    }

    prefix
        .parse::<u64>()
        .map_err(|_| SegmentError::MalformedName(name.to_string()))
}

/// List the ordinals of all segment files in `dir`, in ascending numeric order.
///
/// Files that do not carry the segment suffix (the directory lock, editor
/// droppings) are ignored. A file that carries the suffix but whose ordinal
/// cannot be parsed is an error.
pub fn list_segments_ascending(dir: &Path) -> Result<Vec<u64>, SegmentError> {
    let mut segments = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();
        if name.ends_with(SEGMENT_SUFFIX) {
            segments.push(parse_ordinal(&name)?);
        }
    }

    segments.sort_unstable();
    Ok(segments)
}

/// Highest segment ordinal present in `dir`, if any.
pub fn latest_segment(dir: &Path) -> Result<Option<u64>, SegmentError> {
    Ok(list_segments_ascending(dir)?.last().copied())
}

/// Flush directory metadata so created and removed segments survive a crash.
#[cfg(unix)]
pub fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

/// Directory fsync is not supported on this platform.
#[cfg(not(unix))]
pub fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

/// The segment currently open for writing.
///
/// Writes go into an in-memory buffer first. [`WalSegment::flush`] pushes
/// them to the OS and [`WalSegment::sync`] makes them durable. There is at
/// most one writable segment per WAL.
pub struct WalSegment {
    /// Buffered writer over the append-mode file handle
    writer: BufWriter<File>,

    /// Segment ordinal
    ordinal: u64,

    /// Logical size: bytes on disk at open plus bytes written since
    size: u64,

    /// Path to segment file
    path: PathBuf,
}

impl WalSegment {
    /// Create a new, empty segment.
    ///
    /// Fails with `AlreadyExists` if the file is already present.
    pub fn create(dir: &Path, ordinal: u64) -> std::io::Result<Self> {
        let path = segment_path(dir, ordinal);

        let file = OpenOptions::new()
            .create_new(true)
            .append(true)
            .open(&path)?;
        sync_dir(dir)?;

        Ok(WalSegment {
            writer: BufWriter::with_capacity(WRITE_BUFFER_CAPACITY, file),
            ordinal,
            size: 0,
            path,
        })
    }

    /// Open a segment for appending, creating it if absent.
    ///
    /// The handle is positioned at end of file so writes always extend the
    /// segment, whatever it already holds.
    pub fn open_append(dir: &Path, ordinal: u64) -> std::io::Result<Self> {
        let path = segment_path(dir, ordinal);

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        let size = file.seek(SeekFrom::End(0))?;

        Ok(WalSegment {
            writer: BufWriter::with_capacity(WRITE_BUFFER_CAPACITY, file),
            ordinal,
            size,
            path,
        })
    }

    /// Open a segment read-only, positioned at its first byte.
    pub fn open_read(dir: &Path, ordinal: u64) -> std::io::Result<File> {
        OpenOptions::new()
            .read(true)
            .open(segment_path(dir, ordinal))
    }

    /// Delete a segment file.
    pub fn remove(dir: &Path, ordinal: u64) -> std::io::Result<()> {
        std::fs::remove_file(segment_path(dir, ordinal))?;
        sync_dir(dir)
    }

    /// Cut a segment file down to `len` bytes and make the new length durable.
    ///
    /// Used at open time to drop a torn tail before appending resumes.
    pub fn truncate(dir: &Path, ordinal: u64, len: u64) -> std::io::Result<()> {
        let file = OpenOptions::new()
            .write(true)
            .open(segment_path(dir, ordinal))?;
        file.set_len(len)?;
        file.sync_all()
    }

    /// Segment ordinal.
    pub fn ordinal(&self) -> u64 {
        self.ordinal
    }

    /// Logical segment size in bytes, including buffered bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Whether nothing has ever been written to this segment.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Get the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes sitting in the in-memory buffer.
    pub fn buffered_len(&self) -> usize {
        self.writer.buffer().len()
    }

    /// Write bytes into the buffer and advance the logical size.
    pub fn write(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.writer.write_all(data)?;
        self.size += data.len() as u64;
        Ok(())
    }

    /// Push buffered bytes to the OS.
    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }

    /// fsync the segment file. Does not flush the buffer.
    pub fn sync(&mut self) -> std::io::Result<()> {
        self.writer.get_ref().sync_all()
    }

    /// Flush the buffer and release the file handle.
    pub fn close(mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl std::fmt::Debug for WalSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalSegment")
            .field("ordinal", &self.ordinal)
            .field("size", &self.size)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Segment naming and scanning errors.
#[derive(Debug, thiserror::Error)]
pub enum SegmentError {
    /// A file carries the segment suffix but no parsable ordinal
    #[error("Malformed segment name: {0}")]
    MalformedName(String),

    /// Directory or file access failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

//! Shared helpers for the WAL integration tests.
//!
//! Import via `mod common;`.

#![allow(dead_code)]

use seglog_durability::format::segment_path;
use seglog_durability::{frame, MsgPackCodec, WalConfig, WalReadResult, WalReader};
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Arc, Once};
use std::time::Duration;

static INIT_TRACING: Once = Once::new();

/// Route `tracing` output through the test harness.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// Test config with a sync interval long enough that no tick fires mid-test.
pub fn quiet_config() -> WalConfig {
    WalConfig::for_testing().with_sync_interval(Duration::from_secs(3600))
}

/// Scan a directory with a fresh reader, bypassing any open handle.
pub fn scan_dir(dir: &Path) -> WalReadResult {
    WalReader::new(Arc::new(MsgPackCodec)).read_all(dir).unwrap()
}

/// Framed size of one record with the default codec.
pub fn frame_len(sequence: u32, payload: &[u8]) -> u64 {
    frame(sequence, payload, &MsgPackCodec).unwrap().len() as u64
}

/// Append raw bytes to a segment file.
pub fn append_bytes(dir: &Path, segment: u64, bytes: &[u8]) {
    let mut file = OpenOptions::new()
        .append(true)
        .open(segment_path(dir, segment))
        .unwrap();
    file.write_all(bytes).unwrap();
    file.sync_all().unwrap();
}

/// XOR one byte of a segment file in place. Negative offsets count from the end.
pub fn flip_byte(dir: &Path, segment: u64, offset: i64, mask: u8) {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(segment_path(dir, segment))
        .unwrap();
    let pos = if offset < 0 {
        SeekFrom::End(offset)
    } else {
        SeekFrom::Start(offset as u64)
    };
    let at = file.seek(pos).unwrap();
    let mut buf = [0u8; 1];
    file.read_exact(&mut buf).unwrap();
    buf[0] ^= mask;
    file.seek(SeekFrom::Start(at)).unwrap();
    file.write_all(&buf).unwrap();
    file.sync_all().unwrap();
}

/// Cut a segment file to `len` bytes.
pub fn truncate_segment(dir: &Path, segment: u64, len: u64) {
    let file = OpenOptions::new()
        .write(true)
        .open(segment_path(dir, segment))
        .unwrap();
    file.set_len(len).unwrap();
}

/// Size of a segment file on disk.
pub fn segment_len(dir: &Path, segment: u64) -> u64 {
    std::fs::metadata(segment_path(dir, segment)).unwrap().len()
}

/// Copy every segment file from `from` into `to`, as a crash would leave them.
pub fn copy_segments(from: &Path, to: &Path) {
    std::fs::create_dir_all(to).unwrap();
    for ordinal in seglog_durability::list_segments_ascending(from).unwrap() {
        std::fs::copy(segment_path(from, ordinal), segment_path(to, ordinal)).unwrap();
    }
}

/// Payloads as UTF-8 strings, for readable assertions.
pub fn as_strings(payloads: Vec<Vec<u8>>) -> Vec<String> {
    payloads
        .into_iter()
        .map(|p| String::from_utf8(p).unwrap())
        .collect()
}

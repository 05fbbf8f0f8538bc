//! End-to-end WAL scenarios
//!
//! - Fresh directory, append, close, reopen, read back
//! - Crash before a scheduled sync loses only a suffix
//! - Tiny segments force one frame per segment
//! - Retention keeps only the newest segments

mod common;

use common::*;
use seglog_durability::format::segment_path;
use seglog_durability::{Wal, WalConfig};
use tempfile::TempDir;

#[test]
fn test_fresh_open_append_reopen() {
    init_tracing();
    let temp = TempDir::new().unwrap();

    let wal = Wal::open(temp.path(), WalConfig::default()).unwrap();
    assert!(segment_path(temp.path(), 0).exists());
    assert_eq!(wal.append(b"hello").unwrap(), 1);
    wal.close().unwrap();

    let wal = Wal::open(temp.path(), WalConfig::default()).unwrap();
    assert_eq!(as_strings(wal.read_all().unwrap()), vec!["hello"]);
    assert_eq!(wal.last_sequence_number(), 1);
    wal.close().unwrap();
}

#[test]
fn test_crash_before_sync_loses_everything_buffered() {
    init_tracing();
    let temp = TempDir::new().unwrap();
    let live = temp.path().join("live");
    let crashed = temp.path().join("crashed");

    let wal = Wal::open(&live, quiet_config()).unwrap();
    wal.append(b"a").unwrap();
    wal.append(b"b").unwrap();
    wal.append(b"c").unwrap();

    // The disk as it stands at the moment of the crash
    copy_segments(&live, &crashed);
    wal.close().unwrap();

    let recovered = Wal::open(&crashed, quiet_config()).unwrap();
    assert!(recovered.read_all().unwrap().is_empty());
    assert_eq!(recovered.append(b"next").unwrap(), 1);
    recovered.close().unwrap();
}

#[test]
fn test_crash_after_partial_sync_keeps_prefix() {
    init_tracing();
    let temp = TempDir::new().unwrap();
    let live = temp.path().join("live");
    let crashed = temp.path().join("crashed");

    let wal = Wal::open(&live, quiet_config()).unwrap();
    wal.append(b"a").unwrap();
    wal.flush().unwrap();
    wal.append(b"b").unwrap();
    wal.append(b"c").unwrap();

    copy_segments(&live, &crashed);
    wal.close().unwrap();

    let recovered = Wal::open(&crashed, quiet_config()).unwrap();
    assert_eq!(as_strings(recovered.read_all().unwrap()), vec!["a"]);
    assert_eq!(recovered.append(b"b2").unwrap(), 2);
    recovered.close().unwrap();
}

#[test]
fn test_crash_mid_write_keeps_prefix_in_order() {
    init_tracing();
    let temp = TempDir::new().unwrap();
    let live = temp.path().join("live");
    let crashed = temp.path().join("crashed");

    let wal = Wal::open(&live, quiet_config()).unwrap();
    for payload in ["a", "b", "c"] {
        wal.append(payload.as_bytes()).unwrap();
    }
    wal.flush().unwrap();
    copy_segments(&live, &crashed);
    wal.close().unwrap();

    // The third frame only made it halfway
    let full = segment_len(&crashed, 0);
    truncate_segment(&crashed, 0, full - frame_len(3, b"c") / 2);

    let recovered = Wal::open(&crashed, quiet_config()).unwrap();
    assert_eq!(as_strings(recovered.read_all().unwrap()), vec!["a", "b"]);
    recovered.close().unwrap();
}

#[test]
fn test_every_record_rotates_into_its_own_segment() {
    init_tracing();
    let temp = TempDir::new().unwrap();
    let config = WalConfig::for_testing().with_max_segment_size(frame_len(1, b"r1"));

    let wal = Wal::open(temp.path(), config.clone()).unwrap();
    for payload in ["r1", "r2", "r3"] {
        wal.append(payload.as_bytes()).unwrap();
    }
    wal.close().unwrap();

    let wal = Wal::open(temp.path(), config).unwrap();
    assert_eq!(wal.list_segments().unwrap(), vec![0, 1, 2]);
    wal.close().unwrap();

    let reader = seglog_durability::WalReader::new(std::sync::Arc::new(
        seglog_durability::MsgPackCodec,
    ));
    for (ordinal, expected) in [(0u64, "r1"), (1, "r2"), (2, "r3")] {
        let scan = reader.read_segment(temp.path(), ordinal).unwrap();
        assert_eq!(scan.records.len(), 1);
        assert_eq!(scan.records[0].payload, expected.as_bytes());
        assert!(!scan.is_torn());
    }
}

#[test]
fn test_retention_keeps_two_newest_segments() {
    init_tracing();
    let temp = TempDir::new().unwrap();
    let config = WalConfig::for_testing().with_max_segments(2);

    let wal = Wal::open(temp.path(), config).unwrap();
    for i in 0..3 {
        wal.append(format!("before-rotation-{i}").as_bytes()).unwrap();
        wal.rotate().unwrap();
    }

    assert_eq!(wal.list_segments().unwrap(), vec![2, 3]);
    assert!(!segment_path(temp.path(), 0).exists());
    assert!(!segment_path(temp.path(), 1).exists());

    // Only the record written into segment 2 survives
    assert_eq!(as_strings(wal.read_all().unwrap()), vec!["before-rotation-2"]);
    wal.close().unwrap();
}

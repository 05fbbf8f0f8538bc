//! WAL append and recovery benchmarks
//!
//! ## Benchmark Groups
//!
//! - `wal_append/*`: buffered append throughput by payload size (no fsync on the path)
//! - `wal_append_flush/*`: append followed by an explicit flush + fsync
//! - `wal_read_all/*`: full recovery scan by record count
//!
//! ## Running
//!
//! ```bash
//! cargo bench --bench wal_append
//! cargo bench --bench wal_append -- "wal_read_all"  # specific group
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use seglog::{Wal, WalConfig};
use std::time::Duration;
use tempfile::TempDir;

const PAYLOAD_SIZES: [usize; 3] = [64, 1024, 16 * 1024];

fn bench_config() -> WalConfig {
    WalConfig::default()
        .with_max_segment_size(16 * 1000 * 1000)
        .with_sync_interval(Duration::from_millis(100))
}

fn wal_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("wal_append");

    for size in PAYLOAD_SIZES {
        let temp = TempDir::new().unwrap();
        let wal = Wal::open(temp.path(), bench_config()).unwrap();
        let payload = vec![0xA5u8; size];

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            b.iter(|| black_box(wal.append(payload).unwrap()));
        });

        wal.close().unwrap();
    }

    group.finish();
}

fn wal_append_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("wal_append_flush");
    group.sample_size(20);

    let temp = TempDir::new().unwrap();
    let wal = Wal::open(temp.path(), bench_config()).unwrap();
    let payload = vec![0x5Au8; 256];

    group.bench_function("256b", |b| {
        b.iter(|| {
            black_box(wal.append(&payload).unwrap());
            wal.flush().unwrap();
        });
    });

    wal.close().unwrap();
    group.finish();
}

fn wal_read_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("wal_read_all");
    group.sample_size(20);

    for records in [1_000usize, 10_000] {
        let temp = TempDir::new().unwrap();
        let wal = Wal::open(temp.path(), bench_config()).unwrap();
        for i in 0..records {
            wal.append(format!("record-{i:08}").as_bytes()).unwrap();
        }
        wal.flush().unwrap();

        group.throughput(Throughput::Elements(records as u64));
        group.bench_with_input(BenchmarkId::from_parameter(records), &records, |b, &n| {
            b.iter(|| {
                let payloads = wal.read_all().unwrap();
                assert_eq!(payloads.len(), n);
                black_box(payloads)
            });
        });

        wal.close().unwrap();
    }

    group.finish();
}

criterion_group!(benches, wal_append, wal_append_flush, wal_read_all);
criterion_main!(benches);

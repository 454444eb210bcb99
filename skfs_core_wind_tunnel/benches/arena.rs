// Copyright 2026 the Skfs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use skfs_core::arena::ArenaWriter;
use skfs_core::{File, FileInterner};

/// Entry point for the core crate's wind-tunnel benchmarks: interning throughput (with and
/// without duplicate collapsing) and the on-disk arena's write/commit/read path.
fn bench_arena(c: &mut Criterion) {
    bench_intern_distinct(c);
    bench_intern_duplicates(c);
    bench_arena_commit(c);
    bench_arena_record_at(c);
}

/// Interning `n` distinct integers: every call grows the interner by one entry.
fn bench_intern_distinct(c: &mut Criterion) {
    let mut group = c.benchmark_group("intern_distinct");
    for &n in &[100_usize, 10_000, 100_000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let mut interner = FileInterner::new();
                for i in 0..n {
                    black_box(interner.intern(File::Int(i as i64)));
                }
                interner
            });
        });
    }
    group.finish();
}

/// Interning the same `k` values `n` times: every call after the first `k` should hit the
/// structural-equality fast path instead of growing the interner.
fn bench_intern_duplicates(c: &mut Criterion) {
    let mut group = c.benchmark_group("intern_duplicates");
    let k = 64;
    for &n in &[1_000_usize, 100_000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let mut interner = FileInterner::new();
                for i in 0..n {
                    black_box(interner.intern(File::Int((i % k) as i64)));
                }
                assert_eq!(interner.len(), k);
            });
        });
    }
    group.finish();
}

/// Building and committing an arena image with `n` small records.
///
/// Exercises the "accumulate in memory, then one write + rename" commit path, which is the cost
/// this design pays to make a crash mid-persist never corrupt the previous arena file.
fn bench_arena_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("arena_commit");
    for &n in &[100_usize, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let mut writer = ArenaWriter::new();
                let mut last = 0;
                for i in 0..n {
                    last = writer.write_record(&(i as u64).to_le_bytes());
                }
                let path = std::env::temp_dir().join(format!(
                    "skfs-arena-bench-{}-{}",
                    std::process::id(),
                    black_box(n)
                ));
                writer.commit(&path, last).unwrap();
                std::fs::remove_file(&path).unwrap();
            });
        });
    }
    group.finish();
}

/// Random-access `record_at` reads against a committed, memory-mapped arena of `n` records.
fn bench_arena_record_at(c: &mut Criterion) {
    let mut group = c.benchmark_group("arena_record_at");
    for &n in &[1_000_usize, 100_000] {
        let mut writer = ArenaWriter::new();
        let offsets: Vec<u64> =
            (0..n).map(|i| writer.write_record(&(i as u64).to_le_bytes())).collect();
        let path =
            std::env::temp_dir().join(format!("skfs-arena-bench-read-{}-{n}", std::process::id()));
        writer.commit(&path, offsets[offsets.len() - 1]).unwrap();
        let arena = skfs_core::arena::Arena::open(&path).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            let mut idx = 0_usize;
            b.iter(|| {
                idx = (idx + 1) % offsets.len();
                black_box(arena.record_at(offsets[idx]).unwrap());
            });
        });

        std::fs::remove_file(&path).unwrap();
    }
    group.finish();
}

criterion_group!(benches, bench_arena);
criterion_main!(benches);

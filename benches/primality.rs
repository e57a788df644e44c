//! Criterion benchmark: trial-division predicate and the scan loop.
//! Run with: cargo bench --bench primality

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use primescan::services::{ScanControl, is_prime, scan_segment};
use std::hint::black_box;

fn bench_is_prime(c: &mut Criterion) {
    let mut group = c.benchmark_group("is_prime");
    // Primes are the worst case: every divisor up to n / 2 is tried
    for n in [97i64, 7_919, 104_729, 1_299_709] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| is_prime(black_box(n)));
        });
    }
    group.finish();
}

fn bench_scan_segment(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan_segment");
    for end in [1_000i64, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(end), &end, |b, &end| {
            let control = ScanControl::new();
            let checkpoint = control.checkpoint();
            b.iter(|| {
                let mut found = 0u64;
                let outcome = scan_segment(1, black_box(end), &checkpoint, |_| found += 1);
                black_box((outcome, found))
            });
        });
    }
    group.finish();
}

criterion_group!(primality, bench_is_prime, bench_scan_segment);
criterion_main!(primality);

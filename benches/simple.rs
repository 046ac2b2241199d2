//! Uncontended enter/exit cost.
//!
//! Run with: `cargo bench --bench simple`

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use rw_guard::{ReadWriteGuard, ReaderId, WriterId};

const ITER: u64 = 10_000;

fn bench_reads(c: &mut Criterion) {
    let guard = ReadWriteGuard::new(0u64);
    let mut group = c.benchmark_group("uncontended");
    group.throughput(Throughput::Elements(ITER));

    group.bench_function("reads", |b| {
        b.iter(|| {
            for i in 0..ITER {
                black_box(guard.read(ReaderId(0), |value| *value + i));
            }
        });
    });

    group.bench_function("writes", |b| {
        b.iter(|| {
            for _ in 0..ITER {
                guard.write(WriterId(0), |value| *value += 1);
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_reads);
criterion_main!(benches);

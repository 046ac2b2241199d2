//! Readers and writers contending for one guard.
//!
//! Run with: `cargo bench --bench many`

use std::sync::{Arc, Barrier};
use std::thread::{spawn, JoinHandle};

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use rw_guard::{ReadWriteGuard, ReaderId, WriterId};

const ITER: u64 = 1_000;

fn thread_reader(thread_idx: u32, iter_count: u64, guard: Arc<ReadWriteGuard<i64>>) {
    for _ in 0..black_box(iter_count) {
        black_box(guard.read(ReaderId(thread_idx), |value| *value));
    }
}

fn thread_writer(thread_idx: u32, iter_count: u64, guard: Arc<ReadWriteGuard<i64>>) {
    for _ in 0..black_box(iter_count) {
        guard.write(WriterId(thread_idx), |value| {
            if thread_idx % 2 == 0 {
                *value += 1
            } else {
                *value -= 1
            }
        });
    }
}

fn run_multithreaded(iter_count: u64, readers: u32, writers: u32) {
    let guard = Arc::new(ReadWriteGuard::new(0i64));
    let start_barrier = Arc::new(Barrier::new((readers + writers) as usize));

    let mut threads: Vec<JoinHandle<()>> = (0..readers).map(|idx| {
        let guard = guard.clone();
        let start_barrier = start_barrier.clone();
        spawn(move || {
            start_barrier.wait();
            thread_reader(idx, iter_count, guard)
        })
    }).collect();

    threads.extend((0..writers).map(|idx| {
        let guard = guard.clone();
        let start_barrier = start_barrier.clone();
        spawn(move || {
            start_barrier.wait();
            thread_writer(idx, iter_count, guard)
        })
    }));

    for thread in threads {
        thread.join().expect("bench thread panicked");
    }

    let mut counter = guard.read(ReaderId(0), |value| *value);
    if writers % 2 == 1 {
        counter -= iter_count as i64
    }

    assert_eq!(counter, 0, "At the end, we must have 0 items left in the counter");
}

fn bench_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended");
    group.sample_size(20);

    for &(readers, writers) in &[(10, 3), (0, 2), (1, 0), (15, 1), (1, 15), (64, 1), (64, 64)] {
        group.throughput(Throughput::Elements(ITER * u64::from(readers + writers)));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}r_{}w", readers, writers)),
            &(readers, writers),
            |b, &(readers, writers)| b.iter(|| run_multithreaded(ITER, readers, writers)),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_contended);
criterion_main!(benches);

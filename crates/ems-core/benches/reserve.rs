//! Benchmark: reserve throughput under contention
//!
//! Compares N threads reserving seats on one shared event against N
//! threads each working on their own event. The first case serializes on
//! one event lock; the second only shares the store read lock.

use std::sync::Arc;
use std::thread;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use ems_core::{EventId, EventStore, ReservationEngine, Seat};

const SEATS_PER_THREAD: usize = 64;

fn setup(threads: usize, shared: bool) -> ReservationEngine {
    let engine = ReservationEngine::new(Arc::new(EventStore::default()));
    if shared {
        engine
            .create(EventId::new(0), threads, SEATS_PER_THREAD)
            .unwrap();
    } else {
        for t in 0..threads {
            engine
                .create(EventId::new(t as u32), 1, SEATS_PER_THREAD)
                .unwrap();
        }
    }
    engine
}

fn run(engine: ReservationEngine, threads: usize, shared: bool) {
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let engine = engine.clone();
            thread::spawn(move || {
                let (event, row) = if shared {
                    (EventId::new(0), t + 1)
                } else {
                    (EventId::new(t as u32), 1)
                };
                for col in 1..=SEATS_PER_THREAD {
                    black_box(engine.reserve(event, &[Seat::new(row, col)]).unwrap());
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
}

fn bench_reserve_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("reserve_contention");

    for threads in [1, 4, 8] {
        group.throughput(Throughput::Elements((threads * SEATS_PER_THREAD) as u64));

        group.bench_with_input(BenchmarkId::new("one_event", threads), &threads, |b, &n| {
            b.iter_batched(|| setup(n, true), |engine| run(engine, n, true), BatchSize::PerIteration);
        });

        group.bench_with_input(BenchmarkId::new("many_events", threads), &threads, |b, &n| {
            b.iter_batched(|| setup(n, false), |engine| run(engine, n, false), BatchSize::PerIteration);
        });
    }

    group.finish();
}

fn bench_rejected_reserve(c: &mut Criterion) {
    let engine = setup(1, true);
    engine.reserve(EventId::new(0), &[Seat::new(1, 1)]).unwrap();
    let request: Vec<Seat> = (1..=SEATS_PER_THREAD).map(|col| Seat::new(1, col)).collect();

    // Validation walks every seat before hitting the conflict on (1,1).
    c.bench_function("reserve_rejected/64", |b| {
        b.iter(|| black_box(engine.reserve(EventId::new(0), &request).is_err()));
    });
}

criterion_group!(benches, bench_reserve_contention, bench_rejected_reserve);
criterion_main!(benches);

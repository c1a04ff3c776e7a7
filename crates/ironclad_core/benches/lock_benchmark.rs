//! # Shared-Component Lock Benchmark
//!
//! Uncontended acquire/release cost of both lock flavors, and the writer's
//! latency while a reader thread keeps hammering the same component.

#![allow(missing_docs)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ironclad_core::{LockMode, RawLock, RawRwLock, RawSpinRwLock, RwLock, ScopedLock, SpinRwLock};

fn bench_uncontended_raw(c: &mut Criterion) {
    let blocking = RawRwLock::new();
    c.bench_function("raw_rwlock_read_uncontended", |b| {
        b.iter(|| {
            let guard = ScopedLock::new(&blocking, LockMode::Read);
            black_box(guard.owns_lock())
        });
    });

    let spin = RawSpinRwLock::new();
    c.bench_function("spin_rwlock_read_uncontended", |b| {
        b.iter(|| {
            let guard = ScopedLock::new(&spin, LockMode::Read);
            black_box(guard.owns_lock())
        });
    });

    c.bench_function("spin_rwlock_write_uncontended", |b| {
        b.iter(|| {
            spin.lock(LockMode::Write);
            spin.unlock(LockMode::Write);
        });
    });
}

fn bench_writer_under_read_pressure(c: &mut Criterion) {
    let position = Arc::new(RwLock::new((0.0f32, 0.0f32)));
    let stop = Arc::new(AtomicBool::new(false));
    let reader = {
        let position = Arc::clone(&position);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                black_box(*position.read());
            }
        })
    };

    c.bench_function("rwlock_write_under_reader", |b| {
        b.iter(|| {
            let mut guard = position.write();
            guard.0 += 1.0;
        });
    });

    stop.store(true, Ordering::Relaxed);
    reader.join().expect("reader thread panicked");
}

fn bench_spin_writer_under_read_pressure(c: &mut Criterion) {
    let position = Arc::new(SpinRwLock::new((0.0f32, 0.0f32)));
    let stop = Arc::new(AtomicBool::new(false));
    let reader = {
        let position = Arc::clone(&position);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                black_box(*position.read());
            }
        })
    };

    c.bench_function("spin_rwlock_write_under_reader", |b| {
        b.iter(|| {
            let mut guard = position.write();
            guard.0 += 1.0;
        });
    });

    stop.store(true, Ordering::Relaxed);
    reader.join().expect("reader thread panicked");
}

criterion_group!(
    benches,
    bench_uncontended_raw,
    bench_writer_under_read_pressure,
    bench_spin_writer_under_read_pressure,
);

criterion_main!(benches);

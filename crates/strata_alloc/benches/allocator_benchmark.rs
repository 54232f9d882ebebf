//! # Allocator Benchmark
//!
//! One frame = allocate N objects, then release all of them.
//! Each allocator is measured against plain `Box` for the three workload
//! object sizes (100, 1487 and 10000 bytes).
//!
//! Run with: `cargo bench --package strata_alloc`

// Benchmarks don't need strict docs
#![allow(missing_docs)]

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use strata_alloc::{BuddyAllocator, BuddyConfig, PoolAllocator, StackAllocator};

const OBJECTS_PER_FRAME: usize = 1_000;

/// Pool vs Box for the small object.
fn bench_pool_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_frame_100b");
    let mut pool: PoolAllocator<[u8; 100]> =
        PoolAllocator::new("bench", OBJECTS_PER_FRAME).unwrap();
    let mut handles = Vec::with_capacity(OBJECTS_PER_FRAME);

    group.bench_function("pool", |b| {
        b.iter(|| {
            for i in 0..OBJECTS_PER_FRAME {
                handles.push(pool.allocate([i as u8; 100]).unwrap());
            }
            black_box(pool.usage_count());
            pool.free_all(&handles);
            handles.clear();
        });
    });

    group.bench_function("box", |b| {
        b.iter(|| {
            let boxes: Vec<Box<[u8; 100]>> = (0..OBJECTS_PER_FRAME)
                .map(|i| Box::new([i as u8; 100]))
                .collect();
            black_box(boxes.len());
        });
    });

    group.finish();
}

/// Stack arena vs Box for the medium object.
fn bench_stack_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("stack_frame_1487b");
    let mut arena = StackAllocator::create(4 * 1024 * 1024).unwrap();

    group.bench_function("stack", |b| {
        b.iter(|| {
            for i in 0..OBJECTS_PER_FRAME {
                black_box(arena.alloc([i as u8; 1487]).unwrap());
            }
            arena.clean_up();
        });
    });

    group.bench_function("box", |b| {
        b.iter(|| {
            let boxes: Vec<Box<[u8; 1487]>> = (0..OBJECTS_PER_FRAME)
                .map(|i| Box::new([i as u8; 1487]))
                .collect();
            black_box(boxes.len());
        });
    });

    group.finish();
}

/// Buddy vs boxed slices across all three object sizes.
fn bench_buddy_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("buddy_frame");
    let mut buddy = BuddyAllocator::new(BuddyConfig::default()).unwrap();
    let mut blocks = Vec::with_capacity(OBJECTS_PER_FRAME);

    for size in [100usize, 1487, 10_000] {
        group.bench_with_input(BenchmarkId::new("buddy", size), &size, |b, &size| {
            b.iter(|| {
                for _ in 0..OBJECTS_PER_FRAME {
                    blocks.push(buddy.alloc(size).unwrap());
                }
                for block in blocks.drain(..).rev() {
                    buddy.free(block.offset(), size).unwrap();
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("box", size), &size, |b, &size| {
            b.iter(|| {
                let boxes: Vec<Box<[u8]>> = (0..OBJECTS_PER_FRAME)
                    .map(|_| vec![0u8; size].into_boxed_slice())
                    .collect();
                black_box(boxes.len());
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_pool_frame,
    bench_stack_frame,
    bench_buddy_frame
);
criterion_main!(benches);

//! # Allocator Micro-Benchmarks
//!
//! The substrate's promise is O(1) alloc/free with zero heap traffic.
//! These benches keep that honest against the general-purpose heap.
//!
//! Run with: `cargo bench --package ember_core`

// Benchmarks don't need docs and may have intentionally unused code
#![allow(missing_docs)]
#![allow(dead_code)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ember_core::{FrameAllocator, PoolAllocator, StackAllocator};

/// Blocks cycled per measured iteration.
const CYCLE: usize = 1024;

/// Benchmark: pool alloc/free churn at full depth.
fn bench_pool_churn(c: &mut Criterion) {
    let pool = PoolAllocator::new(64, CYCLE);
    let mut blocks = Vec::with_capacity(CYCLE);

    c.bench_function("pool_churn_1024x64B", |b| {
        b.iter(|| {
            for _ in 0..CYCLE {
                blocks.push(pool.alloc().expect("pool sized for the cycle"));
            }
            for block in blocks.drain(..) {
                pool.free_block(black_box(block));
            }
        });
    });
}

/// Benchmark: stack bump allocation with a clear per cycle.
fn bench_stack_bump(c: &mut Criterion) {
    let stack = StackAllocator::new(CYCLE * 64);

    c.bench_function("stack_bump_1024x64B", |b| {
        b.iter(|| {
            for _ in 0..CYCLE {
                black_box(stack.alloc(64).expect("stack sized for the cycle"));
            }
            stack.clear();
        });
    });
}

/// Benchmark: the per-frame swap/clear/alloc protocol.
fn bench_frame_protocol(c: &mut Criterion) {
    let frame = FrameAllocator::new(CYCLE * 64);

    c.bench_function("frame_swap_clear_alloc", |b| {
        b.iter(|| {
            frame.swap_buffers();
            frame.clear_current_buffer();
            for _ in 0..CYCLE {
                black_box(frame.alloc(64).expect("frame sized for the cycle"));
            }
        });
    });
}

criterion_group!(
    benches,
    bench_pool_churn,
    bench_stack_bump,
    bench_frame_protocol
);
criterion_main!(benches);

//! Transaction scope pool throughput (spec §4.8).
//!
//! ## Operations tested
//!
//! 1. **Acquire/detach/drop** under a warm pool (no cache misses)
//! 2. **Acquire under contention** - a pool much smaller than the
//!    concurrent acquirer count, forcing heap fallback

use std::sync::Arc;
use std::thread;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use engine_core::transaction::scope_pool::ScopePool;

fn acquire_detach_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("scope_pool/acquire_detach");
    let pool = ScopePool::new(64);

    group.bench_function("acquire_then_detach", |b| {
        b.iter(|| {
            let scope = pool.acquire();
            black_box(scope.detach());
        });
    });

    group.bench_function("acquire_then_drop", |b| {
        b.iter(|| {
            let scope = pool.acquire();
            drop(black_box(scope));
        });
    });

    group.finish();
}

fn contended_acquire_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("scope_pool/contended_acquire");
    group.sample_size(20);

    group.bench_function("four_threads_over_small_pool", |b| {
        b.iter(|| {
            let pool = ScopePool::new(4);
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let pool = Arc::clone(&pool);
                    thread::spawn(move || {
                        for _ in 0..64 {
                            let scope = pool.acquire();
                            black_box(scope.detach());
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
            black_box(pool.cache_misses());
        });
    });

    group.finish();
}

criterion_group!(benches, acquire_detach_bench, contended_acquire_bench);
criterion_main!(benches);

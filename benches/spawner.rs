//! Benchmarks for spark-spawn
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use spark_spawn::{derived, refresh_frame, signal, Node, Pool, RefreshPolicy, Spawner, SpawnerOptions};

// =============================================================================
// SIGNAL BENCHMARKS
// =============================================================================

fn bench_signal_get(c: &mut Criterion) {
    let s = signal(42i32);
    c.bench_function("signal_get", |b| b.iter(|| black_box(s.get())));
}

fn bench_signal_set(c: &mut Criterion) {
    let s = signal(0i32);
    let mut n = 0;
    c.bench_function("signal_set", |b| {
        b.iter(|| {
            n += 1;
            s.set(black_box(n))
        })
    });
}

fn bench_derived_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("derived_chain");

    for depth in [1, 10, 50] {
        group.bench_with_input(BenchmarkId::new("depth", depth), &depth, |b, &depth| {
            let s = signal(1i32);
            let mut current = {
                let s = s.clone();
                derived(move || s.get() + 1)
            };
            for _ in 1..depth {
                let prev = current.clone();
                current = derived(move || prev.get() + 1);
            }

            let mut n = 0;
            b.iter(|| {
                n += 1;
                s.set(n);
                black_box(current.get())
            })
        });
    }

    group.finish();
}

// =============================================================================
// SPAWNER BENCHMARKS
// =============================================================================

fn bench_children_cached(c: &mut Criterion) {
    let parent = Node::new();
    parent.set_spawner(Some(Spawner::new(|| (0..32).map(|_| Node::new()).collect())));
    parent.children().unwrap();

    c.bench_function("children_cached", |b| b.iter(|| black_box(parent.children().unwrap())));
}

fn bench_respawn(c: &mut Criterion) {
    let mut group = c.benchmark_group("respawn");

    for count in [10usize, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("fresh_nodes", count), &count, |b, &count| {
            let tick = signal(0u64);
            let parent = Node::new();
            let t = tick.clone();
            parent.set_spawner(Some(Spawner::new(move || {
                t.get();
                (0..count).map(|_| Node::new()).collect()
            })));

            let mut n = 0;
            b.iter(|| {
                n += 1;
                tick.set(n);
                black_box(parent.children().unwrap())
            })
        });

        group.bench_with_input(BenchmarkId::new("pooled", count), &count, |b, &count| {
            let pool = Pool::new(count, |_| Node::new());
            let visible = signal(0usize);
            let parent = Node::new();
            let (p, v) = (pool.clone(), visible.clone());
            parent.set_spawner(Some(Spawner::new(move || p.take_clamped(v.get()))));

            let mut n = 0;
            b.iter(|| {
                n = (n + 1) % (count + 1);
                visible.set(n);
                black_box(parent.children().unwrap())
            })
        });
    }

    group.finish();
}

fn bench_frame_refresh(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_refresh");

    for nodes in [10usize, 100] {
        group.bench_with_input(BenchmarkId::new("eager_nodes", nodes), &nodes, |b, &nodes| {
            let tick = signal(0u64);
            let parents: Vec<Node> = (0..nodes)
                .map(|_| {
                    let parent = Node::with_options(SpawnerOptions::new().refresh(RefreshPolicy::Eager));
                    let t = tick.clone();
                    parent.set_spawner(Some(Spawner::new(move || {
                        t.get();
                        vec![Node::new()]
                    })));
                    parent
                })
                .collect();

            let mut n = 0;
            b.iter(|| {
                n += 1;
                tick.set(n);
                black_box(refresh_frame().unwrap())
            });
            black_box(parents);
        });
    }

    group.finish();
}

criterion_group!(signal_benches, bench_signal_get, bench_signal_set, bench_derived_chain);

criterion_group!(
    spawner_benches,
    bench_children_cached,
    bench_respawn,
    bench_frame_refresh,
);

criterion_main!(signal_benches, spawner_benches);

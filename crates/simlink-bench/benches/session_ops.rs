//! Criterion benchmarks for whole ticks against the mock engine.
//!
//! The mock polls its semaphore, so these figures bound the client's
//! overhead from above rather than measuring a real engine.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use simlink_bench::{action_batch, fleet};
use simlink_test_utils::{connect, test_config, FillMode, Harness};

/// A session with `agents` UAVs carrying `width` x `height` cameras.
fn harness(tag: &str, agents: usize, width: i64, height: i64, copy_state: bool) -> Harness {
    let mut config = test_config(tag);
    config.copy_state = copy_state;
    config.agents = fleet(agents, width, height);
    connect(config, FillMode::Zero).unwrap()
}

fn bench_tick_copy(c: &mut Criterion) {
    let mut h = harness("bench-copy", 4, 128, 128, true);
    let actions = action_batch(4, 1);

    c.bench_function("tick_4_agents_copy", |b| {
        b.iter(|| {
            for cmd in &actions {
                h.session.enqueue(cmd.clone()).unwrap();
            }
            black_box(h.session.tick().unwrap());
        });
    });
}

fn bench_tick_zero_copy(c: &mut Criterion) {
    let mut h = harness("bench-zero", 4, 128, 128, false);

    c.bench_function("tick_4_agents_zero_copy", |b| {
        b.iter(|| {
            h.session.tick().unwrap();
            black_box(h.session.sensor_bytes("uav0", "RGBCamera").unwrap().len());
        });
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_tick_copy, bench_tick_zero_copy
}
criterion_main!(benches);

use criterion::{criterion_group, criterion_main, Criterion};
use envs::{BatchedEnvironmentPool, ExecutionPolicy, MiniPong, PongConfig, PoolConfig};

fn bench_pool_step(c: &mut Criterion) {
    for (name, policy) in [
        ("pool_step_sequential", ExecutionPolicy::Sequential),
        ("pool_step_workers", ExecutionPolicy::default()),
    ] {
        let mut pool = BatchedEnvironmentPool::new(
            |slot| MiniPong::new(PongConfig::seeded(slot as u64)),
            PoolConfig::with_envs(64).execution(policy),
        )
        .unwrap();
        let actions = vec![0usize; 64];
        c.bench_function(name, |b| b.iter(|| pool.step(&actions).unwrap()));
    }
}

criterion_group!(benches, bench_pool_step);
criterion_main!(benches);

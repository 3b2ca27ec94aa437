mod common;

use std::convert::Infallible;

use common::CountingEnv;
use envs::{BatchedEnvironmentPool, PoolConfig, PoolError, RolloutSession, TrajectorySource};

fn session(n: usize) -> RolloutSession<CountingEnv> {
    let pool = BatchedEnvironmentPool::new(
        |slot| Ok::<_, Infallible>(CountingEnv::new(slot, 10_000)),
        PoolConfig::with_envs(n),
    )
    .unwrap();
    RolloutSession::new(pool, 3).unwrap()
}

#[test]
fn session_starts_after_one_step() {
    let s = session(4);
    assert!(s.current().iter().all(|obs| obs.1 == 101));
}

#[test]
fn transition_links_consecutive_observations() {
    let mut s = session(3);
    let first = s.next_transition().unwrap();
    let second = s.next_transition().unwrap();
    assert_eq!(first.after, second.before);
    assert_eq!(first.actions.len(), 3);
    assert!(first.actions.iter().all(|&a| a < 4));
}

#[test]
fn trajectories_have_expected_shape() {
    let mut s = session(5);
    let batch = s.get_trajectories(5, 2).unwrap();
    assert_eq!(batch.batch_size(), 5);
    assert_eq!(batch.timesteps(), 2);
    assert_eq!(batch.observations.len(), 3);
    assert_eq!(batch.observations_at(0).unwrap()[0], (0, 101));
    assert_eq!(batch.observations_at(2).unwrap()[4], (4, 103));
    assert_eq!(batch.actions_at(1).unwrap().len(), 5);
    assert!(batch.actions_at(2).is_none());
    assert_eq!(s.num_actions(), 4);
}

#[test]
fn mismatched_batch_size_is_rejected() {
    let mut s = session(2);
    assert!(matches!(s.get_trajectories(3, 2), Err(PoolError::BatchSize { expected: 2, actual: 3 })));
}

#[test]
fn same_seed_same_actions() {
    let mut a = session(4);
    let mut b = session(4);
    assert_eq!(a.rollout(5).unwrap().actions, b.rollout(5).unwrap().actions);
}

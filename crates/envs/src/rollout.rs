//! Trajectory collection on top of a [`BatchedEnvironmentPool`].
//!
//! [`RolloutSession`] is created explicitly by the caller and owns all state
//! carried between batches: the pool, the latest observation of every slot,
//! and the action RNG.

use crate::env::Environment;
use crate::error::PoolError;
use crate::pool::BatchedEnvironmentPool;

/// A batch of trajectories, stored time-major.
///
/// `observations[t][b]` is the observation of trajectory `b` at time `t`;
/// `actions[t][b]` was taken from it, producing `rewards[t][b]`,
/// `dones[t][b]` and `observations[t + 1][b]`. There is one more observation
/// row than action rows.
///
/// A trajectory may cross an episode boundary. The observation following a
/// `done` is the first observation of the next episode.
#[derive(Clone, Debug, PartialEq)]
pub struct TrajectoryBatch<O> {
    pub observations: Vec<Vec<O>>,
    pub actions: Vec<Vec<usize>>,
    pub rewards: Vec<Vec<f32>>,
    pub dones: Vec<Vec<bool>>,
}

impl<O> TrajectoryBatch<O> {
    /// Number of trajectories.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.observations.first().map_or(0, Vec::len)
    }

    /// Number of actions per trajectory.
    #[must_use]
    pub fn timesteps(&self) -> usize {
        self.actions.len()
    }

    #[must_use]
    pub fn observations_at(&self, t: usize) -> Option<&[O]> {
        self.observations.get(t).map(Vec::as_slice)
    }

    #[must_use]
    pub fn actions_at(&self, t: usize) -> Option<&[usize]> {
        self.actions.get(t).map(Vec::as_slice)
    }
}

/// Anything that can hand out trajectory batches.
pub trait TrajectorySource {
    type Observation;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Collect `batch_size` trajectories of `timesteps` actions each.
    ///
    /// # Errors
    ///
    /// Source specific.
    fn get_trajectories(
        &mut self,
        batch_size: usize,
        timesteps: usize,
    ) -> Result<TrajectoryBatch<Self::Observation>, Self::Error>;

    /// Size of the discrete action space actions are drawn from.
    fn num_actions(&self) -> usize;
}

/// One macro-step seen from the training loop.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition<O> {
    pub before: Vec<O>,
    pub actions: Vec<usize>,
    pub after: Vec<O>,
    pub rewards: Vec<f32>,
    pub dones: Vec<bool>,
}

/// Drives a pool with uniformly random actions.
pub struct RolloutSession<E: Environment> {
    pool: BatchedEnvironmentPool<E>,
    current: Vec<E::Observation>,
    rng: fastrand::Rng,
}

impl<E> RolloutSession<E>
where
    E: Environment,
    E::Observation: Clone,
{
    /// Take ownership of `pool` and make one random macro-step to obtain the
    /// first observations.
    ///
    /// # Errors
    ///
    /// Propagates any pool failure from the initial step.
    pub fn new(pool: BatchedEnvironmentPool<E>, seed: u64) -> Result<Self, PoolError> {
        let mut session = Self { pool, current: Vec::new(), rng: fastrand::Rng::with_seed(seed) };
        let actions = session.random_actions();
        session.current = session.pool.step(&actions)?.observations;
        Ok(session)
    }

    #[must_use]
    pub fn pool(&self) -> &BatchedEnvironmentPool<E> {
        &self.pool
    }

    /// Latest observation of every slot.
    #[must_use]
    pub fn current(&self) -> &[E::Observation] {
        &self.current
    }

    fn random_actions(&mut self) -> Vec<usize> {
        let n = self.pool.action_space();
        (0..self.pool.len()).map(|_| self.rng.usize(..n)).collect()
    }

    /// Step once with random actions, returning the observations before and
    /// after together with the actions taken.
    ///
    /// # Errors
    ///
    /// Propagates any pool failure.
    pub fn next_transition(&mut self) -> Result<Transition<E::Observation>, PoolError> {
        let actions = self.random_actions();
        let batch = self.pool.step(&actions)?;
        let before = std::mem::replace(&mut self.current, batch.observations.clone());
        Ok(Transition {
            before,
            actions,
            after: batch.observations,
            rewards: batch.rewards,
            dones: batch.dones,
        })
    }

    /// Roll every slot forward `timesteps` random steps from its current
    /// observation.
    ///
    /// # Errors
    ///
    /// Propagates any pool failure.
    pub fn rollout(&mut self, timesteps: usize) -> Result<TrajectoryBatch<E::Observation>, PoolError> {
        let mut batch = TrajectoryBatch {
            observations: Vec::with_capacity(timesteps + 1),
            actions: Vec::with_capacity(timesteps),
            rewards: Vec::with_capacity(timesteps),
            dones: Vec::with_capacity(timesteps),
        };
        batch.observations.push(self.current.clone());
        for _ in 0..timesteps {
            let step = self.next_transition()?;
            batch.observations.push(step.after);
            batch.actions.push(step.actions);
            batch.rewards.push(step.rewards);
            batch.dones.push(step.dones);
        }
        Ok(batch)
    }
}

impl<E> TrajectorySource for RolloutSession<E>
where
    E: Environment,
    E::Observation: Clone,
{
    type Observation = E::Observation;
    type Error = PoolError;

    fn get_trajectories(
        &mut self,
        batch_size: usize,
        timesteps: usize,
    ) -> Result<TrajectoryBatch<E::Observation>, PoolError> {
        if batch_size != self.pool.len() {
            return Err(PoolError::BatchSize { expected: self.pool.len(), actual: batch_size });
        }
        self.rollout(timesteps)
    }

    fn num_actions(&self) -> usize {
        self.pool.action_space()
    }
}

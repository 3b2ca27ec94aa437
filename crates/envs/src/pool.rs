//! # Batched Environment Pool
//!
//! A fixed-size set of independent environments driven by one macro-step.
//!
//! Environments are constructed one after another on the calling thread.
//! Many simulators keep process-global state that is unsafe to touch from
//! several threads during setup, so construction is never parallelized.
//! Per-slot steps are dispatched according to the configured
//! [`ExecutionPolicy`](crate::ExecutionPolicy).
//!
//! Every slot is ready to step when a pool operation returns. A slot that
//! finishes its episode during [`BatchedEnvironmentPool::step`] is reset and
//! warmed up before the call returns; the `done` flag is the only trace of
//! the episode boundary. An episode that ends during warm-up is reset and the
//! warm-up starts over, at most [`MAX_WARMUP_RESTARTS`] times.

use std::time::Instant;

use crate::config::PoolConfig;
use crate::env::{Environment, Step};
use crate::error::{PoolError, WarmupError};
use crate::policy::{ExecutionPolicy, Executor};

/// Order-aligned outputs of one macro-step, one entry per slot.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchStep<O, I> {
    pub observations: Vec<O>,
    pub rewards: Vec<f32>,
    pub dones: Vec<bool>,
    pub infos: Vec<I>,
}

impl<O, I> BatchStep<O, I> {
    fn with_capacity(n: usize) -> Self {
        Self {
            observations: Vec::with_capacity(n),
            rewards: Vec::with_capacity(n),
            dones: Vec::with_capacity(n),
            infos: Vec::with_capacity(n),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Number of slots whose episode ended (and was restarted) this step.
    #[must_use]
    pub fn episodes_ended(&self) -> usize {
        self.dones.iter().filter(|&&d| d).count()
    }
}

/// N independent environments stepped in lockstep.
/// Resets allowed after an episode ends during warm-up before the slot is
/// reported as failed.
pub const MAX_WARMUP_RESTARTS: usize = 8;

pub struct BatchedEnvironmentPool<E: Environment> {
    envs: Vec<E>,
    config: PoolConfig,
    executor: Executor,
}

impl<E: Environment> BatchedEnvironmentPool<E> {
    /// Build `config.num_envs` environments with `factory`, then reset and
    /// warm up every slot.
    ///
    /// `factory` receives the slot index and is called exactly once per
    /// slot, in slot order, on the calling thread.
    ///
    /// # Errors
    ///
    /// Fails on an invalid config, a factory error, a worker pool that cannot
    /// be built, or any reset failure. No pool is returned in those cases.
    pub fn new<F, FE>(mut factory: F, config: PoolConfig) -> Result<Self, PoolError>
    where
        F: FnMut(usize) -> Result<E, FE>,
        FE: std::error::Error + Send + Sync + 'static,
    {
        config.validate()?;
        let start = Instant::now();
        let executor = config.execution.executor()?;

        let mut envs = Vec::with_capacity(config.num_envs);
        for slot in 0..config.num_envs {
            let env = factory(slot).map_err(|e| PoolError::Construct { slot, source: Box::new(e) })?;
            envs.push(env);
        }

        let action_space = envs[0].action_space();
        if config.noop_action >= action_space {
            return Err(PoolError::Config(format!(
                "noop_action {} outside action space of size {action_space}",
                config.noop_action
            )));
        }

        let mut pool = Self { envs, config, executor };
        pool.reset_all()?;
        tracing::info!(
            "Initialized {} environments in {:.3}s ({:?})",
            pool.len(),
            start.elapsed().as_secs_f64(),
            pool.config.execution
        );
        Ok(pool)
    }

    /// Number of slots (N).
    #[must_use]
    pub fn len(&self) -> usize {
        self.envs.len()
    }

    /// Always `false`: a pool holds at least one slot.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.envs.is_empty()
    }

    /// Size of the discrete action space, taken from slot 0.
    #[must_use]
    pub fn action_space(&self) -> usize {
        self.envs[0].action_space()
    }

    #[must_use]
    pub fn policy(&self) -> ExecutionPolicy {
        self.config.execution
    }

    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Reset and warm up every slot, sequentially and in slot order.
    ///
    /// # Errors
    ///
    /// Returns the first slot failure; later slots are left untouched.
    pub fn reset_all(&mut self) -> Result<Vec<E::Observation>, PoolError> {
        let (warmup, noop) = (self.config.warmup_steps, self.config.noop_action);
        self.envs
            .iter_mut()
            .enumerate()
            .map(|(slot, env)| reset_and_warm_up(env, slot, warmup, noop))
            .collect()
    }

    /// Reset one slot and run the warm-up sequence on it.
    ///
    /// # Errors
    ///
    /// [`PoolError::SlotOutOfRange`] for a bad index, [`PoolError::Reset`] if
    /// the environment fails during reset or warm-up.
    pub fn reset(&mut self, slot: usize) -> Result<E::Observation, PoolError> {
        let len = self.len();
        let env = self
            .envs
            .get_mut(slot)
            .ok_or(PoolError::SlotOutOfRange { slot, len })?;
        reset_and_warm_up(env, slot, self.config.warmup_steps, self.config.noop_action)
    }

    /// Step every slot with its action and restart finished episodes.
    ///
    /// `actions[i]` drives slot `i`. Observations returned for slots with
    /// `done == true` are the post-reset, post-warm-up observations.
    ///
    /// # Errors
    ///
    /// [`PoolError::ActionCount`] before anything runs if `actions.len()`
    /// differs from the pool size. Otherwise the first failing slot aborts
    /// the whole macro-step; no partial batch is returned.
    pub fn step(
        &mut self,
        actions: &[usize],
    ) -> Result<BatchStep<E::Observation, E::Info>, PoolError> {
        if actions.len() != self.envs.len() {
            return Err(PoolError::ActionCount { expected: self.envs.len(), actual: actions.len() });
        }
        let start = Instant::now();

        let steps = self
            .executor
            .run(&mut self.envs, actions, |slot, env, &action| {
                env.step(action).map_err(|e| PoolError::step(slot, e))
            })
            .into_iter()
            .collect::<Result<Vec<Step<_, _>>, _>>()?;

        let mut batch = BatchStep::with_capacity(steps.len());
        for (slot, step) in steps.into_iter().enumerate() {
            let observation = if step.done {
                reset_and_warm_up(
                    &mut self.envs[slot],
                    slot,
                    self.config.warmup_steps,
                    self.config.noop_action,
                )?
            } else {
                step.observation
            };
            batch.observations.push(observation);
            batch.rewards.push(step.reward);
            batch.dones.push(step.done);
            batch.infos.push(step.info);
        }

        tracing::debug!(
            "Stepped {} environments in {:.3}s, {} episodes restarted",
            batch.len(),
            start.elapsed().as_secs_f64(),
            batch.episodes_ended()
        );
        Ok(batch)
    }
}

/// Reset `env`, then step it `warmup` times with `noop`. Rewards and infos
/// of warm-up steps are discarded. If a warm-up step ends the episode, the
/// environment is reset and the full warm-up runs again.
fn reset_and_warm_up<E: Environment>(
    env: &mut E,
    slot: usize,
    warmup: usize,
    noop: usize,
) -> Result<E::Observation, PoolError> {
    'attempt: for restarts in 0..=MAX_WARMUP_RESTARTS {
        let mut observation = env.reset().map_err(|e| PoolError::reset(slot, e))?;
        for _ in 0..warmup {
            let step = env.step(noop).map_err(|e| PoolError::reset(slot, e))?;
            if step.done {
                tracing::debug!("Slot {} ended its episode during warm-up ({} restarts)", slot, restarts);
                continue 'attempt;
            }
            observation = step.observation;
        }
        return Ok(observation);
    }
    Err(PoolError::reset(slot, WarmupError { restarts: MAX_WARMUP_RESTARTS }))
}

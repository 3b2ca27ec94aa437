#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use envs::{Environment, Step};
use thiserror::Error;

#[derive(Error, Debug)]
#[error("scripted failure in env {0}")]
pub struct ScriptedError(pub usize);

/// Deterministic counting environment.
///
/// The observation is `(id, steps since reset)`. An episode ends after
/// `episode_len` non-warm-up steps; `resets` counts every reset call.
pub struct CountingEnv {
    pub id: usize,
    pub episode_len: usize,
    pub steps: usize,
    pub resets: Arc<AtomicUsize>,
    pub fail_on_step: Option<usize>,
}

impl CountingEnv {
    pub fn new(id: usize, episode_len: usize) -> Self {
        Self { id, episode_len, steps: 0, resets: Arc::new(AtomicUsize::new(0)), fail_on_step: None }
    }
}

impl Environment for CountingEnv {
    type Observation = (usize, usize);
    type Info = usize;
    type Error = ScriptedError;

    fn reset(&mut self) -> Result<(usize, usize), ScriptedError> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        self.steps = 0;
        Ok((self.id, 0))
    }

    fn step(&mut self, action: usize) -> Result<Step<(usize, usize), usize>, ScriptedError> {
        if action >= 4 {
            return Err(ScriptedError(self.id));
        }
        self.steps += 1;
        if self.fail_on_step == Some(self.steps) {
            return Err(ScriptedError(self.id));
        }
        Ok(Step {
            observation: (self.id, self.steps),
            reward: action as f32,
            done: self.steps >= self.episode_len,
            info: action,
        })
    }

    fn action_space(&self) -> usize {
        4
    }
}

/// Environment that refuses to step once its episode is over.
///
/// `lengths[k]` is the length of the episode started by the `k`-th reset;
/// the last entry repeats. The observation is `(resets, steps since reset)`.
pub struct StrictEnv {
    pub lengths: Vec<usize>,
    pub resets: usize,
    pub steps: usize,
    pub over: bool,
}

impl StrictEnv {
    pub fn new(lengths: &[usize]) -> Self {
        Self { lengths: lengths.to_vec(), resets: 0, steps: 0, over: true }
    }

    fn episode_len(&self) -> usize {
        let k = self.resets.saturating_sub(1).min(self.lengths.len() - 1);
        self.lengths[k]
    }
}

impl Environment for StrictEnv {
    type Observation = (usize, usize);
    type Info = ();
    type Error = ScriptedError;

    fn reset(&mut self) -> Result<(usize, usize), ScriptedError> {
        self.resets += 1;
        self.steps = 0;
        self.over = false;
        Ok((self.resets, 0))
    }

    fn step(&mut self, action: usize) -> Result<Step<(usize, usize), ()>, ScriptedError> {
        if self.over || action >= 4 {
            return Err(ScriptedError(self.resets));
        }
        self.steps += 1;
        self.over = self.steps >= self.episode_len();
        Ok(Step { observation: (self.resets, self.steps), reward: 0.0, done: self.over, info: () })
    }

    fn action_space(&self) -> usize {
        4
    }
}

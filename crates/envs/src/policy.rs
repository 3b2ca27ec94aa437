//! Dispatch policy for per-slot environment work.
//!
//! Construction and resets always run on the calling thread. Only the
//! per-slot `step` of a macro-step is subject to the policy.

use std::num::NonZeroUsize;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};

use crate::error::PoolError;

/// Worker count used when no policy is configured.
pub const DEFAULT_WORKERS: usize = 4;

/// How a pool dispatches per-slot steps.
///
/// Use [`ExecutionPolicy::Sequential`] for simulators that share mutable
/// global state between instances.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionPolicy {
    /// Step every slot on the calling thread, in slot order.
    Sequential,
    /// Step slots on a dedicated pool of exactly `workers` threads.
    WorkerPool { workers: NonZeroUsize },
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        Self::WorkerPool {
            workers: NonZeroUsize::new(DEFAULT_WORKERS).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

impl ExecutionPolicy {
    /// Worker pool with `workers` threads, or sequential when `workers` is 0.
    #[must_use]
    pub fn with_workers(workers: usize) -> Self {
        NonZeroUsize::new(workers).map_or(Self::Sequential, |workers| Self::WorkerPool { workers })
    }

    /// Number of slots that may be stepped at the same time.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        match self {
            Self::Sequential => 1,
            Self::WorkerPool { workers } => workers.get(),
        }
    }

    pub(crate) fn executor(self) -> Result<Executor, PoolError> {
        match self {
            Self::Sequential => Ok(Executor::Inline),
            Self::WorkerPool { workers } => {
                let pool = ThreadPoolBuilder::new()
                    .num_threads(workers.get())
                    .thread_name(|i| format!("env-worker-{i}"))
                    .build()?;
                Ok(Executor::Workers(pool))
            }
        }
    }
}

pub(crate) enum Executor {
    Inline,
    Workers(ThreadPool),
}

impl Executor {
    /// Apply `f` to every `(slot, item, arg)` triple. Output order matches
    /// slot order under both variants.
    pub(crate) fn run<T, A, R, F>(&self, items: &mut [T], args: &[A], f: F) -> Vec<R>
    where
        T: Send,
        A: Sync,
        R: Send,
        F: Fn(usize, &mut T, &A) -> R + Sync + Send,
    {
        match self {
            Self::Inline => items
                .iter_mut()
                .zip(args)
                .enumerate()
                .map(|(slot, (item, arg))| f(slot, item, arg))
                .collect(),
            Self::Workers(pool) => pool.install(|| {
                items
                    .par_iter_mut()
                    .zip(args.par_iter())
                    .enumerate()
                    .map(|(slot, (item, arg))| f(slot, item, arg))
                    .collect()
            }),
        }
    }

    #[cfg(test)]
    pub(crate) fn threads(&self) -> usize {
        match self {
            Self::Inline => 1,
            Self::Workers(pool) => pool.current_num_threads(),
        }
    }
}

#![deny(clippy::all, clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]
//! # Batched Environments
//!
//! Runs many independent simulator instances in lockstep and turns them into
//! batches of observation/action/reward trajectories.
//!
//! ## Key Components
//!
//! -   **[`Environment`]:** the single-instance simulator capability. Anything
//!     with `reset` and `step` over a discrete action space can be pooled.
//! -   **[`BatchedEnvironmentPool`]:** owns N environments and exposes one
//!     macro-step over all of them. Slots that finish an episode are reset and
//!     warmed up before the call returns, so every slot is always ready to step.
//! -   **[`ExecutionPolicy`]:** how per-slot steps are dispatched, either on the
//!     calling thread or across a fixed-size worker pool.
//! -   **[`RolloutSession`]:** an explicit session object that drives a pool
//!     with random actions and implements [`TrajectorySource`].
//! -   **[`MiniPong`]:** a small deterministic Pong-like simulator used by the
//!     runtime and the tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use envs::{BatchedEnvironmentPool, MiniPong, PongConfig, PoolConfig};
//!
//! let config = PoolConfig::with_envs(8);
//! let mut pool = BatchedEnvironmentPool::new(
//!     |slot| MiniPong::new(PongConfig::seeded(slot as u64)),
//!     config,
//! )?;
//! let batch = pool.step(&[0; 8])?;
//! assert_eq!(batch.observations.len(), 8);
//! ```

pub mod config;
pub mod env;
pub mod error;
pub mod minipong;
pub mod policy;
pub mod pool;
pub mod rollout;

pub use config::{PoolConfig, DEFAULT_WARMUP_STEPS};
pub use env::{Environment, Step};
pub use error::{PoolError, WarmupError};
pub use minipong::{Frame, MiniPong, PongConfig, PongInfo};
pub use policy::ExecutionPolicy;
pub use pool::{BatchStep, BatchedEnvironmentPool, MAX_WARMUP_RESTARTS};
pub use rollout::{RolloutSession, TrajectoryBatch, TrajectorySource, Transition};

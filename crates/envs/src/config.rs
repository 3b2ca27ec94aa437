use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PoolError;
use crate::policy::ExecutionPolicy;

/// No-op steps executed after every reset.
pub const DEFAULT_WARMUP_STEPS: usize = 100;

/// Configuration for a [`crate::BatchedEnvironmentPool`].
///
/// Missing JSON fields fall back to [`PoolConfig::default`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of environment slots (N).
    pub num_envs: usize,
    /// No-op steps after each reset, skipping the simulator's intro sequence.
    pub warmup_steps: usize,
    /// Action index used for warm-up steps.
    pub noop_action: usize,
    pub execution: ExecutionPolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            num_envs: 32,
            warmup_steps: DEFAULT_WARMUP_STEPS,
            noop_action: 0,
            execution: ExecutionPolicy::default(),
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn with_envs(num_envs: usize) -> Self {
        Self { num_envs, ..Self::default() }
    }

    #[must_use]
    pub fn execution(mut self, execution: ExecutionPolicy) -> Self {
        self.execution = execution;
        self
    }

    #[must_use]
    pub fn warmup_steps(mut self, warmup_steps: usize) -> Self {
        self.warmup_steps = warmup_steps;
        self
    }

    /// Parse a config from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ConfigParse`] for malformed JSON and
    /// [`PoolError::Config`] if the parsed values are invalid.
    pub fn from_json_str(json: &str) -> Result<Self, PoolError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ConfigIo`] if the file cannot be read, otherwise
    /// as [`PoolConfig::from_json_str`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PoolError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// # Errors
    ///
    /// Returns [`PoolError::Config`] for an empty pool.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.num_envs == 0 {
            return Err(PoolError::Config("num_envs must be > 0".into()));
        }
        Ok(())
    }
}

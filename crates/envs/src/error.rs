use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Source of a [`PoolError::Reset`] when every warm-up attempt ended the
/// episode before the warm-up finished.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("episode ended during warm-up after {restarts} restarts")]
pub struct WarmupError {
    pub restarts: usize,
}

/// Failures of a [`crate::BatchedEnvironmentPool`].
///
/// Any slot failure is fatal for the whole operation; partial batches are
/// never returned.
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("failed to construct environment for slot {slot}")]
    Construct {
        slot: usize,
        #[source]
        source: BoxError,
    },
    #[error("environment in slot {slot} failed to step")]
    Step {
        slot: usize,
        #[source]
        source: BoxError,
    },
    #[error("environment in slot {slot} failed to reset")]
    Reset {
        slot: usize,
        #[source]
        source: BoxError,
    },
    #[error("expected {expected} actions, got {actual}")]
    ActionCount { expected: usize, actual: usize },
    #[error("session serves batches of {expected}, requested {actual}")]
    BatchSize { expected: usize, actual: usize },
    #[error("slot {slot} out of range for pool of {len}")]
    SlotOutOfRange { slot: usize, len: usize },
    #[error("failed to build worker pool")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
    #[error("invalid pool config: {0}")]
    Config(String),
    #[error("failed to read pool config")]
    ConfigIo(#[from] std::io::Error),
    #[error("failed to parse pool config")]
    ConfigParse(#[from] serde_json::Error),
}

impl PoolError {
    pub(crate) fn step<E>(slot: usize, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Step { slot, source: Box::new(err) }
    }

    pub(crate) fn reset<E>(slot: usize, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Reset { slot, source: Box::new(err) }
    }

    /// Slot the failure is attributed to, if any.
    #[must_use]
    pub fn slot(&self) -> Option<usize> {
        match self {
            Self::Construct { slot, .. }
            | Self::Step { slot, .. }
            | Self::Reset { slot, .. }
            | Self::SlotOutOfRange { slot, .. } => Some(*slot),
            _ => None,
        }
    }
}

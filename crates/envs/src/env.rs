/// Single-instance simulator capability.
///
/// Modelled after Gym-style environments: [`reset`] starts a new episode and
/// [`step`] advances it by one discrete action. Observations and infos are
/// opaque to the pool and are passed through untouched.
///
/// Implementations are moved into worker threads when a pool steps them
/// concurrently, hence the `Send` bounds.
///
/// [`reset`]: Environment::reset
/// [`step`]: Environment::step
pub trait Environment: Send {
    type Observation: Send;
    type Info: Send;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Reset to the start of a new episode and return the first observation.
    ///
    /// # Errors
    ///
    /// Returns the simulator's own error if the reset fails.
    fn reset(&mut self) -> Result<Self::Observation, Self::Error>;

    /// Advance the episode by one action.
    ///
    /// # Errors
    ///
    /// Returns the simulator's own error if the step fails.
    fn step(&mut self, action: usize) -> Result<Step<Self::Observation, Self::Info>, Self::Error>;

    /// Size of the discrete action space.
    fn action_space(&self) -> usize;
}

/// Result of a single environment step.
#[derive(Clone, Debug, PartialEq)]
pub struct Step<O, I> {
    pub observation: O,
    pub reward: f32,
    /// The episode ended with this step.
    pub done: bool,
    pub info: I,
}

//! # Latent Dynamics Models
//!
//! The [`LatentDynamics`] capability consumed by the causal graph builder,
//! plus reference encoder and transition models.
//!
//! Training mode is an explicit part of the contract. A model whose layers
//! keep running statistics updates them only while training; in inference
//! mode those statistics are frozen. [`InferenceMode`] scopes a model into
//! inference and restores its previous mode when dropped.

use std::marker::PhantomData;
use std::ops::Deref;

use parking_lot::Mutex;
use thiserror::Error;

use crate::nn::{leaky_relu, Dense};
use crate::tensor::{EncodingError, ShapeError, Tensor};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error("observation {index} has {actual} features, expected {expected}")]
    Features { index: usize, expected: usize, actual: usize },
}

/// A learned latent dynamics model: an encoder from observations to latent
/// vectors and a one-step transition in latent space.
pub trait LatentDynamics {
    type Observation;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Dimension L of a latent vector.
    fn latent_dim(&self) -> usize;

    /// Size A of the one-hot action encoding.
    fn num_actions(&self) -> usize;

    /// Encode a batch of observations into `[batch, L]`.
    ///
    /// # Errors
    ///
    /// Model specific.
    fn encode(&self, observations: &[Self::Observation]) -> Result<Tensor, Self::Error>;

    /// Predict `[batch, L]` next latents from `[batch, L]` latents and
    /// `[batch, A]` one-hot actions.
    ///
    /// # Errors
    ///
    /// Model specific.
    fn transition(&self, z: &Tensor, actions: &Tensor) -> Result<Tensor, Self::Error>;

    /// Enable or freeze updates of internal running statistics.
    fn set_training_mode(&mut self, training: bool);

    fn is_training(&self) -> bool;
}

/// Holds a model in inference mode; the previous mode is restored on drop.
pub struct InferenceMode<'a, M: LatentDynamics> {
    model: &'a mut M,
    was_training: bool,
}

impl<'a, M: LatentDynamics> InferenceMode<'a, M> {
    pub fn new(model: &'a mut M) -> Self {
        let was_training = model.is_training();
        model.set_training_mode(false);
        Self { model, was_training }
    }
}

impl<M: LatentDynamics> Deref for InferenceMode<'_, M> {
    type Target = M;

    fn deref(&self) -> &M {
        self.model
    }
}

impl<M: LatentDynamics> Drop for InferenceMode<'_, M> {
    fn drop(&mut self) {
        self.model.set_training_mode(self.was_training);
    }
}

/// Flat feature view of an observation.
pub trait Features {
    fn features(&self) -> &[f32];
}

impl Features for Vec<f32> {
    fn features(&self) -> &[f32] {
        self
    }
}

impl Features for envs::Frame {
    fn features(&self) -> &[f32] {
        &self.pixels
    }
}

/// Maps observations to latent vectors.
pub trait Encoder {
    type Observation;

    fn latent_dim(&self) -> usize;

    /// # Errors
    ///
    /// On malformed observations.
    fn encode(&self, observations: &[Self::Observation]) -> Result<Tensor, ModelError>;

    fn set_training_mode(&mut self, training: bool);
}

/// Predicts the next latent vector from the current one and an action.
pub trait TransitionModel {
    fn num_actions(&self) -> usize;

    /// # Errors
    ///
    /// On shape mismatches.
    fn transition(&self, z: &Tensor, actions: &Tensor) -> Result<Tensor, ModelError>;

    fn set_training_mode(&mut self, training: bool);
}

#[derive(Clone, Debug)]
struct RunningStats {
    mean: Vec<f32>,
    var: Vec<f32>,
}

/// Per-feature normalization with running statistics.
///
/// In training mode a batch is normalized with its own statistics and the
/// running estimates move toward them by `momentum`. In inference mode the
/// running estimates are used and left untouched.
pub struct RunningNorm {
    dim: usize,
    momentum: f32,
    eps: f32,
    training: bool,
    stats: Mutex<RunningStats>,
}

impl RunningNorm {
    #[must_use]
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            momentum: 0.1,
            eps: 1e-5,
            training: true,
            stats: Mutex::new(RunningStats { mean: vec![0.0; dim], var: vec![1.0; dim] }),
        }
    }

    pub fn set_training_mode(&mut self, training: bool) {
        self.training = training;
    }

    #[must_use]
    pub fn running_mean(&self) -> Vec<f32> {
        self.stats.lock().mean.clone()
    }

    /// # Errors
    ///
    /// If `x` does not have `dim` columns.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor, ShapeError> {
        if x.cols() != self.dim {
            return Err(ShapeError(format!("norm expects {} features, got {:?}", self.dim, x.shape)));
        }
        let (mean, var) = if self.training && x.rows() > 1 {
            let n = x.rows() as f32;
            let mut mean = vec![0.0; self.dim];
            let mut var = vec![0.0; self.dim];
            for r in 0..x.rows() {
                for (m, v) in mean.iter_mut().zip(x.row(r)) {
                    *m += v / n;
                }
            }
            for r in 0..x.rows() {
                for ((s, v), m) in var.iter_mut().zip(x.row(r)).zip(&mean) {
                    *s += (v - m).powi(2) / n;
                }
            }
            let mut stats = self.stats.lock();
            let k = self.momentum;
            for (running, batch) in stats.mean.iter_mut().zip(&mean) {
                *running = (1.0 - k) * *running + k * batch;
            }
            for (running, batch) in stats.var.iter_mut().zip(&var) {
                *running = (1.0 - k) * *running + k * batch;
            }
            (mean, var)
        } else {
            let stats = self.stats.lock();
            (stats.mean.clone(), stats.var.clone())
        };

        let mut out = x.clone();
        for r in 0..x.rows() {
            let row = &mut out.data[r * self.dim..(r + 1) * self.dim];
            for ((v, m), s) in row.iter_mut().zip(&mean).zip(&var) {
                *v = (*v - m) / (s + self.eps).sqrt();
            }
        }
        Ok(out)
    }
}

/// Linear projection of observation features followed by [`RunningNorm`].
pub struct LinearEncoder<O> {
    proj: Dense,
    norm: RunningNorm,
    _obs: PhantomData<fn(&O)>,
}

impl<O: Features> LinearEncoder<O> {
    pub fn random(in_dim: usize, latent_dim: usize, rng: &mut fastrand::Rng) -> Self {
        Self {
            proj: Dense::random(in_dim, latent_dim, rng),
            norm: RunningNorm::new(latent_dim),
            _obs: PhantomData,
        }
    }

    #[must_use]
    pub fn norm(&self) -> &RunningNorm {
        &self.norm
    }
}

impl<O: Features> Encoder for LinearEncoder<O> {
    type Observation = O;

    fn latent_dim(&self) -> usize {
        self.proj.out_dim
    }

    fn encode(&self, observations: &[O]) -> Result<Tensor, ModelError> {
        let expected = self.proj.in_dim;
        let mut x = Tensor::zeros(observations.len(), expected);
        for (index, obs) in observations.iter().enumerate() {
            let features = obs.features();
            if features.len() != expected {
                return Err(ModelError::Features { index, expected, actual: features.len() });
            }
            x.data[index * expected..(index + 1) * expected].copy_from_slice(features);
        }
        Ok(self.norm.forward(&self.proj.forward(&x)?)?)
    }

    fn set_training_mode(&mut self, training: bool) {
        self.norm.set_training_mode(training);
    }
}

/// Two-layer residual transition:
/// `z + fc2(leaky_relu(fc1([z | a]), 0.2))`, with `fc2` bias-free.
pub struct MlpTransition {
    fc1: Dense,
    fc2: Dense,
    num_actions: usize,
}

impl MlpTransition {
    pub fn random(latent_dim: usize, num_actions: usize, rng: &mut fastrand::Rng) -> Self {
        Self {
            fc1: Dense::random(latent_dim + num_actions, latent_dim * 2, rng),
            fc2: Dense::random(latent_dim * 2, latent_dim, rng),
            num_actions,
        }
    }
}

impl TransitionModel for MlpTransition {
    fn num_actions(&self) -> usize {
        self.num_actions
    }

    fn transition(&self, z: &Tensor, actions: &Tensor) -> Result<Tensor, ModelError> {
        let x = z.concat_cols(actions)?;
        let h = leaky_relu(&self.fc1.forward(&x)?, 0.2);
        let delta = self.fc2.forward(&h)?;
        Ok(z.add(&delta)?)
    }

    fn set_training_mode(&mut self, _training: bool) {}
}

/// Residual linear transition `z + [z | a] · wᵀ`.
pub struct LinearTransition {
    layer: Dense,
    num_actions: usize,
}

impl LinearTransition {
    /// `weights` is `[latent_dim, latent_dim + num_actions]`, row-major.
    ///
    /// # Panics
    ///
    /// If `weights` has the wrong length.
    #[must_use]
    pub fn new(weights: Vec<f32>, latent_dim: usize, num_actions: usize) -> Self {
        Self {
            layer: Dense::new(weights, vec![0.0; latent_dim], latent_dim + num_actions, latent_dim),
            num_actions,
        }
    }
}

impl TransitionModel for LinearTransition {
    fn num_actions(&self) -> usize {
        self.num_actions
    }

    fn transition(&self, z: &Tensor, actions: &Tensor) -> Result<Tensor, ModelError> {
        let delta = self.layer.forward(&z.concat_cols(actions)?)?;
        Ok(z.add(&delta)?)
    }

    fn set_training_mode(&mut self, _training: bool) {}
}

/// An encoder and a transition combined into a [`LatentDynamics`] model.
pub struct LatentModel<E, T> {
    pub encoder: E,
    pub transition: T,
    training: bool,
}

impl<E: Encoder, T: TransitionModel> LatentModel<E, T> {
    /// New models start in training mode.
    pub fn new(encoder: E, transition: T) -> Self {
        Self { encoder, transition, training: true }
    }
}

impl<E: Encoder, T: TransitionModel> LatentDynamics for LatentModel<E, T> {
    type Observation = E::Observation;
    type Error = ModelError;

    fn latent_dim(&self) -> usize {
        self.encoder.latent_dim()
    }

    fn num_actions(&self) -> usize {
        self.transition.num_actions()
    }

    fn encode(&self, observations: &[E::Observation]) -> Result<Tensor, ModelError> {
        self.encoder.encode(observations)
    }

    fn transition(&self, z: &Tensor, actions: &Tensor) -> Result<Tensor, ModelError> {
        self.transition.transition(z, actions)
    }

    fn set_training_mode(&mut self, training: bool) {
        self.training = training;
        self.encoder.set_training_mode(training);
        self.transition.set_training_mode(training);
    }

    fn is_training(&self) -> bool {
        self.training
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch() -> Tensor {
        Tensor::from_vec([2, 2], vec![1.0, 10.0, 3.0, 30.0])
    }

    #[test]
    fn running_norm_updates_only_in_training() {
        let mut norm = RunningNorm::new(2);
        norm.forward(&batch()).unwrap();
        let after_training = norm.running_mean();
        assert!((after_training[0] - 0.2).abs() < 1e-6);
        assert!((after_training[1] - 2.0).abs() < 1e-5);

        norm.set_training_mode(false);
        norm.forward(&batch()).unwrap();
        assert_eq!(norm.running_mean(), after_training);
    }

    #[test]
    fn inference_output_is_repeatable() {
        let mut norm = RunningNorm::new(2);
        norm.forward(&batch()).unwrap();
        norm.set_training_mode(false);
        let a = norm.forward(&batch()).unwrap();
        let b = norm.forward(&batch()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn inference_guard_restores_mode() {
        let mut rng = fastrand::Rng::with_seed(0);
        let mut model = LatentModel::new(
            LinearEncoder::<Vec<f32>>::random(3, 2, &mut rng),
            MlpTransition::random(2, 4, &mut rng),
        );
        assert!(model.is_training());
        {
            let guard = InferenceMode::new(&mut model);
            assert!(!guard.is_training());
        }
        assert!(model.is_training());
    }

    #[test]
    fn encoder_checks_feature_count() {
        let mut rng = fastrand::Rng::with_seed(0);
        let enc = LinearEncoder::<Vec<f32>>::random(3, 2, &mut rng);
        let err = enc.encode(&[vec![0.0; 3], vec![0.0; 2]]).unwrap_err();
        assert_eq!(err, ModelError::Features { index: 1, expected: 3, actual: 2 });
    }

    #[test]
    fn linear_transition_adds_residual() {
        // L = 1, A = 1: z' = z + 2z + 3a
        let t = LinearTransition::new(vec![2.0, 3.0], 1, 1);
        let z = Tensor::from_vec([1, 1], vec![1.0]);
        let a = Tensor::from_vec([1, 1], vec![1.0]);
        assert_eq!(t.transition(&z, &a).unwrap().data, vec![6.0]);
    }

    #[test]
    fn mlp_transition_keeps_shape() {
        let mut rng = fastrand::Rng::with_seed(4);
        let t = MlpTransition::random(3, 4, &mut rng);
        let z = Tensor::zeros(5, 3);
        let a = crate::tensor::one_hot(&[0, 1, 2, 3, 0], 4).unwrap();
        assert_eq!(t.transition(&z, &a).unwrap().shape, [5, 3]);
    }
}

//! # Counterfactual Causal Graph
//!
//! Estimates how strongly each latent factor drives the next-step value of
//! every other factor, using ablation on a frozen latent dynamics model.
//!
//! The procedure:
//!
//! 1.  Encode the observations at `t = 0` into `z0`.
//! 2.  Roll forward twice with the real actions:
//!     `src = T(z0, a0)`, `dst = T(src, a1)`.
//! 3.  For every source factor `i`, zero column `i` of `src` and predict
//!     `cf = T(src_i, a1)` with the same action `a1`.
//! 4.  Edge `(i, j)` is the batch sum of `(dst[:, j] - cf[:, j])²`.
//! 5.  Divide the matrix by its maximum entry, unless that maximum is zero.
//!
//! Edge weights are sums, not means, so raw magnitudes grow with batch size.
//! Only the normalized matrix is returned; it is comparable within one call
//! but absolute thresholds depend on the batch used.
//!
//! Zero is taken as the "absent" value of a latent factor. That is only
//! meaningful for a latent space trained to be centred on zero; the builder
//! cannot check this.
//!
//! The model is queried `L + 2` times per call (one encode, two factual
//! transitions, one counterfactual per factor).

use serde::Serialize;
use thiserror::Error;

use envs::TrajectoryBatch;

use crate::model::{InferenceMode, LatentDynamics};
use crate::tensor::{one_hot, EncodingError, Tensor};

#[derive(Error, Debug)]
pub enum CausalError<E: std::error::Error + 'static> {
    /// The model failed; its error is passed through untouched.
    #[error(transparent)]
    Model(E),
    #[error("failed to encode actions")]
    Encoding(#[source] EncodingError),
    #[error("invalid trajectory batch: {0}")]
    Batch(String),
    #[error("builder configured for {builder:?} (latent, actions), model has {model:?}")]
    Dimensions { builder: (usize, usize), model: (usize, usize) },
    #[error("{stage} produced shape {actual:?}, expected {expected:?}")]
    Shape { stage: &'static str, expected: [usize; 2], actual: [usize; 2] },
    /// A raw edge weight overflowed or the model produced NaN.
    #[error("raw effect of z{factor} on z{target} is not finite")]
    NonFinite { factor: usize, target: usize },
}

/// One directed edge of a [`CausalGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Edge {
    pub source: usize,
    pub target: usize,
    pub weight: f32,
}

/// Dense `L × L` matrix of normalized causal strengths.
///
/// `weight(i, j)` is the strength of latent factor `i` on the next-step value
/// of factor `j`. Entries lie in `[0, 1]`; the largest is exactly `1.0`
/// unless the whole matrix is zero.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CausalGraph {
    pub dim: usize,
    /// Row-major, `weights[i * dim + j]`.
    pub weights: Vec<f32>,
}

impl CausalGraph {
    #[must_use]
    pub fn weight(&self, source: usize, target: usize) -> f32 {
        self.weights[source * self.dim + target]
    }

    #[must_use]
    pub fn row(&self, source: usize) -> &[f32] {
        &self.weights[source * self.dim..(source + 1) * self.dim]
    }

    #[must_use]
    pub fn max(&self) -> f32 {
        self.weights.iter().copied().fold(0.0, f32::max)
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.weights.iter().all(|&w| w == 0.0)
    }

    /// Edges with weight strictly above `threshold`, strongest first. Ties
    /// keep row-major order.
    #[must_use]
    pub fn strongest_edges(&self, threshold: f32) -> Vec<Edge> {
        let mut edges: Vec<Edge> = self
            .weights
            .iter()
            .enumerate()
            .filter(|(_, &w)| w > threshold)
            .map(|(k, &weight)| Edge { source: k / self.dim, target: k % self.dim, weight })
            .collect();
        edges.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        edges
    }

    /// Divide every entry by the maximum. An all-zero matrix is left as is.
    fn normalize(&mut self) {
        let max = self.max();
        if max > 0.0 {
            for w in &mut self.weights {
                *w /= max;
            }
        }
    }
}

/// Builds a [`CausalGraph`] from a latent dynamics model and real trajectories.
///
/// Stateless between calls. Each call costs `L + 2` model evaluations, so
/// callers decide how often to run it.
#[derive(Clone, Copy, Debug)]
pub struct CausalGraphBuilder {
    latent_dim: usize,
    num_actions: usize,
}

impl CausalGraphBuilder {
    #[must_use]
    pub fn new(latent_dim: usize, num_actions: usize) -> Self {
        Self { latent_dim, num_actions }
    }

    #[must_use]
    pub fn latent_dim(&self) -> usize {
        self.latent_dim
    }

    /// Run the ablation procedure on `batch`.
    ///
    /// `batch` needs observations at `t = 0, 1, 2` and actions at `t = 0, 1`;
    /// later timesteps are ignored. The model is held in inference mode for
    /// the duration of the call and its previous mode restored afterwards,
    /// whether or not the call succeeds.
    ///
    /// # Errors
    ///
    /// Validation errors are reported before the model is queried. Model
    /// failures are returned as [`CausalError::Model`], unchanged. A raw
    /// weight that is NaN or infinite gives [`CausalError::NonFinite`], so a
    /// returned graph always lies in `[0, 1]`.
    pub fn build<M: LatentDynamics>(
        &self,
        model: &mut M,
        batch: &TrajectoryBatch<M::Observation>,
    ) -> Result<CausalGraph, CausalError<M::Error>> {
        let model_dims = (model.latent_dim(), model.num_actions());
        if model_dims != (self.latent_dim, self.num_actions) {
            return Err(CausalError::Dimensions {
                builder: (self.latent_dim, self.num_actions),
                model: model_dims,
            });
        }
        let (obs0, a0, a1) = self.inputs::<_, M::Error>(batch)?;
        let rows = obs0.len();
        let expected = [rows, self.latent_dim];
        let check = |stage: &'static str, t: &Tensor| -> Result<(), CausalError<M::Error>> {
            if t.shape == expected {
                Ok(())
            } else {
                Err(CausalError::Shape { stage, expected, actual: t.shape })
            }
        };

        let model = InferenceMode::new(model);

        let z0 = model.encode(obs0).map_err(CausalError::Model)?;
        check("encode", &z0)?;
        let src = model.transition(&z0, &a0).map_err(CausalError::Model)?;
        check("transition", &src)?;
        let dst = model.transition(&src, &a1).map_err(CausalError::Model)?;
        check("transition", &dst)?;

        let dim = self.latent_dim;
        let mut graph = CausalGraph { dim, weights: vec![0.0; dim * dim] };
        for i in 0..dim {
            let counterfactual = model
                .transition(&src.column_zeroed(i), &a1)
                .map_err(CausalError::Model)?;
            check("counterfactual transition", &counterfactual)?;

            let edges = &mut graph.weights[i * dim..(i + 1) * dim];
            for b in 0..rows {
                for ((edge, d), c) in edges.iter_mut().zip(dst.row(b)).zip(counterfactual.row(b)) {
                    *edge += (d - c).powi(2);
                }
            }
            tracing::debug!("Ablated z{}: raw effect {:?}", i, edges);
        }

        if let Some(k) = graph.weights.iter().position(|w| !w.is_finite()) {
            return Err(CausalError::NonFinite { factor: k / dim, target: k % dim });
        }
        let raw_max = graph.max();
        graph.normalize();
        tracing::info!(
            "Built {}x{} causal graph from {} trajectories (raw max {:.4})",
            dim,
            dim,
            rows,
            raw_max
        );
        Ok(graph)
    }

    fn inputs<'b, O, E: std::error::Error + 'static>(
        &self,
        batch: &'b TrajectoryBatch<O>,
    ) -> Result<(&'b [O], Tensor, Tensor), CausalError<E>> {
        if batch.observations.len() < 3 || batch.timesteps() < 2 {
            return Err(CausalError::Batch(format!(
                "need 3 observation and 2 action timesteps, got {} and {}",
                batch.observations.len(),
                batch.timesteps()
            )));
        }
        let rows = batch.batch_size();
        if rows == 0 {
            return Err(CausalError::Batch("empty batch".into()));
        }
        let obs0 = &batch.observations[0];
        let (a0, a1) = (&batch.actions[0], &batch.actions[1]);
        if a0.len() != rows || a1.len() != rows {
            return Err(CausalError::Batch(format!(
                "{rows} trajectories but {} and {} actions",
                a0.len(),
                a1.len()
            )));
        }
        let a0 = one_hot(a0, self.num_actions).map_err(CausalError::Encoding)?;
        let a1 = one_hot(a1, self.num_actions).map_err(CausalError::Encoding)?;
        Ok((obs0, a0, a1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_scales_to_unit_max() {
        let mut g = CausalGraph { dim: 2, weights: vec![2.0, 0.5, 0.0, 4.0] };
        g.normalize();
        assert_eq!(g.weights, vec![0.5, 0.125, 0.0, 1.0]);
        assert_eq!(g.max(), 1.0);
    }

    #[test]
    fn normalize_leaves_zero_matrix() {
        let mut g = CausalGraph { dim: 2, weights: vec![0.0; 4] };
        g.normalize();
        assert!(g.is_zero());
        assert!(g.weights.iter().all(|w| !w.is_nan()));
    }

    #[test]
    fn edges_sorted_by_weight() {
        let g = CausalGraph { dim: 2, weights: vec![0.2, 1.0, 0.0, 0.5] };
        let edges = g.strongest_edges(0.1);
        assert_eq!(
            edges,
            vec![
                Edge { source: 0, target: 1, weight: 1.0 },
                Edge { source: 1, target: 1, weight: 0.5 },
                Edge { source: 0, target: 0, weight: 0.2 },
            ]
        );
    }
}

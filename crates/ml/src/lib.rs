#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::cast_precision_loss)]
//! # Latent Dynamics and Causal Graphs
//!
//! Building blocks for working with a learned latent dynamics model:
//! batched tensors, dense layers, the [`LatentDynamics`] capability with
//! small reference models, and the counterfactual causal graph builder.
//!
//! Training the model is not part of this crate. Everything here treats the
//! model as frozen: [`CausalGraphBuilder::build`] switches it into inference
//! mode for the duration of the call and never touches its weights.
//!
//! ```rust,ignore
//! use ml::{CausalGraphBuilder, LatentModel};
//!
//! let builder = CausalGraphBuilder::new(latent_dim, num_actions);
//! let graph = builder.build(&mut model, &trajectories)?;
//! println!("{}", graph.weight(0, 1));
//! ```

pub mod causal;
pub mod model;
pub mod nn;
pub mod sink;
pub mod tensor;

pub use causal::{CausalError, CausalGraph, CausalGraphBuilder, Edge};
pub use model::{
    Encoder, Features, InferenceMode, LatentDynamics, LatentModel, LinearEncoder,
    LinearTransition, MlpTransition, ModelError, RunningNorm, TransitionModel,
};
pub use nn::{leaky_relu, Dense};
pub use sink::{JsonSink, LogSink, VisualizationSink};
pub use tensor::{one_hot, EncodingError, ShapeError, Tensor};

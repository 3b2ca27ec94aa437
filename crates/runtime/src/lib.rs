//! # Causal Runtime
//!
//! Wires a [`BatchedEnvironmentPool`] of MiniPong simulators to a latent
//! dynamics model. Every iteration collects a short batch of trajectories;
//! every `graph_every` iterations the batch is handed to the
//! [`CausalGraphBuilder`] and the resulting graph to the configured sinks.
//!
//! Model training is not part of this loop. The model is randomly
//! initialized and stays in training mode between graph builds, so its
//! running statistics are only frozen while a graph is being extracted.

#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use clap::Parser;

use envs::{
    BatchedEnvironmentPool, ExecutionPolicy, Frame, MiniPong, PongConfig, PoolConfig,
    RolloutSession, TrajectorySource,
};
use ml::{
    CausalGraph, CausalGraphBuilder, JsonSink, LatentModel, LinearEncoder, LogSink, MlpTransition,
    VisualizationSink,
};

/// Actions per collected trajectory; the builder needs two.
pub const ROLLOUT_STEPS: usize = 2;

#[derive(Parser, Debug, Clone)]
#[command(name = "causal_main")]
#[command(about = "Roll out MiniPong environments and report latent causal graphs")]
pub struct Args {
    /// JSON pool configuration. Flags below override its fields.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of environments stepped in lockstep
    #[arg(long)]
    pub envs: Option<usize>,

    /// Worker threads used to step environments
    #[arg(long, conflicts_with = "sequential")]
    pub workers: Option<usize>,

    /// Step every environment on the main thread
    #[arg(long)]
    pub sequential: bool,

    /// Number of trajectory batches to collect
    #[arg(long, default_value_t = 1000)]
    pub iterations: usize,

    /// Build a causal graph every N iterations
    #[arg(long, default_value_t = 100)]
    pub graph_every: usize,

    /// Dimension of the latent space
    #[arg(long, default_value_t = 6)]
    pub latent_dim: usize,

    /// Seed for environments, rollout actions and model weights
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Append every graph to this file as one JSON line
    #[arg(long)]
    pub output: Option<PathBuf>,
}

impl Args {
    /// Pool configuration from `--config`, or the defaults, with command line
    /// overrides applied.
    ///
    /// # Errors
    ///
    /// If the configuration file cannot be read or parsed.
    pub fn pool_config(&self) -> Result<PoolConfig> {
        let mut config = match &self.config {
            Some(path) => PoolConfig::from_json_file(path)
                .with_context(|| format!("failed to load pool config {}", path.display()))?,
            None => PoolConfig::default(),
        };
        if let Some(num_envs) = self.envs {
            config.num_envs = num_envs;
        }
        if self.sequential {
            config.execution = ExecutionPolicy::Sequential;
        } else if let Some(workers) = self.workers {
            config.execution = ExecutionPolicy::with_workers(workers);
        }
        Ok(config)
    }
}

/// What a finished [`run`] produced.
#[derive(Debug)]
pub struct RunSummary {
    pub iterations: usize,
    /// Episodes that ended while collecting trajectories.
    pub episodes_ended: usize,
    /// Every graph sent to the sinks, in order.
    pub graphs: Vec<CausalGraph>,
}

/// Run the rollout loop described by `args`.
///
/// # Errors
///
/// Any pool, model or sink failure ends the run.
pub fn run(args: &Args) -> Result<RunSummary> {
    ensure!(args.graph_every > 0, "--graph-every must be positive");
    ensure!(args.latent_dim > 0, "--latent-dim must be positive");

    let config = args.pool_config()?;
    let pong = PongConfig::default();
    let pool = BatchedEnvironmentPool::new(
        |slot| MiniPong::new(PongConfig { seed: args.seed.wrapping_add(slot as u64), ..pong.clone() }),
        config,
    )
    .context("failed to build environment pool")?;
    let batch_size = pool.len();
    let mut session = RolloutSession::new(pool, args.seed)?;
    let num_actions = session.num_actions();

    let mut rng = fastrand::Rng::with_seed(args.seed);
    let mut model = LatentModel::new(
        LinearEncoder::<Frame>::random(pong.size * pong.size, args.latent_dim, &mut rng),
        MlpTransition::random(args.latent_dim, num_actions, &mut rng),
    );
    let builder = CausalGraphBuilder::new(args.latent_dim, num_actions);

    let mut sinks: Vec<Box<dyn VisualizationSink>> = vec![Box::new(LogSink::default())];
    if let Some(path) = &args.output {
        let file = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        sinks.push(Box::new(JsonSink::new(BufWriter::new(file))));
    }

    tracing::info!(
        "Running {} iterations over {} environments, graph every {}",
        args.iterations,
        batch_size,
        args.graph_every
    );
    let mut summary = RunSummary { iterations: 0, episodes_ended: 0, graphs: Vec::new() };
    for iteration in 1..=args.iterations {
        let trajectories = session.get_trajectories(batch_size, ROLLOUT_STEPS)?;
        summary.episodes_ended += trajectories.dones.iter().flatten().filter(|&&done| done).count();
        summary.iterations = iteration;

        if iteration % args.graph_every == 0 {
            let graph = builder.build(&mut model, &trajectories)?;
            for sink in &mut sinks {
                sink.accept(iteration, &graph)?;
            }
            summary.graphs.push(graph);
        }
    }

    tracing::info!(
        "Finished {} iterations: {} episodes ended, {} graphs built",
        summary.iterations,
        summary.episodes_ended,
        summary.graphs.len()
    );
    Ok(summary)
}

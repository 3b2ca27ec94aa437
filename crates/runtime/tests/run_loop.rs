use std::fs;
use std::path::PathBuf;

use clap::Parser;
use envs::ExecutionPolicy;
use runtime::{run, Args};

fn args(extra: &[&str]) -> Args {
    let mut argv = vec!["causal_main", "--envs", "4", "--iterations", "10", "--graph-every", "5"];
    argv.extend_from_slice(extra);
    Args::try_parse_from(argv).unwrap()
}

fn scratch_file(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("causal-runtime-{}-{name}", std::process::id()))
}

#[test]
fn defaults_build_a_graph_every_hundred_iterations() {
    let args = Args::try_parse_from(["causal_main"]).unwrap();
    assert_eq!(args.graph_every, 100);
    assert_eq!(args.latent_dim, 6);
    let config = args.pool_config().unwrap();
    assert_eq!(config.num_envs, 32);
    assert_eq!(config.execution.concurrency(), 4);
}

#[test]
fn flags_override_pool_config() {
    let config = args(&["--sequential"]).pool_config().unwrap();
    assert_eq!(config.num_envs, 4);
    assert_eq!(config.execution, ExecutionPolicy::Sequential);

    let config = args(&["--workers", "2"]).pool_config().unwrap();
    assert_eq!(config.execution.concurrency(), 2);

    assert!(Args::try_parse_from(["causal_main", "--workers", "2", "--sequential"]).is_err());
}

#[test]
fn config_file_is_loaded_then_overridden() {
    let path = scratch_file("pool.json");
    fs::write(&path, r#"{"num_envs": 3, "warmup_steps": 20, "execution": {"kind": "sequential"}}"#).unwrap();
    let path_arg = path.to_str().unwrap().to_owned();

    let from_file = Args::try_parse_from(["causal_main", "--config", &path_arg]).unwrap();
    let config = from_file.pool_config().unwrap();
    assert_eq!((config.num_envs, config.warmup_steps), (3, 20));
    assert_eq!(config.execution, ExecutionPolicy::Sequential);

    let overridden = Args::try_parse_from(["causal_main", "--config", &path_arg, "--envs", "5"]).unwrap();
    assert_eq!(overridden.pool_config().unwrap().num_envs, 5);

    fs::remove_file(&path).unwrap();
}

#[test]
fn missing_config_file_is_reported() {
    let args = Args::try_parse_from(["causal_main", "--config", "/nonexistent/pool.json"]).unwrap();
    let err = args.pool_config().unwrap_err();
    assert!(err.to_string().contains("failed to load pool config"));
}

#[test]
fn graphs_are_built_at_the_requested_cadence() {
    let summary = run(&args(&["--sequential"])).unwrap();
    assert_eq!(summary.iterations, 10);
    assert_eq!(summary.graphs.len(), 2);
    for graph in &summary.graphs {
        assert_eq!(graph.dim, 6);
        assert!(graph.is_zero() || graph.max() == 1.0);
    }
}

#[test]
fn execution_policy_does_not_change_results() {
    let sequential = run(&args(&["--sequential", "--seed", "7"])).unwrap();
    let parallel = run(&args(&["--workers", "3", "--seed", "7"])).unwrap();
    assert_eq!(sequential.graphs, parallel.graphs);
    assert_eq!(sequential.episodes_ended, parallel.episodes_ended);
}

#[test]
fn graphs_are_written_as_json_lines() {
    let path = scratch_file("graphs.jsonl");
    let path_arg = path.to_str().unwrap().to_owned();
    run(&args(&["--sequential", "--latent-dim", "3", "--output", &path_arg])).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    let records: Vec<serde_json::Value> =
        text.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["iteration"], 5);
    assert_eq!(records[1]["iteration"], 10);
    assert_eq!(records[1]["graph"]["dim"], 3);
    assert_eq!(records[1]["graph"]["weights"].as_array().unwrap().len(), 9);

    fs::remove_file(&path).unwrap();
}

#[test]
fn zero_cadence_is_rejected() {
    let mut zero_cadence = args(&["--sequential"]);
    zero_cadence.graph_every = 0;
    let err = run(&zero_cadence).unwrap_err();
    assert!(err.to_string().contains("--graph-every"));
}

#[test]
fn zero_latent_dim_is_rejected() {
    let err = run(&args(&["--sequential", "--latent-dim", "0"])).unwrap_err();
    assert!(err.to_string().contains("--latent-dim"));
}

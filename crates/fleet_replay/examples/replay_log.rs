//! Replay a recorded observation log through the decision core.
//!
//! ```text
//! cargo run --example replay_log -- <data_dir> <observations.jsonl> <metrics.csv>
//! ```
//!
//! `data_dir` must hold `hexagon_grid_table.csv` and
//! `idle_transition_probability.csv`; an `init_values.csv` beside them is
//! picked up as the value-table seed when present.

use std::env;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use fleet_core::agent::Agent;
use fleet_core::params::AgentParams;
use fleet_core::spatial::Grid;
use fleet_replay::{export_metrics_csv, load_jsonl, ReplayRunner};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 4 {
        eprintln!("usage: replay_log <data_dir> <observations.jsonl> <metrics.csv>");
        std::process::exit(2);
    }
    let data_dir = PathBuf::from(&args[1]);
    let log_path = PathBuf::from(&args[2]);
    let out_path = PathBuf::from(&args[3]);

    let grid = Arc::new(Grid::load_service_area(&data_dir)?);
    let mut params = AgentParams::default();
    let seed_path = data_dir.join("init_values.csv");
    if seed_path.exists() {
        params = params.with_initial_values(seed_path);
    }

    let mut runner = ReplayRunner::new(Agent::new(grid, params)?);
    let ticks = load_jsonl(&log_path)?;
    let metrics = runner.run(&ticks)?;

    let matched: usize = metrics.iter().map(|m| m.matches).sum();
    let orders: usize = metrics.iter().map(|m| m.orders).sum();
    let reward: f64 = metrics.iter().map(|m| m.reward_captured).sum();
    println!(
        "replayed {} ticks: {matched}/{orders} orders matched, {reward:.2} reward captured",
        metrics.len()
    );

    export_metrics_csv(&metrics, File::create(&out_path)?)?;
    println!("metrics written to {}", out_path.display());
    Ok(())
}

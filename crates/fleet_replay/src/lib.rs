//! # Fleet Replay Harness
//!
//! Host-side tooling around [`fleet_core`]: replay recorded observation
//! logs through an agent, enforce the per-tick matching invariant, collect
//! matching and repositioning metrics, and export them to CSV.
//!
//! The core itself performs no I/O on the hot path; everything file-shaped
//! lives here.

pub mod error;
pub mod export;
pub mod observations;
pub mod runner;

pub use error::{ReplayError, ReplayResult};
pub use export::export_metrics_csv;
pub use observations::{load_jsonl, TickRecord};
pub use runner::{ReplayRunner, TickMetrics};

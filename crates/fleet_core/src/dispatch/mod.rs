//! Dispatch policies: assign idle drivers to ride requests and learn online.
//!
//! This module provides a trait-based system with exactly two temporal-
//! difference variants sharing one scoring and matching engine:
//!
//! - `Sarsa`: on-policy TD(0) over a single state-value table
//! - `DoubleQ`: double estimator with two tables; a per-tick fair coin picks
//!   which one is written (student) and which provides bootstrap targets
//!   (teacher)
//!
//! Matching is deliberately greedy by descending score rather than an
//! optimal assignment: substituting an optimal matcher changes the learning
//! dynamics, so the greedy walk is part of the contract.

pub mod algorithm;
pub mod double_q;
pub mod sarsa;
mod scoring;
pub mod types;

pub use algorithm::Dispatcher;
pub use double_q::DoubleQ;
pub use sarsa::Sarsa;
pub use types::{DiscountMode, Match, TdParams};

/// Seconds per TD time step; ride durations are converted to steps with
/// this divisor before discounting.
pub const STEP_SECS: f64 = 2.0;

//! # Fleet Dispatch Decision Core
//!
//! The decision core of a ride-hailing fleet controller. At every simulator
//! tick it solves two coupled problems:
//!
//! - **Order dispatch**: assign at most one idle driver to each pending ride
//!   request, scored against a learned per-cell state-value table and matched
//!   greedily by descending score.
//! - **Idle repositioning**: recommend a destination grid cell for each
//!   unassigned idle driver, maximising ETA-discounted value gain.
//!
//! ## Key concepts
//!
//! - **Online TD learning**: the value table is updated during serving by a
//!   Sarsa or double-Q temporal-difference rule; there is no offline phase.
//! - **Cancellation risk**: pickup distance maps to a completion probability
//!   that scales every expected reward.
//! - **Deterministic**: seeded RNG and stable orderings make the same inputs
//!   reproduce the same outputs.
//! - **Single-threaded per tick**: the host calls `dispatch` and
//!   `reposition` sequentially; no I/O happens on the hot path.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use fleet_core::agent::Agent;
//! use fleet_core::params::AgentParams;
//! use fleet_core::spatial::Grid;
//!
//! let grid = Arc::new(Grid::load_service_area(Path::new("data")).unwrap());
//! let mut agent = Agent::new(grid, AgentParams::default()).unwrap();
//!
//! let assignments = agent.dispatch(&[]);
//! assert!(assignments.is_empty());
//! ```

pub mod agent;
pub mod cancellation;
pub mod dispatch;
pub mod error;
pub mod observation;
pub mod params;
pub mod reposition;
pub mod spatial;
pub mod values;

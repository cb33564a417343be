//! Idle repositioning: move unassigned drivers toward high-value cells.
//!
//! The planner is a bounded brute-force search: rank every cell by its
//! current state value, keep the top `K = candidate_factor * |drivers|`,
//! and give each driver the candidate with the best ETA-discounted value
//! gain. A destination-exclusion set stops the fleet piling into one hot
//! cell. The cap is part of the contract: it is what keeps a tick inside
//! the host's wall-clock budget on an 8.5k-cell grid.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use crate::dispatch::Dispatcher;
use crate::observation::RepositionObservation;
use crate::spatial::{CellId, Grid};

/// Metres an idle driver covers per 2-second TD step (3 m/s).
pub const SPEED_M_PER_STEP: f64 = 6.0;

/// Destination recommendation for one idle driver.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepositionDecision {
    pub driver_id: String,
    pub destination: CellId,
}

/// Trait for reposition planners.
pub trait Repositioner: Send {
    /// Propose a destination cell for each idle driver, in input order.
    /// Drivers keep their current cell when no candidate has positive gain.
    fn reposition(
        &self,
        dispatcher: &dyn Dispatcher,
        data: &RepositionObservation,
    ) -> Vec<RepositionDecision>;
}

/// Greedy state-value repositioner reading the dispatcher's value estimate.
pub struct StateValueGreedy {
    grid: Arc<Grid>,
    gamma: f64,
    candidate_factor: usize,
}

impl StateValueGreedy {
    pub fn new(grid: Arc<Grid>, gamma: f64, candidate_factor: usize) -> Self {
        Self {
            grid,
            gamma,
            candidate_factor,
        }
    }
}

impl Repositioner for StateValueGreedy {
    fn reposition(
        &self,
        dispatcher: &dyn Dispatcher,
        data: &RepositionObservation,
    ) -> Vec<RepositionDecision> {
        if data.driver_info.is_empty() {
            return Vec::new();
        }

        // Rank cells by current value once per tick. The sort is stable, so
        // ties keep grid load order and the ranking is deterministic.
        let mut ranked: Vec<(&CellId, f64)> = self
            .grid
            .cells()
            .map(|cell| (&cell.id, dispatcher.state_value(&cell.id)))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        let cap = (self.candidate_factor * data.driver_info.len()).min(ranked.len());
        ranked.truncate(cap);

        let mut taken: HashSet<CellId> = HashSet::new();
        let mut decisions = Vec::with_capacity(data.driver_info.len());

        for info in &data.driver_info {
            let current = CellId::from(info.grid_id.as_str());
            if !self.grid.contains(&current) {
                // Unknown cell: pass it through untouched.
                taken.insert(current.clone());
                decisions.push(RepositionDecision {
                    driver_id: info.driver_id.clone(),
                    destination: current,
                });
                continue;
            }

            let v_cur = dispatcher.state_value(&current);
            let mut best: Option<(&CellId, f64)> = None;
            for &(cell, value) in &ranked {
                if taken.contains(cell) {
                    continue;
                }
                let eta_steps = self.grid.distance_fast(&current, cell) / SPEED_M_PER_STEP;
                let gain = self.gamma.powf(eta_steps) * value - v_cur;
                if !gain.is_finite() {
                    continue;
                }
                if gain > best.map_or(0.0, |(_, g)| g) {
                    best = Some((cell, gain));
                }
            }

            let destination = match best {
                Some((cell, _)) => cell.clone(),
                None => current,
            };
            taken.insert(destination.clone());
            decisions.push(RepositionDecision {
                driver_id: info.driver_id.clone(),
                destination,
            });
        }

        decisions
    }
}

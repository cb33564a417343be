//! On-policy Sarsa dispatcher over a single state-value table.

use std::collections::HashSet;
use std::sync::Arc;

use crate::observation::ParsedDispatch;
use crate::spatial::{CellId, Grid};
use crate::values::ValueTable;

use super::algorithm::Dispatcher;
use super::scoring::{expected_idle_target, greedy_match, score_candidates};
use super::types::{Match, TdParams};

/// Sarsa dispatcher: scores candidates against one value table, matches
/// greedily, and applies TD(0) updates for matches, idle drivers, and
/// (optionally) open requests.
pub struct Sarsa {
    grid: Arc<Grid>,
    values: ValueTable,
    td: TdParams,
    clock: i64,
}

impl Sarsa {
    pub fn new(grid: Arc<Grid>, values: ValueTable, td: TdParams) -> Self {
        Self {
            grid,
            values,
            td,
            clock: 0,
        }
    }

    pub fn values(&self) -> &ValueTable {
        &self.values
    }
}

impl Dispatcher for Sarsa {
    fn dispatch(&mut self, parsed: &ParsedDispatch) -> Vec<Match> {
        if parsed.is_empty() {
            return Vec::new();
        }
        if let Some(newest) = parsed.requests.values().map(|r| r.request_ts).max() {
            self.clock = self.clock.max(newest);
        }
        let now = self.clock;
        let now_f = now as f64;

        let scored = score_candidates(parsed, now, &self.td, &|cell, ts| self.values.get(cell, ts));
        let accepted = greedy_match(parsed, &scored);

        let mut matches = Vec::with_capacity(accepted.len());
        let mut assigned_drivers: HashSet<&str> = HashSet::new();
        let mut matched_orders: HashSet<&str> = HashSet::new();

        // Accepted matches first, in acceptance order: the driver's current
        // cell absorbs the full score as its TD error.
        for pair in &accepted {
            let candidate = &parsed.candidates[pair.idx];
            let driver = &parsed.drivers[&candidate.driver_id];
            self.values
                .add(&driver.cell, now_f, self.td.alpha * pair.score);
            assigned_drivers.insert(candidate.driver_id.as_str());
            matched_orders.insert(candidate.order_id.as_str());
            matches.push(Match {
                order_id: candidate.order_id.clone(),
                driver_id: candidate.driver_id.clone(),
                distance_m: candidate.distance_m,
                eta_s: candidate.eta_s,
                score: pair.score,
            });
        }

        // Unassigned drivers drift per the idle-transition chain; the
        // expected-Sarsa target weights the next-step value across it.
        for driver_id in &parsed.driver_order {
            if assigned_drivers.contains(driver_id.as_str()) {
                continue;
            }
            let Some(driver) = parsed.drivers.get(driver_id) else {
                continue;
            };
            let v0 = self.values.get(&driver.cell, now_f);
            let v1 = expected_idle_target(&self.grid, &self.values, &driver.cell, now);
            let update = self.td.idle_reward + self.td.gamma * v1 - v0;
            self.values.add(&driver.cell, now_f, self.td.alpha * update);
        }

        // Open requests last: nudge the start cell toward the would-be
        // destination value, positive deltas only.
        if self.td.open_request_weight > 0.0 {
            for order_id in &parsed.request_order {
                if matched_orders.contains(order_id.as_str()) {
                    continue;
                }
                let Some(request) = parsed.requests.get(order_id) else {
                    continue;
                };
                let duration = (request.finish_ts - request.request_ts) as f64;
                let v0 = self.values.get(&request.start_cell, now_f);
                let v1 = self.values.get(&request.end_cell, now_f + duration);
                let update = self.td.open_request_weight
                    * (request.reward + self.td.discount(TdParams::steps(duration)) * v1 - v0);
                if update > 0.0 && update.is_finite() {
                    self.values
                        .add(&request.start_cell, now_f, self.td.alpha * update);
                }
            }
        }

        matches
    }

    fn state_value(&self, cell: &CellId) -> f64 {
        self.values.get(cell, self.clock as f64)
    }

    fn clock(&self) -> i64 {
        self.clock
    }
}

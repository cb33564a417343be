//! Double-Q dispatcher: two value tables with coin-flipped roles.
//!
//! Keeping separate sample and bootstrap estimators removes the
//! maximisation bias a single table picks up when the same estimate both
//! selects and evaluates. Scoring and matching read the joint sum of both
//! tables; each tick a seeded fair coin designates one table the *student*
//! (receives every write) and the other the *teacher* (supplies bootstrap
//! targets only).

use std::collections::HashSet;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::observation::ParsedDispatch;
use crate::spatial::{CellId, Grid};
use crate::values::ValueTable;

use super::algorithm::Dispatcher;
use super::scoring::{expected_idle_target, greedy_match, score_candidates};
use super::types::{Match, TdParams};

pub struct DoubleQ {
    grid: Arc<Grid>,
    values_a: ValueTable,
    values_b: ValueTable,
    td: TdParams,
    rng: StdRng,
    clock: i64,
}

impl DoubleQ {
    pub fn new(
        grid: Arc<Grid>,
        values_a: ValueTable,
        values_b: ValueTable,
        td: TdParams,
        seed: u64,
    ) -> Self {
        Self {
            grid,
            values_a,
            values_b,
            td,
            rng: StdRng::seed_from_u64(seed),
            clock: 0,
        }
    }

    /// Both halves of the estimator, `(A, B)`.
    pub fn tables(&self) -> (&ValueTable, &ValueTable) {
        (&self.values_a, &self.values_b)
    }
}

impl Dispatcher for DoubleQ {
    fn dispatch(&mut self, parsed: &ParsedDispatch) -> Vec<Match> {
        if parsed.is_empty() {
            return Vec::new();
        }
        if let Some(newest) = parsed.requests.values().map(|r| r.request_ts).max() {
            self.clock = self.clock.max(newest);
        }
        let now = self.clock;
        let now_f = now as f64;

        // One coin per tick decides which table learns.
        let a_is_student = self.rng.gen_bool(0.5);

        let scored = score_candidates(parsed, now, &self.td, &|cell, ts| {
            self.values_a.get(cell, ts) + self.values_b.get(cell, ts)
        });
        let accepted = greedy_match(parsed, &scored);

        let td = self.td;
        let (student, teacher) = if a_is_student {
            (&mut self.values_a, &self.values_b)
        } else {
            (&mut self.values_b, &self.values_a)
        };

        let mut matches = Vec::with_capacity(accepted.len());
        let mut assigned_drivers: HashSet<&str> = HashSet::new();
        let mut matched_orders: HashSet<&str> = HashSet::new();

        // Matches first: the TD error is recomputed with the student/teacher
        // split (the joint-sum score only drives selection).
        for pair in &accepted {
            let candidate = &parsed.candidates[pair.idx];
            let driver = &parsed.drivers[&candidate.driver_id];
            let v0 = student.get(&driver.cell, now_f);
            let v1 = teacher.get(&parsed.requests[&candidate.order_id].end_cell, pair.arrival);
            let update = pair.expected + td.discount(pair.tau) * v1 - v0;
            student.add(&driver.cell, now_f, td.alpha * update);
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

        // Idle drivers: expected-Sarsa target from the teacher, written to
        // the student.
        for driver_id in &parsed.driver_order {
            if assigned_drivers.contains(driver_id.as_str()) {
                continue;
            }
            let Some(driver) = parsed.drivers.get(driver_id) else {
                continue;
            };
            let v0 = student.get(&driver.cell, now_f);
            let v1 = expected_idle_target(&self.grid, teacher, &driver.cell, now);
            let update = td.idle_reward + td.gamma * v1 - v0;
            student.add(&driver.cell, now_f, td.alpha * update);
        }

        // Open requests last, positive deltas only.
        if td.open_request_weight > 0.0 {
            for order_id in &parsed.request_order {
                if matched_orders.contains(order_id.as_str()) {
                    continue;
                }
                let Some(request) = parsed.requests.get(order_id) else {
                    continue;
                };
                let duration = (request.finish_ts - request.request_ts) as f64;
                let v0 = student.get(&request.start_cell, now_f);
                let v1 = teacher.get(&request.end_cell, now_f + duration);
                let update = td.open_request_weight
                    * (request.reward + td.discount(TdParams::steps(duration)) * v1 - v0);
                if update > 0.0 && update.is_finite() {
                    student.add(&request.start_cell, now_f, td.alpha * update);
                }
            }
        }

        matches
    }

    fn state_value(&self, cell: &CellId) -> f64 {
        let now_f = self.clock as f64;
        self.values_a.get(cell, now_f) + self.values_b.get(cell, now_f)
    }

    fn clock(&self) -> i64 {
        self.clock
    }
}

//! Scoring and greedy matching shared by both dispatcher variants.

use std::cmp::Ordering;
use std::collections::HashSet;

use log::debug;

use crate::cancellation::completion_rate;
use crate::observation::ParsedDispatch;
use crate::spatial::{CellId, Grid};
use crate::values::ValueTable;

use super::types::TdParams;
use super::STEP_SECS;

/// A candidate that survived scoring, with everything the TD updates need.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ScoredPair {
    /// Index into `ParsedDispatch::candidates`.
    pub idx: usize,
    /// Full score: expected reward plus discounted value gain.
    pub score: f64,
    /// Cancellation-weighted reward.
    pub expected: f64,
    /// Ride length in TD steps (pickup ETA plus ride duration).
    pub tau: f64,
    /// Timestamp at which the driver would arrive at the destination.
    pub arrival: f64,
}

/// Score every candidate against the value estimate `read`, drop the ones
/// not worth taking, and sort by descending score.
///
/// The sort is stable, so candidates with equal scores keep input order.
pub(crate) fn score_candidates(
    parsed: &ParsedDispatch,
    now: i64,
    td: &TdParams,
    read: &dyn Fn(&CellId, f64) -> f64,
) -> Vec<ScoredPair> {
    let now_f = now as f64;
    let mut scored = Vec::with_capacity(parsed.candidates.len());
    for (idx, candidate) in parsed.candidates.iter().enumerate() {
        let Some(request) = parsed.requests.get(&candidate.order_id) else {
            debug!("candidate references unknown order {}", candidate.order_id);
            continue;
        };
        let Some(driver) = parsed.drivers.get(&candidate.driver_id) else {
            debug!("candidate references unknown driver {}", candidate.driver_id);
            continue;
        };

        let expected = completion_rate(candidate.distance_m) * request.reward;
        let duration = (request.finish_ts - request.request_ts) as f64;
        let tau = (duration + candidate.eta_s) / STEP_SECS;
        let arrival = now_f + duration + candidate.eta_s;
        let v0 = read(&driver.cell, now_f);
        let v1 = read(&request.end_cell, arrival);
        let score = expected + td.discount(tau) * v1 - v0;

        if !score.is_finite() {
            debug!(
                "skipping degenerate score for order {} driver {}",
                candidate.order_id, candidate.driver_id
            );
            continue;
        }
        // Not worth taking: the ride itself has no expected value, or the
        // driver's current position is worth more than the move.
        if expected <= 0.0 || score <= 0.0 {
            continue;
        }
        scored.push(ScoredPair {
            idx,
            score,
            expected,
            tau,
            arrival,
        });
    }
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored
}

/// Walk the sorted candidates and accept each pair whose order and driver
/// are both still free. Greedy 1-to-1 matching, O(N log N) including the
/// sort; intentionally not an optimal assignment.
pub(crate) fn greedy_match(parsed: &ParsedDispatch, scored: &[ScoredPair]) -> Vec<ScoredPair> {
    let mut used_orders: HashSet<&str> = HashSet::new();
    let mut used_drivers: HashSet<&str> = HashSet::new();
    let mut accepted = Vec::new();
    for pair in scored {
        let candidate = &parsed.candidates[pair.idx];
        if used_orders.contains(candidate.order_id.as_str())
            || used_drivers.contains(candidate.driver_id.as_str())
        {
            continue;
        }
        used_orders.insert(&candidate.order_id);
        used_drivers.insert(&candidate.driver_id);
        accepted.push(*pair);
    }
    accepted
}

/// Expected value of the next state for an idle driver at `cell`: the
/// probability-weighted value one step ahead across the idle-transition
/// distribution.
pub(crate) fn expected_idle_target(
    grid: &Grid,
    values: &ValueTable,
    cell: &CellId,
    now: i64,
) -> f64 {
    let next = now as f64 + STEP_SECS;
    grid.idle_transitions(now, cell)
        .map(|(destination, p)| p * values.get(destination, next))
        .sum()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crate::observation::{DispatchCandidate, Driver, Request};

    use super::*;

    fn parsed_two_orders_one_driver() -> ParsedDispatch {
        let mut parsed = ParsedDispatch::default();
        parsed.drivers.insert(
            "d1".into(),
            Driver {
                driver_id: "d1".into(),
                cell: CellId::from("a"),
            },
        );
        parsed.driver_order.push("d1".into());
        for (order, reward) in [("r1", 5.0), ("r2", 1.0)] {
            parsed.requests.insert(
                order.into(),
                Request {
                    order_id: order.into(),
                    start_cell: CellId::from("a"),
                    end_cell: CellId::from("b"),
                    request_ts: 1_000,
                    finish_ts: 1_600,
                    day_of_week: 0,
                    reward,
                },
            );
            parsed.request_order.push(order.into());
            let idx = parsed.candidates.len();
            parsed.candidates.push(DispatchCandidate {
                order_id: order.into(),
                driver_id: "d1".into(),
                distance_m: 0.0,
                eta_s: 0.0,
            });
            parsed.by_order.entry(order.into()).or_default().push(idx);
        }
        parsed
    }

    #[test]
    fn scoring_ranks_richer_order_first() {
        let parsed = parsed_two_orders_one_driver();
        let td = TdParams::default();
        let values: HashMap<CellId, f64> = HashMap::new();
        let read = move |cell: &CellId, _ts: f64| values.get(cell).copied().unwrap_or(0.0);
        let scored = score_candidates(&parsed, 1_000, &td, &read);
        assert_eq!(scored.len(), 2);
        assert!(scored[0].score > scored[1].score);
        assert_eq!(parsed.candidates[scored[0].idx].order_id, "r1");
    }

    #[test]
    fn greedy_match_gives_contested_driver_to_best_score() {
        let parsed = parsed_two_orders_one_driver();
        let td = TdParams::default();
        let read = |_: &CellId, _: f64| 0.0;
        let scored = score_candidates(&parsed, 1_000, &td, &read);
        let accepted = greedy_match(&parsed, &scored);
        assert_eq!(accepted.len(), 1);
        assert_eq!(parsed.candidates[accepted[0].idx].order_id, "r1");
    }

    #[test]
    fn candidate_with_unknown_driver_is_skipped() {
        let mut parsed = parsed_two_orders_one_driver();
        parsed.candidates.push(DispatchCandidate {
            order_id: "r1".into(),
            driver_id: "ghost".into(),
            distance_m: 0.0,
            eta_s: 0.0,
        });
        let td = TdParams::default();
        let read = |_: &CellId, _: f64| 0.0;
        let scored = score_candidates(&parsed, 1_000, &td, &read);
        assert_eq!(scored.len(), 2);
    }

    #[test]
    fn idle_target_weights_transition_distribution() {
        let grid = Grid::from_parts(
            vec![
                (CellId::from("a"), 104.00, 30.60),
                (CellId::from("b"), 104.01, 30.60),
            ],
            vec![
                (0, CellId::from("a"), CellId::from("a"), 0.25),
                (0, CellId::from("a"), CellId::from("b"), 0.75),
            ],
        )
        .expect("grid");
        let mut values = ValueTable::scalar();
        values.add(&CellId::from("a"), 0.0, 4.0);
        values.add(&CellId::from("b"), 0.0, 8.0);

        let target = expected_idle_target(&grid, &values, &CellId::from("a"), 0);
        assert!((target - (0.25 * 4.0 + 0.75 * 8.0)).abs() < 1e-12);
    }
}

//! Replay recorded ticks through an agent and collect per-tick metrics.

use std::collections::{HashMap, HashSet};

use fleet_core::agent::Agent;
use log::debug;
use serde::Serialize;

use crate::error::{ReplayError, ReplayResult};
use crate::observations::TickRecord;

/// Matching and repositioning metrics for one replayed tick.
#[derive(Debug, Clone, Serialize)]
pub struct TickMetrics {
    pub tick: usize,
    pub orders: usize,
    pub candidates: usize,
    pub matches: usize,
    /// Matched orders as a fraction of all orders in the tick.
    pub match_rate: f64,
    /// Sum of reward units across matched orders.
    pub reward_captured: f64,
    /// Mean pickup distance of accepted matches, metres. 0 when no matches.
    pub mean_pickup_distance_m: f64,
    /// Idle drivers told to move to a cell other than their current one.
    pub repositioned: usize,
}

/// Drives an [`Agent`] through a recorded observation log, enforcing the
/// matching invariant on every tick.
pub struct ReplayRunner {
    agent: Agent,
}

impl ReplayRunner {
    pub fn new(agent: Agent) -> Self {
        Self { agent }
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn run(&mut self, ticks: &[TickRecord]) -> ReplayResult<Vec<TickMetrics>> {
        let mut all_metrics = Vec::with_capacity(ticks.len());
        for (tick, record) in ticks.iter().enumerate() {
            let rewards: HashMap<&str, f64> = record
                .dispatch
                .iter()
                .map(|r| (r.order_id.as_str(), r.reward_units))
                .collect();
            let orders = rewards.len();

            let matches = self.agent.dispatch_detailed(&record.dispatch);

            let mut seen_orders = HashSet::new();
            let mut seen_drivers = HashSet::new();
            for m in &matches {
                if !seen_orders.insert(m.order_id.as_str())
                    || !seen_drivers.insert(m.driver_id.as_str())
                {
                    return Err(ReplayError::InvalidMatching { tick });
                }
            }

            let reward_captured = matches
                .iter()
                .map(|m| rewards.get(m.order_id.as_str()).copied().unwrap_or(0.0))
                .sum();
            let mean_pickup_distance_m = if matches.is_empty() {
                0.0
            } else {
                matches.iter().map(|m| m.distance_m).sum::<f64>() / matches.len() as f64
            };

            let repositioned = match &record.reposition {
                Some(observation) => {
                    let decisions = self.agent.reposition(observation);
                    observation
                        .driver_info
                        .iter()
                        .zip(&decisions)
                        .filter(|(info, decision)| {
                            info.grid_id != decision.destination.as_str()
                        })
                        .count()
                }
                None => 0,
            };

            debug!(
                "tick {tick}: {}/{} orders matched, {repositioned} repositioned",
                matches.len(),
                orders
            );
            all_metrics.push(TickMetrics {
                tick,
                orders,
                candidates: record.dispatch.len(),
                matches: matches.len(),
                match_rate: if orders == 0 {
                    0.0
                } else {
                    matches.len() as f64 / orders as f64
                },
                reward_captured,
                mean_pickup_distance_m,
                repositioned,
            });
        }
        Ok(all_metrics)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use fleet_core::observation::{DispatchRecord, DriverInfo, RepositionObservation};
    use fleet_core::params::AgentParams;
    use fleet_core::spatial::{CellId, Grid};

    use super::*;

    fn test_agent() -> Agent {
        let grid = Arc::new(
            Grid::from_parts(
                vec![
                    (CellId::from("a"), 104.00, 30.60),
                    (CellId::from("b"), 104.02, 30.60),
                ],
                vec![],
            )
            .expect("grid"),
        );
        Agent::new(grid, AgentParams::default()).expect("agent")
    }

    fn dispatch_record(order: &str, driver: &str, reward: f64) -> DispatchRecord {
        DispatchRecord {
            order_id: order.into(),
            driver_id: driver.into(),
            order_driver_distance: 100.0,
            order_start_location: [104.00, 30.60],
            order_finish_location: [104.02, 30.60],
            driver_location: [104.00, 30.60],
            timestamp: 1_000,
            order_finish_timestamp: 1_600,
            day_of_week: 0,
            reward_units: reward,
            pick_up_eta: 10.0,
        }
    }

    #[test]
    fn collects_matching_and_reposition_metrics() {
        let mut runner = ReplayRunner::new(test_agent());
        let ticks = vec![
            TickRecord {
                dispatch: vec![
                    dispatch_record("r1", "d1", 2.0),
                    dispatch_record("r2", "d2", 1.0),
                ],
                reposition: Some(RepositionObservation {
                    timestamp: 1_000,
                    day_of_week: 0,
                    driver_info: vec![DriverInfo {
                        driver_id: "d3".into(),
                        grid_id: "b".into(),
                    }],
                }),
            },
            TickRecord {
                dispatch: Vec::new(),
                reposition: None,
            },
        ];

        let metrics = runner.run(&ticks).expect("run");
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].orders, 2);
        assert_eq!(metrics[0].matches, 2);
        assert_eq!(metrics[0].match_rate, 1.0);
        assert_eq!(metrics[0].reward_captured, 3.0);
        assert_eq!(metrics[0].mean_pickup_distance_m, 100.0);
        assert_eq!(metrics[1].orders, 0);
        assert_eq!(metrics[1].match_rate, 0.0);
    }
}

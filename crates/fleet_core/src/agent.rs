//! Per-tick orchestrator: parse, dispatch, reposition, format output.

use std::sync::Arc;

use serde::Serialize;

use crate::dispatch::{Dispatcher, DoubleQ, Match, Sarsa};
use crate::error::CoreResult;
use crate::observation::{parse_dispatch, DispatchRecord, RepositionObservation};
use crate::params::{AgentParams, DispatcherKind};
use crate::reposition::{RepositionDecision, Repositioner, StateValueGreedy};
use crate::spatial::Grid;
use crate::values::ValueTable;

/// One (order, driver) pair of the dispatch output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pub order_id: String,
    pub driver_id: String,
}

/// Stateless facade over one dispatcher and one repositioner, both held for
/// process lifetime. The agent itself caches nothing across ticks; all
/// long-lived state (value tables, clock) lives inside the dispatcher.
pub struct Agent {
    grid: Arc<Grid>,
    dispatcher: Box<dyn Dispatcher>,
    repositioner: Box<dyn Repositioner>,
}

impl Agent {
    /// Build an agent. Fails fast on bad hyperparameters or an unreadable
    /// seed-value file; the process should not start in that case.
    pub fn new(grid: Arc<Grid>, params: AgentParams) -> CoreResult<Self> {
        params.validate()?;
        let td = params.td_params();

        let dispatcher: Box<dyn Dispatcher> = match params.dispatcher {
            DispatcherKind::Sarsa => {
                let mut values = ValueTable::new(params.value_kind, params.hour_basis);
                if let Some(path) = &params.initial_values {
                    values.seed_from_csv(path)?;
                }
                Box::new(Sarsa::new(grid.clone(), values, td))
            }
            DispatcherKind::DoubleQ => {
                let mut values_a = ValueTable::new(params.value_kind, params.hour_basis);
                let mut values_b = ValueTable::new(params.value_kind, params.hour_basis);
                if let Some(path) = &params.initial_values {
                    // Split the seed across the halves so the joint reading
                    // starts at the seeded value.
                    values_a.seed_from_csv(path)?;
                    values_a.scale(0.5);
                    values_b.seed_from_csv(path)?;
                    values_b.scale(0.5);
                }
                Box::new(DoubleQ::new(grid.clone(), values_a, values_b, td, params.seed))
            }
        };

        let repositioner = Box::new(StateValueGreedy::new(
            grid.clone(),
            params.gamma,
            params.reposition_candidate_factor,
        ));

        Ok(Self {
            grid,
            dispatcher,
            repositioner,
        })
    }

    /// Compute the driver-order assignment for one tick.
    pub fn dispatch(&mut self, records: &[DispatchRecord]) -> Vec<Assignment> {
        self.dispatch_detailed(records)
            .into_iter()
            .map(|m| Assignment {
                order_id: m.order_id,
                driver_id: m.driver_id,
            })
            .collect()
    }

    /// Like [`Agent::dispatch`] but keeps per-match diagnostics (pickup
    /// distance, ETA, score) for harnesses and metrics.
    pub fn dispatch_detailed(&mut self, records: &[DispatchRecord]) -> Vec<Match> {
        let parsed = parse_dispatch(&self.grid, records);
        self.dispatcher.dispatch(&parsed)
    }

    /// Recommend a destination cell for each idle driver.
    pub fn reposition(&self, observation: &RepositionObservation) -> Vec<RepositionDecision> {
        if observation.driver_info.is_empty() {
            return Vec::new();
        }
        self.repositioner
            .reposition(self.dispatcher.as_ref(), observation)
    }

    /// Read-only view of the dispatcher, for metrics and tests.
    pub fn dispatcher(&self) -> &dyn Dispatcher {
        self.dispatcher.as_ref()
    }
}

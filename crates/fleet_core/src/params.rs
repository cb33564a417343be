//! Agent construction parameters.

use std::path::PathBuf;

use crate::dispatch::{DiscountMode, TdParams};
use crate::error::{CoreError, CoreResult};
use crate::values::{HourBasis, ValueKind};

/// Which dispatcher variant to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatcherKind {
    #[default]
    Sarsa,
    DoubleQ,
}

/// Parameters for building an [`crate::agent::Agent`].
#[derive(Debug, Clone)]
pub struct AgentParams {
    pub dispatcher: DispatcherKind,
    pub value_kind: ValueKind,
    pub hour_basis: HourBasis,
    pub discount_mode: DiscountMode,
    /// Learning rate; positive.
    pub alpha: f64,
    /// Discount factor; in (0, 1).
    pub gamma: f64,
    /// Per-tick reward for an unassigned idle driver; non-positive.
    pub idle_reward: f64,
    /// Weight of the open-request update; 0 disables it. Whether the update
    /// helps was inconclusive in experiments, so it ships off by default.
    pub open_request_weight: f64,
    /// Seed for the double-Q coin; same seed and inputs reproduce outputs.
    pub seed: u64,
    /// Reposition candidate cap, as a multiple of the idle-driver count.
    pub reposition_candidate_factor: usize,
    /// Optional seed-value CSV applied to the value table(s) at startup.
    pub initial_values: Option<PathBuf>,
}

impl Default for AgentParams {
    fn default() -> Self {
        Self {
            dispatcher: DispatcherKind::default(),
            value_kind: ValueKind::default(),
            hour_basis: HourBasis::default(),
            discount_mode: DiscountMode::default(),
            alpha: 0.0067,
            gamma: 0.9999,
            idle_reward: 0.0,
            open_request_weight: 0.0,
            seed: 0,
            reposition_candidate_factor: 10,
            initial_values: None,
        }
    }
}

impl AgentParams {
    pub fn with_dispatcher(mut self, dispatcher: DispatcherKind) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn with_value_kind(mut self, value_kind: ValueKind) -> Self {
        self.value_kind = value_kind;
        self
    }

    pub fn with_hour_basis(mut self, hour_basis: HourBasis) -> Self {
        self.hour_basis = hour_basis;
        self
    }

    pub fn with_discount_mode(mut self, discount_mode: DiscountMode) -> Self {
        self.discount_mode = discount_mode;
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_idle_reward(mut self, idle_reward: f64) -> Self {
        self.idle_reward = idle_reward;
        self
    }

    pub fn with_open_request_weight(mut self, weight: f64) -> Self {
        self.open_request_weight = weight;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_reposition_candidate_factor(mut self, factor: usize) -> Self {
        self.reposition_candidate_factor = factor;
        self
    }

    pub fn with_initial_values(mut self, path: impl Into<PathBuf>) -> Self {
        self.initial_values = Some(path.into());
        self
    }

    /// Check the hyperparameter constraints. Construction-time failures are
    /// fatal by design.
    pub fn validate(&self) -> CoreResult<()> {
        if !(self.alpha.is_finite() && self.alpha > 0.0) {
            return Err(CoreError::Config(format!("alpha must be positive, got {}", self.alpha)));
        }
        if !(self.gamma.is_finite() && self.gamma > 0.0 && self.gamma < 1.0) {
            return Err(CoreError::Config(format!(
                "gamma must be in (0, 1), got {}",
                self.gamma
            )));
        }
        if !(self.idle_reward.is_finite() && self.idle_reward <= 0.0) {
            return Err(CoreError::Config(format!(
                "idle_reward must be non-positive, got {}",
                self.idle_reward
            )));
        }
        if !(self.open_request_weight.is_finite() && self.open_request_weight >= 0.0) {
            return Err(CoreError::Config(format!(
                "open_request_weight must be non-negative, got {}",
                self.open_request_weight
            )));
        }
        if self.reposition_candidate_factor == 0 {
            return Err(CoreError::Config(
                "reposition_candidate_factor must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn td_params(&self) -> TdParams {
        TdParams {
            alpha: self.alpha,
            gamma: self.gamma,
            idle_reward: self.idle_reward,
            open_request_weight: self.open_request_weight,
            discount_mode: self.discount_mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        AgentParams::default().validate().expect("defaults");
    }

    #[test]
    fn builders_compose() {
        let params = AgentParams::default()
            .with_dispatcher(DispatcherKind::DoubleQ)
            .with_alpha(0.01)
            .with_gamma(0.99)
            .with_idle_reward(-0.001)
            .with_seed(17)
            .with_reposition_candidate_factor(5);
        params.validate().expect("valid");
        assert_eq!(params.dispatcher, DispatcherKind::DoubleQ);
        assert_eq!(params.seed, 17);
    }

    #[test]
    fn constraint_violations_are_rejected() {
        assert!(AgentParams::default().with_alpha(0.0).validate().is_err());
        assert!(AgentParams::default().with_gamma(1.0).validate().is_err());
        assert!(AgentParams::default().with_idle_reward(0.5).validate().is_err());
        assert!(AgentParams::default()
            .with_open_request_weight(-1.0)
            .validate()
            .is_err());
        assert!(AgentParams::default()
            .with_reposition_candidate_factor(0)
            .validate()
            .is_err());
    }
}

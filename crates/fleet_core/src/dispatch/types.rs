use super::STEP_SECS;

/// An accepted (order, driver) pair with its scoring diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub order_id: String,
    pub driver_id: String,
    pub distance_m: f64,
    pub eta_s: f64,
    pub score: f64,
}

/// Functional form of the discount applied to multi-step rides.
///
/// `PerStep` raises gamma to the ride length in 2-second steps; `Flat`
/// applies a single factor of gamma regardless of duration (the form some
/// earlier experiments used).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiscountMode {
    #[default]
    PerStep,
    Flat,
}

/// Temporal-difference hyperparameters shared by both dispatcher variants.
#[derive(Debug, Clone, Copy)]
pub struct TdParams {
    /// Learning rate.
    pub alpha: f64,
    /// Discount factor, in (0, 1).
    pub gamma: f64,
    /// Per-tick reward for an unassigned idle driver; non-positive.
    pub idle_reward: f64,
    /// Weight of the open-request update; 0 disables it.
    pub open_request_weight: f64,
    /// Discount form for multi-step rides.
    pub discount_mode: DiscountMode,
}

impl TdParams {
    /// Discount for a ride spanning `steps` TD steps.
    pub(crate) fn discount(&self, steps: f64) -> f64 {
        match self.discount_mode {
            DiscountMode::PerStep => self.gamma.powf(steps),
            DiscountMode::Flat => self.gamma,
        }
    }

    /// Convert a duration in seconds to TD steps.
    pub(crate) fn steps(duration_secs: f64) -> f64 {
        duration_secs / STEP_SECS
    }
}

impl Default for TdParams {
    fn default() -> Self {
        Self {
            alpha: 0.0067,
            gamma: 0.9999,
            idle_reward: 0.0,
            open_request_weight: 0.0,
            discount_mode: DiscountMode::PerStep,
        }
    }
}

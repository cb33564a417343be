//! Cancellation model: pickup distance to ride-completion probability.
//!
//! Riders cancel more often the farther away the assigned driver starts. The
//! curve is an exponential fit against the published mean cancellation rates
//! observed at 200 m distance buckets.

/// Coefficient of the exponential cancellation fit.
pub const CANCEL_COEF: f64 = 0.028_806_19;

/// Rate constant of the exponential cancellation fit (per metre).
pub const CANCEL_RATE: f64 = 0.000_753_71;

/// Mean observed cancellation probability at pickup distances of
/// 200 m, 400 m, ... 2000 m. Kept for regression tests against the fit.
pub const MEAN_CANCEL_RATES: [f64; 10] = [
    0.0349, 0.0387, 0.0418, 0.0501, 0.0592, 0.0746, 0.0857, 0.0985, 0.1123, 0.1272,
];

/// Probability that a ride completes (is not cancelled) given the
/// order-driver pickup distance in metres.
///
/// Monotone non-increasing in distance, always in `[0, 1]`, and tends to 0
/// as the distance grows.
pub fn completion_rate(distance_m: f64) -> f64 {
    1.0 - (CANCEL_COEF * (CANCEL_RATE * distance_m).exp()).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_near_certain_at_zero_distance() {
        let rate = completion_rate(0.0);
        assert!(rate > 0.97 && rate < 1.0, "rate={rate}");
    }

    #[test]
    fn matches_published_mean_cancellation_curve() {
        for (i, mean) in MEAN_CANCEL_RATES.iter().enumerate() {
            let distance = 200.0 * (i + 1) as f64;
            let cancel = 1.0 - completion_rate(distance);
            assert!(
                (cancel - mean).abs() < 0.01,
                "distance={distance}: cancel={cancel}, expected ~{mean}"
            );
        }
    }

    #[test]
    fn monotone_non_increasing() {
        let mut prev = completion_rate(0.0);
        for i in 1..200 {
            let rate = completion_rate(i as f64 * 100.0);
            assert!(rate <= prev, "rate increased at {} m", i * 100);
            prev = rate;
        }
    }

    #[test]
    fn bounded_and_vanishing_at_large_distance() {
        for d in [0.0, 1e3, 1e4, 1e5, 1e9] {
            let rate = completion_rate(d);
            assert!((0.0..=1.0).contains(&rate), "rate out of range at {d}");
        }
        assert_eq!(completion_rate(1e5), 0.0);
    }
}

//! CSV export of replay metrics.

use std::io::Write;

use crate::error::ReplayResult;
use crate::runner::TickMetrics;

/// Write per-tick metrics as CSV with a header row.
pub fn export_metrics_csv<W: Write>(metrics: &[TickMetrics], writer: W) -> ReplayResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    wtr.write_record([
        "tick",
        "orders",
        "candidates",
        "matches",
        "match_rate",
        "reward_captured",
        "mean_pickup_distance_m",
        "repositioned",
    ])?;

    for m in metrics {
        wtr.write_record([
            m.tick.to_string(),
            m.orders.to_string(),
            m.candidates.to_string(),
            m.matches.to_string(),
            format!("{:.4}", m.match_rate),
            format!("{:.4}", m.reward_captured),
            format!("{:.1}", m.mean_pickup_distance_m),
            m.repositioned.to_string(),
        ])?;
    }

    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

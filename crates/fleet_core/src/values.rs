//! State-value tables: expected long-run discounted reward per grid cell.
//!
//! Two keyings share one read/write API, chosen at construction:
//!
//! - **Scalar**: one value per cell; timestamps are ignored.
//! - **Hour-of-week**: one value per (cell, hour bucket) with 168 buckets
//!   (`24 * weekday + hour`, Monday = 0). Reads and writes linearly blend the
//!   two buckets adjacent to the timestamp, so values vary smoothly within
//!   the hour.
//!
//! Missing keys read as 0. Non-finite writes are rejected so the table only
//! ever holds finite reals.

use std::collections::HashMap;
use std::path::Path;

use log::debug;

use crate::error::{CoreError, CoreResult};
use crate::spatial::CellId;

/// Number of hour-of-week buckets.
pub const HOUR_BUCKETS: u16 = 168;

const SECS_PER_HOUR: i64 = 3_600;
const SECS_PER_DAY: i64 = 86_400;

/// Value-table keying, chosen at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueKind {
    /// One value per cell.
    #[default]
    Scalar,
    /// One value per (cell, hour-of-week bucket), interpolated.
    HourOfWeek,
}

/// Time basis used for hour bucketing. The upstream data does not say
/// whether timestamps are local or UTC, so the offset is configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HourBasis {
    #[default]
    Utc,
    /// Fixed offset in seconds added to timestamps before bucketing.
    FixedOffset(i64),
}

impl HourBasis {
    fn shift(&self, timestamp: f64) -> f64 {
        match self {
            HourBasis::Utc => timestamp,
            HourBasis::FixedOffset(secs) => timestamp + *secs as f64,
        }
    }
}

enum Store {
    Scalar(HashMap<CellId, f64>),
    Hourly(HashMap<CellId, Box<[f64; HOUR_BUCKETS as usize]>>),
}

/// Keyed store of scalar state values.
pub struct ValueTable {
    store: Store,
    basis: HourBasis,
}

impl ValueTable {
    pub fn new(kind: ValueKind, basis: HourBasis) -> Self {
        let store = match kind {
            ValueKind::Scalar => Store::Scalar(HashMap::new()),
            ValueKind::HourOfWeek => Store::Hourly(HashMap::new()),
        };
        Self { store, basis }
    }

    pub fn scalar() -> Self {
        Self::new(ValueKind::Scalar, HourBasis::Utc)
    }

    pub fn hour_of_week(basis: HourBasis) -> Self {
        Self::new(ValueKind::HourOfWeek, basis)
    }

    /// State value for `cell` at `timestamp` (unix seconds, real-valued).
    /// Missing keys read as 0.
    pub fn get(&self, cell: &CellId, timestamp: f64) -> f64 {
        match &self.store {
            Store::Scalar(map) => map.get(cell).copied().unwrap_or(0.0),
            Store::Hourly(map) => match map.get(cell) {
                Some(buckets) => {
                    let (b0, b1, u) = blend(self.basis.shift(timestamp));
                    (1.0 - u) * buckets[b0 as usize] + u * buckets[b1 as usize]
                }
                None => 0.0,
            },
        }
    }

    /// Add `delta` to the value of `cell` at `timestamp`. For the
    /// hour-of-week keying the delta is split across the two adjacent
    /// buckets with the interpolation weights. Non-finite deltas or
    /// timestamps are dropped.
    pub fn add(&mut self, cell: &CellId, timestamp: f64, delta: f64) {
        if !delta.is_finite() || !timestamp.is_finite() {
            debug!("dropping non-finite value update for cell {cell}: delta={delta}, ts={timestamp}");
            return;
        }
        match &mut self.store {
            Store::Scalar(map) => {
                *map.entry(cell.clone()).or_insert(0.0) += delta;
            }
            Store::Hourly(map) => {
                let (b0, b1, u) = blend(self.basis.shift(timestamp));
                let buckets = map
                    .entry(cell.clone())
                    .or_insert_with(|| Box::new([0.0; HOUR_BUCKETS as usize]));
                buckets[b0 as usize] += (1.0 - u) * delta;
                buckets[b1 as usize] += u * delta;
            }
        }
    }

    /// Number of cells with at least one stored value.
    pub fn len(&self) -> usize {
        match &self.store {
            Store::Scalar(map) => map.len(),
            Store::Hourly(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when every stored value is finite. Writes enforce this already;
    /// kept as a tick-level invariant check for tests and the harness.
    pub fn all_finite(&self) -> bool {
        match &self.store {
            Store::Scalar(map) => map.values().all(|v| v.is_finite()),
            Store::Hourly(map) => map.values().all(|b| b.iter().all(|v| v.is_finite())),
        }
    }

    /// Multiply every stored value by `factor`. Used to split a seed across
    /// the two halves of a double-Q table pair.
    pub fn scale(&mut self, factor: f64) {
        match &mut self.store {
            Store::Scalar(map) => {
                for v in map.values_mut() {
                    *v *= factor;
                }
            }
            Store::Hourly(map) => {
                for buckets in map.values_mut() {
                    for v in buckets.iter_mut() {
                        *v *= factor;
                    }
                }
            }
        }
    }

    /// Load initial values from a seed CSV: `grid_id, value` rows for the
    /// scalar keying, `grid_id, bucket, value` for hour-of-week. Returns the
    /// number of rows applied. A missing or malformed file is fatal.
    pub fn seed_from_csv(&mut self, path: &Path) -> CoreResult<usize> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .map_err(|source| CoreError::Csv {
                path: path.to_path_buf(),
                source,
            })?;

        let mut applied = 0;
        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(|source| CoreError::Csv {
                path: path.to_path_buf(),
                source,
            })?;
            let bad_row = |reason: String| CoreError::Row {
                path: path.to_path_buf(),
                line: row as u64 + 1,
                reason,
            };
            match &mut self.store {
                Store::Scalar(map) => {
                    if record.len() != 2 {
                        return Err(bad_row(format!("expected 2 columns, got {}", record.len())));
                    }
                    let value: f64 = record[1]
                        .trim()
                        .parse()
                        .map_err(|_| bad_row(format!("bad value {:?}", &record[1])))?;
                    map.insert(CellId::from(&record[0]), value);
                }
                Store::Hourly(map) => {
                    if record.len() != 3 {
                        return Err(bad_row(format!("expected 3 columns, got {}", record.len())));
                    }
                    let bucket: u16 = record[1]
                        .trim()
                        .parse()
                        .map_err(|_| bad_row(format!("bad bucket {:?}", &record[1])))?;
                    if bucket >= HOUR_BUCKETS {
                        return Err(bad_row(format!("bucket {bucket} out of range")));
                    }
                    let value: f64 = record[2]
                        .trim()
                        .parse()
                        .map_err(|_| bad_row(format!("bad value {:?}", &record[2])))?;
                    map.entry(CellId::from(&record[0]))
                        .or_insert_with(|| Box::new([0.0; HOUR_BUCKETS as usize]))
                        [bucket as usize] = value;
                }
            }
            applied += 1;
        }
        Ok(applied)
    }
}

/// Hour-of-week bucket pair and interpolation weight for a timestamp:
/// `(bucket(t), bucket(t + 3600), (t mod 3600) / 3600)`.
fn blend(timestamp: f64) -> (u16, u16, f64) {
    let secs = timestamp.floor() as i64;
    let days = secs.div_euclid(SECS_PER_DAY);
    // Unix epoch day 0 was a Thursday; +3 makes Monday = 0.
    let weekday = (days + 3).rem_euclid(7);
    let hour = secs.rem_euclid(SECS_PER_DAY) / SECS_PER_HOUR;
    let b0 = (24 * weekday + hour) as u16;
    let b1 = (b0 + 1) % HOUR_BUCKETS;
    let u = timestamp.rem_euclid(SECS_PER_HOUR as f64) / SECS_PER_HOUR as f64;
    (b0, b1, u)
}

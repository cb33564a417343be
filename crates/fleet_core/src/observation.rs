//! Wire model and per-tick parsing.
//!
//! The host simulator hands over one record per dispatch candidate and a
//! compact driver list for repositioning. This module owns the typed serde
//! model of those payloads and the normalisation into per-tick containers:
//! drivers keyed by id, requests keyed by order id, and candidates grouped
//! by request, with coordinates resolved to grid cells.
//!
//! Parsing is idempotent: the same records always produce the same
//! containers, including ordering.

use std::collections::{HashMap, HashSet};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::spatial::{CellId, Grid};

/// One dispatch-candidate record from the host: a (driver, order) pair with
/// pickup distance and ETA plus the full order description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub order_id: String,
    pub driver_id: String,
    /// Order-driver distance in metres.
    pub order_driver_distance: f64,
    /// `[lng, lat]` of the pickup point.
    pub order_start_location: [f64; 2],
    /// `[lng, lat]` of the dropoff point.
    pub order_finish_location: [f64; 2],
    /// `[lng, lat]` of the driver.
    pub driver_location: [f64; 2],
    /// Request creation time, unix seconds.
    pub timestamp: i64,
    /// Estimated ride completion time, unix seconds.
    pub order_finish_timestamp: i64,
    pub day_of_week: u8,
    pub reward_units: f64,
    /// Pickup ETA in seconds.
    pub pick_up_eta: f64,
}

/// One idle driver in a reposition payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverInfo {
    pub driver_id: String,
    pub grid_id: String,
}

/// Reposition payload: the idle drivers to move at this tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositionObservation {
    pub timestamp: i64,
    pub day_of_week: u8,
    pub driver_info: Vec<DriverInfo>,
}

/// A driver with its position resolved to a grid cell. Immutable within a
/// tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Driver {
    pub driver_id: String,
    pub cell: CellId,
}

/// A ride request with both endpoints resolved to grid cells. Immutable
/// within a tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub order_id: String,
    pub start_cell: CellId,
    pub end_cell: CellId,
    pub request_ts: i64,
    pub finish_ts: i64,
    pub day_of_week: u8,
    pub reward: f64,
}

/// A (driver, order) pairing under consideration.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchCandidate {
    pub order_id: String,
    pub driver_id: String,
    pub distance_m: f64,
    pub eta_s: f64,
}

/// One tick's dispatch input, normalised.
///
/// `candidates` keeps input order (the matching tie-break); `by_order`
/// buckets candidate indices per request; `driver_order` / `request_order`
/// record first-appearance order so iteration is deterministic.
#[derive(Debug, Default, PartialEq)]
pub struct ParsedDispatch {
    pub drivers: HashMap<String, Driver>,
    pub requests: HashMap<String, Request>,
    pub candidates: Vec<DispatchCandidate>,
    pub by_order: HashMap<String, Vec<usize>>,
    pub driver_order: Vec<String>,
    pub request_order: Vec<String>,
}

impl ParsedDispatch {
    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty() && self.requests.is_empty() && self.candidates.is_empty()
    }

    /// Candidates for one order, in input order.
    pub fn candidates_for<'a>(
        &'a self,
        order_id: &str,
    ) -> impl Iterator<Item = &'a DispatchCandidate> {
        self.by_order
            .get(order_id)
            .into_iter()
            .flatten()
            .map(|&idx| &self.candidates[idx])
    }
}

/// Normalise one tick's records into per-tick containers.
///
/// Every record contributes one driver, one request, and one candidate.
/// Duplicate driver/request entries are tolerated (payloads are consistent;
/// the last entry wins); duplicate (order, driver) pairs collapse to the
/// first occurrence. Records with unresolvable coordinates or negative
/// distance/ETA are skipped with a debug log rather than failing the tick.
pub fn parse_dispatch(grid: &Grid, records: &[DispatchRecord]) -> ParsedDispatch {
    let mut parsed = ParsedDispatch::default();
    let mut seen_pairs: HashSet<(String, String)> = HashSet::new();

    for record in records {
        if !(record.order_driver_distance >= 0.0) || !(record.pick_up_eta >= 0.0) {
            debug!(
                "skipping candidate {}/{}: bad distance {} or eta {}",
                record.order_id,
                record.driver_id,
                record.order_driver_distance,
                record.pick_up_eta
            );
            continue;
        }
        let resolved = (
            grid.lookup(record.driver_location[0], record.driver_location[1]),
            grid.lookup(record.order_start_location[0], record.order_start_location[1]),
            grid.lookup(record.order_finish_location[0], record.order_finish_location[1]),
        );
        let (Some(driver_cell), Some(start_cell), Some(end_cell)) = resolved else {
            debug!(
                "skipping candidate {}/{}: coordinates outside the grid",
                record.order_id, record.driver_id
            );
            continue;
        };

        if !parsed.drivers.contains_key(&record.driver_id) {
            parsed.driver_order.push(record.driver_id.clone());
        }
        parsed.drivers.insert(
            record.driver_id.clone(),
            Driver {
                driver_id: record.driver_id.clone(),
                cell: driver_cell.clone(),
            },
        );

        if !parsed.requests.contains_key(&record.order_id) {
            parsed.request_order.push(record.order_id.clone());
        }
        parsed.requests.insert(
            record.order_id.clone(),
            Request {
                order_id: record.order_id.clone(),
                start_cell: start_cell.clone(),
                end_cell: end_cell.clone(),
                request_ts: record.timestamp,
                finish_ts: record.order_finish_timestamp,
                day_of_week: record.day_of_week,
                reward: record.reward_units,
            },
        );

        if seen_pairs.insert((record.order_id.clone(), record.driver_id.clone())) {
            let idx = parsed.candidates.len();
            parsed.candidates.push(DispatchCandidate {
                order_id: record.order_id.clone(),
                driver_id: record.driver_id.clone(),
                distance_m: record.order_driver_distance,
                eta_s: record.pick_up_eta,
            });
            parsed
                .by_order
                .entry(record.order_id.clone())
                .or_default()
                .push(idx);
        }
    }

    parsed
}

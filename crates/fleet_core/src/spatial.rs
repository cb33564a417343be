//! Spatial operations: hex-cell centroid registry and distance calculations.
//!
//! This module provides:
//!
//! - **CellId**: opaque identifier for one hexagonal cell of the service area
//! - **Grid**: centroid registry with nearest-cell lookup (R-tree index)
//! - **Distance calculations**: haversine between centroids, with an
//!   equirectangular approximation for hot paths
//! - **Idle transitions**: the empirical Markov chain describing where an
//!   unassigned driver drifts over one step, keyed by hour of day
//!
//! The grid is loaded once from CSV and immutable afterwards; it is shared by
//! reference across the dispatcher and repositioner.

use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Mutex;

use log::warn;
use lru::LruCache;
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Number of cells in the production service area grid.
pub const SERVICE_AREA_CELLS: usize = 8518;

/// Hours of day covered by the production idle-transition table.
pub const TRANSITION_HOURS: usize = 24;

/// Distance reported for cell ids that do not resolve to a centroid. Far
/// beyond any real pair, so unknown cells never win a distance comparison.
pub const UNKNOWN_CELL_DISTANCE_M: f64 = 1e12;

/// Mean Earth radius in metres.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Longitude compression factor for the equirectangular approximation.
/// Valid near latitude 30.6°, the centre of the service area.
const LNG_FACTOR: f64 = 0.685;

/// Metres per degree of latitude.
const METRES_PER_DEGREE: f64 = 111_320.0;

/// Pairwise-distance LRU cache size (~160 KB).
const DISTANCE_CACHE_SIZE: usize = 10_000;

/// Accepted drift of a stored transition distribution's sum from 1.0.
/// Distributions inside this tolerance are renormalised so the returned
/// probabilities sum to 1 within 1e-9.
const DISTRIBUTION_TOLERANCE: f64 = 1e-6;

/// Opaque identifier for a hexagonal grid cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId(String);

impl CellId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CellId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for CellId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One grid cell: id plus centroid in (lng, lat) degrees.
#[derive(Debug, Clone)]
pub struct Cell {
    pub id: CellId,
    pub lng: f64,
    pub lat: f64,
}

/// Entry stored in the R-tree spatial index: a 2-D `[lng, lat]` point with
/// the slot of the associated cell.
#[derive(Clone)]
struct CellEntry {
    point: [f64; 2],
    slot: usize,
}

impl RTreeObject for CellEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for CellEntry {
    /// Squared Euclidean distance in (lng, lat) space, matching the
    /// nearest-centroid contract of [`Grid::lookup`].
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dlng = self.point[0] - point[0];
        let dlat = self.point[1] - point[1];
        dlng * dlng + dlat * dlat
    }
}

/// Destination distribution for one (hour, start cell) idle step.
///
/// Iterates `(destination, probability)` pairs. When the transition table has
/// no entry for the start cell, yields the degenerate `{start: 1.0}`.
pub struct IdleTransitions<'a> {
    inner: TransitionsInner<'a>,
}

enum TransitionsInner<'a> {
    Observed(std::slice::Iter<'a, (CellId, f64)>),
    Degenerate(Option<&'a CellId>),
}

impl<'a> Iterator for IdleTransitions<'a> {
    type Item = (&'a CellId, f64);

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            TransitionsInner::Observed(iter) => iter.next().map(|(cell, p)| (cell, *p)),
            TransitionsInner::Degenerate(cell) => cell.take().map(|cell| (cell, 1.0)),
        }
    }
}

/// Hex-cell centroid registry with nearest-cell lookup, inter-cell distances,
/// and the idle-transition probability table.
pub struct Grid {
    cells: Vec<Cell>,
    slots: HashMap<CellId, usize>,
    index: RTree<CellEntry>,
    transitions: HashMap<u8, HashMap<CellId, Vec<(CellId, f64)>>>,
    distance_cache: Mutex<LruCache<(usize, usize), f64>>,
}

impl Grid {
    /// Build a grid from in-memory parts. Transition rows are
    /// `(hour, start, destination, probability)`; each (hour, start)
    /// distribution must sum to 1 within tolerance and is renormalised.
    pub fn from_parts(
        cells: Vec<(CellId, f64, f64)>,
        transition_rows: Vec<(u8, CellId, CellId, f64)>,
    ) -> CoreResult<Self> {
        let mut grid_cells = Vec::with_capacity(cells.len());
        let mut slots = HashMap::with_capacity(cells.len());
        let mut entries = Vec::with_capacity(cells.len());
        for (id, lng, lat) in cells {
            let slot = grid_cells.len();
            slots.insert(id.clone(), slot);
            entries.push(CellEntry {
                point: [lng, lat],
                slot,
            });
            grid_cells.push(Cell { id, lng, lat });
        }

        let mut transitions: HashMap<u8, HashMap<CellId, Vec<(CellId, f64)>>> = HashMap::new();
        for (hour, start, end, probability) in transition_rows {
            transitions
                .entry(hour)
                .or_default()
                .entry(start)
                .or_default()
                .push((end, probability));
        }
        for (hour, starts) in &mut transitions {
            for (start, distribution) in starts.iter_mut() {
                let sum: f64 = distribution.iter().map(|(_, p)| p).sum();
                if (sum - 1.0).abs() > DISTRIBUTION_TOLERANCE {
                    return Err(CoreError::Distribution {
                        hour: *hour,
                        cell: start.to_string(),
                        sum,
                    });
                }
                for (_, p) in distribution.iter_mut() {
                    *p /= sum;
                }
            }
        }

        Ok(Self {
            cells: grid_cells,
            slots,
            index: RTree::bulk_load(entries),
            transitions,
            distance_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(DISTANCE_CACHE_SIZE).expect("cache size must be non-zero"),
            )),
        })
    }

    /// Load a grid from the hexagon table and idle-transition CSVs.
    ///
    /// Hexagon rows are `grid_id, v1x, v1y, ... v6x, v6y` (13 columns); the
    /// centroid is the mean of the six vertices. Rows with a different column
    /// count are skipped. Transition rows are
    /// `hour, start_grid_id, end_grid_id, probability`.
    pub fn from_csv(grid_path: &Path, transitions_path: &Path) -> CoreResult<Self> {
        let mut cells = Vec::new();
        let mut reader = csv_reader(grid_path)?;
        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(|source| CoreError::Csv {
                path: grid_path.to_path_buf(),
                source,
            })?;
            if record.len() != 13 {
                warn!("skipping grid row {} with {} columns", row + 1, record.len());
                continue;
            }
            let mut lng_sum = 0.0;
            let mut lat_sum = 0.0;
            for vertex in 0..6 {
                lng_sum += parse_field(&record, 1 + 2 * vertex, grid_path, row)?;
                lat_sum += parse_field(&record, 2 + 2 * vertex, grid_path, row)?;
            }
            cells.push((CellId::from(&record[0]), lng_sum / 6.0, lat_sum / 6.0));
        }

        let mut transition_rows = Vec::new();
        let mut reader = csv_reader(transitions_path)?;
        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(|source| CoreError::Csv {
                path: transitions_path.to_path_buf(),
                source,
            })?;
            if record.len() != 4 {
                return Err(CoreError::Row {
                    path: transitions_path.to_path_buf(),
                    line: row as u64 + 1,
                    reason: format!("expected 4 columns, got {}", record.len()),
                });
            }
            let hour: u8 = record[0].parse().map_err(|_| CoreError::Row {
                path: transitions_path.to_path_buf(),
                line: row as u64 + 1,
                reason: format!("bad hour {:?}", &record[0]),
            })?;
            let probability = parse_field(&record, 3, transitions_path, row)?;
            transition_rows.push((
                hour,
                CellId::from(&record[1]),
                CellId::from(&record[2]),
                probability,
            ));
        }

        Self::from_parts(cells, transition_rows)
    }

    /// Production loader: resolves the standard file names under `dir` and
    /// enforces the service-area invariants (8 518 cells, 24 hours of
    /// transitions). Violations are fatal.
    pub fn load_service_area(dir: &Path) -> CoreResult<Self> {
        let grid = Self::from_csv(
            &dir.join("hexagon_grid_table.csv"),
            &dir.join("idle_transition_probability.csv"),
        )?;
        if grid.len() != SERVICE_AREA_CELLS {
            return Err(CoreError::ServiceArea(format!(
                "expected {} cells, loaded {}",
                SERVICE_AREA_CELLS,
                grid.len()
            )));
        }
        if grid.transitions.len() != TRANSITION_HOURS {
            return Err(CoreError::ServiceArea(format!(
                "expected {} transition hours, loaded {}",
                TRANSITION_HOURS,
                grid.transitions.len()
            )));
        }
        Ok(grid)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn contains(&self, cell: &CellId) -> bool {
        self.slots.contains_key(cell)
    }

    /// Cells in load order. The order is stable across runs and is used as
    /// the deterministic tie-break wherever cells are ranked.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    pub fn centroid(&self, cell: &CellId) -> Option<(f64, f64)> {
        self.slots
            .get(cell)
            .map(|&slot| (self.cells[slot].lng, self.cells[slot].lat))
    }

    /// Return the cell whose centroid is nearest to `(lng, lat)` in
    /// Euclidean (lng, lat) space. `None` only for an empty grid.
    pub fn lookup(&self, lng: f64, lat: f64) -> Option<&CellId> {
        self.index
            .nearest_neighbor(&[lng, lat])
            .map(|entry| &self.cells[entry.slot].id)
    }

    /// Haversine distance in metres between two cell centroids, with LRU
    /// caching. Unknown cells yield [`UNKNOWN_CELL_DISTANCE_M`].
    pub fn distance(&self, a: &CellId, b: &CellId) -> f64 {
        let (Some(&sa), Some(&sb)) = (self.slots.get(a), self.slots.get(b)) else {
            return UNKNOWN_CELL_DISTANCE_M;
        };
        // Symmetric key (smaller slot first) to maximise cache hits.
        let key = if sa <= sb { (sa, sb) } else { (sb, sa) };
        let mut cache = self.distance_cache.lock().unwrap();
        *cache.get_or_insert(key, || {
            haversine_m(
                (self.cells[key.0].lng, self.cells[key.0].lat),
                (self.cells[key.1].lng, self.cells[key.1].lat),
            )
        })
    }

    /// Equirectangular distance approximation in metres. Within 2% of
    /// haversine inside the service area; used on hot paths where thousands
    /// of pairs are evaluated per tick.
    pub fn distance_fast(&self, a: &CellId, b: &CellId) -> f64 {
        let (Some(&sa), Some(&sb)) = (self.slots.get(a), self.slots.get(b)) else {
            return UNKNOWN_CELL_DISTANCE_M;
        };
        let dlat = (self.cells[sa].lat - self.cells[sb].lat).abs();
        let dlng = LNG_FACTOR * (self.cells[sa].lng - self.cells[sb].lng).abs();
        METRES_PER_DEGREE * (dlat * dlat + dlng * dlng).sqrt()
    }

    /// Destination distribution for an idle driver at `cell` at the UTC hour
    /// of `timestamp`. Falls back to the degenerate `{cell: 1.0}` when the
    /// table has no entry.
    pub fn idle_transitions<'a>(&'a self, timestamp: i64, cell: &'a CellId) -> IdleTransitions<'a> {
        let hour = utc_hour(timestamp);
        let observed = self
            .transitions
            .get(&hour)
            .and_then(|starts| starts.get(cell));
        let inner = match observed {
            Some(distribution) => TransitionsInner::Observed(distribution.iter()),
            None => TransitionsInner::Degenerate(Some(cell)),
        };
        IdleTransitions { inner }
    }

    /// Hours of day present in the transition table.
    pub fn transition_hours(&self) -> usize {
        self.transitions.len()
    }
}

/// UTC hour of day for a unix timestamp in seconds.
pub fn utc_hour(timestamp: i64) -> u8 {
    (timestamp.rem_euclid(86_400) / 3_600) as u8
}

fn csv_reader(path: &Path) -> CoreResult<csv::Reader<std::fs::File>> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|source| CoreError::Csv {
            path: path.to_path_buf(),
            source,
        })
}

fn parse_field(
    record: &csv::StringRecord,
    field: usize,
    path: &Path,
    row: usize,
) -> CoreResult<f64> {
    record[field].trim().parse().map_err(|_| CoreError::Row {
        path: path.to_path_buf(),
        line: row as u64 + 1,
        reason: format!("bad float {:?} in column {field}", &record[field]),
    })
}

fn haversine_m(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lng1, lat1) = (a.0.to_radians(), a.1.to_radians());
    let (lng2, lat2) = (b.0.to_radians(), b.1.to_radians());
    let dlat = lat2 - lat1;
    let dlng = lng2 - lng1;
    let sin_dlat = (dlat * 0.5).sin();
    let sin_dlng = (dlng * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlng * sin_dlng;
    2.0 * EARTH_RADIUS_M * h.sqrt().atan2((1.0 - h).sqrt())
}

//! Shared fixtures for integration tests.
#![allow(dead_code)] // not every test binary uses every fixture

use std::sync::Arc;

use fleet_core::observation::DispatchRecord;
use fleet_core::spatial::{CellId, Grid};

/// Centroids used by the fixture grid, west to east.
pub const CELLS: [(&str, f64, f64); 5] = [
    ("west", 104.00, 30.60),
    ("mid_west", 104.02, 30.60),
    ("centre", 104.04, 30.60),
    ("mid_east", 104.06, 30.60),
    ("east", 104.08, 30.60),
];

/// Five cells in a row, with an hour-8 idle drift from `west` eastwards.
pub fn row_grid() -> Arc<Grid> {
    let cells = CELLS
        .iter()
        .map(|(id, lng, lat)| (CellId::from(*id), *lng, *lat))
        .collect();
    let transitions = vec![
        (8, CellId::from("west"), CellId::from("west"), 0.6),
        (8, CellId::from("west"), CellId::from("mid_west"), 0.4),
    ];
    Arc::new(Grid::from_parts(cells, transitions).expect("fixture grid"))
}

pub fn centroid(id: &str) -> [f64; 2] {
    let (_, lng, lat) = CELLS
        .iter()
        .find(|(cell, _, _)| *cell == id)
        .expect("fixture cell");
    [*lng, *lat]
}

/// A candidate record with workable defaults: driver at `west`, ride from
/// `west` to `centre`, reward 2, zero pickup distance. Tests mutate fields
/// directly for their scenario.
pub fn record(order: &str, driver: &str) -> DispatchRecord {
    DispatchRecord {
        order_id: order.into(),
        driver_id: driver.into(),
        order_driver_distance: 0.0,
        order_start_location: centroid("west"),
        order_finish_location: centroid("centre"),
        driver_location: centroid("west"),
        timestamp: 1_000,
        order_finish_timestamp: 1_600,
        day_of_week: 0,
        reward_units: 2.0,
        pick_up_eta: 0.0,
    }
}

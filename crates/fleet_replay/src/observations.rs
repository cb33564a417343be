//! Recorded observation logs.
//!
//! A log is JSON lines, one tick per line: the dispatch payload the host
//! handed over, plus the reposition payload when one followed in the same
//! tick. Blank lines are skipped; anything else malformed is fatal with the
//! offending line number.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use fleet_core::observation::{DispatchRecord, RepositionObservation};
use serde::{Deserialize, Serialize};

use crate::error::{ReplayError, ReplayResult};

/// One recorded tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickRecord {
    #[serde(default)]
    pub dispatch: Vec<DispatchRecord>,
    #[serde(default)]
    pub reposition: Option<RepositionObservation>,
}

/// Load a JSON-lines observation log.
pub fn load_jsonl(path: &Path) -> ReplayResult<Vec<TickRecord>> {
    let file = File::open(path).map_err(|source| ReplayError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);

    let mut ticks = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| ReplayError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let tick = serde_json::from_str(&line).map_err(|source| ReplayError::Json {
            path: path.to_path_buf(),
            line: idx + 1,
            source,
        })?;
        ticks.push(tick);
    }
    Ok(ticks)
}

//! Core error type for construction-time failures.
//!
//! Per-candidate numeric degeneracy during a tick is deliberately *not* an
//! error: degenerate scores are skipped and logged at debug level so a single
//! bad record cannot fail the tick. Everything here is fatal to the caller.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while loading static data or building an agent.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("I/O error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("malformed row {line} in {}: {reason}", path.display())]
    Row {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    #[error("service area invariant violated: {0}")]
    ServiceArea(String),

    #[error("idle transition distribution for hour {hour}, cell {cell} sums to {sum}")]
    Distribution { hour: u8, cell: String, sum: f64 },

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

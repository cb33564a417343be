//! Replay-harness error type.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while loading observation logs or replaying them.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("I/O error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("bad JSON at {}:{line}: {source}", path.display())]
    Json {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("dispatch output at tick {tick} is not a matching")]
    InvalidMatching { tick: usize },

    #[error("CSV export error: {0}")]
    Csv(#[from] csv::Error),
}

pub type ReplayResult<T> = Result<T, ReplayError>;

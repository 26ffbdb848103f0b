//! Sequence-level errors
//!
//! Per-frame decode failures never show up here: workers absorb them into the
//! record's state. The capacity query reports its own decode failure as `CapacityQuery`.

use std::path::PathBuf;

use crate::entities::FrameError;

#[derive(Debug, thiserror::Error)]
pub enum SequenceError {
    /// Fewer than two qualifying files; the previously loaded sequence is untouched
    #[error("Not enough frames in {}: found {found}, need at least 2", .path.display())]
    NotEnoughFrames { path: PathBuf, found: usize },

    /// Representative frame for the memory estimate could not be decoded
    #[error("Capacity query failed: {reason}")]
    CapacityQuery {
        reason: String,
        #[source]
        source: Option<FrameError>,
    },

    #[error("Configuration is fixed once a sequence has been loaded")]
    ConfigLocked,

    #[error("No sequence loaded")]
    NotLoaded,

    #[error("Invalid frame rate: {0}")]
    InvalidFrameRate(f32),

    #[error("Invalid pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start worker threads: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}

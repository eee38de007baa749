//! Error types for the world-state engine.

use thiserror::Error;

use crate::partition::PartitionId;

/// Result type alias using [`GridError`].
pub type Result<T> = std::result::Result<T, GridError>;

/// Top-level error type for all grid, partition and search failures.
///
/// A search that finds nothing is not an error: searches return `Ok(None)`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GridError {
    /// Coordinate outside the grid. Never silently clamped.
    #[error("Position ({x}, {y}) is outside the {width}x{height} grid")]
    OutOfBounds {
        /// Requested x coordinate.
        x: i32,
        /// Requested y coordinate.
        y: i32,
        /// Grid width.
        width: u16,
        /// Grid height.
        height: u16,
    },

    /// Requested mutation does not apply to the current tile state.
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Partition id was retired by a merge or split; re-query ownership.
    #[error("Partition {0:?} no longer exists")]
    StalePartition(PartitionId),

    /// Snapshot encoding or decoding failed.
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Configuration could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    Config(String),
}

impl GridError {
    /// Shorthand for [`GridError::InvalidTransition`].
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidTransition(message.into())
    }
}

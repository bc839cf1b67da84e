//! Error types for m-tree.

use thiserror::Error;

/// Top-level error type for M-tree operations.
#[derive(Debug, Error)]
pub enum MTreeError {
    /// Node capacity below the minimum of two entries.
    #[error("invalid node capacity {capacity}: an M-tree node must hold at least 2 entries")]
    InvalidCapacity { capacity: usize },

    /// Range radius that is negative or NaN.
    #[error("invalid query radius {radius}: must be a non-negative number")]
    InvalidRadius { radius: f64 },

    /// Structural check failed. Indicates a bug in the tree, not a caller error.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Serde serialization/deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Result type for M-tree operations.
pub type Result<T> = std::result::Result<T, MTreeError>;

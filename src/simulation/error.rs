//! Error types for the simulation core.
//!
//! Rejections and routing failures are ordinary values the caller inspects.
//! None of them are raised for an empty world or an empty queue.

use thiserror::Error;

use super::planner::GridPos;

/// Why a spawn request did not produce a vehicle.
///
/// Rejections are silent in the tick loop; the world counts them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SpawnRejected {
    #[error("vehicle capacity exceeded")]
    CapacityExceeded,

    #[error("spawn point occupied")]
    SpawnBlocked,
}

/// Failure of an A* query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlanError {
    /// Start or goal lies outside the grid or on a blocked cell.
    #[error("grid coordinate {0} is outside the grid or blocked")]
    InvalidGridCoordinate(GridPos),

    /// Both endpoints are valid but no open route connects them.
    #[error("no path found")]
    NoPathFound,
}

/// Failure to place an emergency vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("emergency spawn rejected: {0}")]
    Rejected(#[from] SpawnRejected),

    #[error("emergency routing failed: {0}")]
    Routing(#[from] PlanError),

    #[error("origin {0} is the intersection itself")]
    OriginAtIntersection(GridPos),
}

/// Invalid run configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be positive and finite, got {value}")]
    NonPositive { field: &'static str, value: f32 },

    #[error("{field} of {value}s is below the {minimum}s safety minimum")]
    BelowSafetyMinimum {
        field: &'static str,
        value: f32,
        minimum: f32,
    },

    #[error("{field} must be non-negative, got {value}")]
    Negative { field: &'static str, value: f32 },

    #[error("routing district must be at least 3x3 cells, got {0}")]
    DistrictTooSmall(i32),

    #[error("routing district of {size}x{size} cells exceeds the {maximum}x{maximum} limit")]
    DistrictTooLarge { size: i32, maximum: i32 },

    #[error("vehicle capacity must be at least 1")]
    ZeroCapacity,
}

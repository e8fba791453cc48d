//! Error types
//!
//! Configuration problems fail fast at construction. Query misuse (empty group
//! list, zero-range ray) is not an error and yields empty results instead.

use crate::entity::EntityId;
use crate::physics::{BodyId, ClientId};

/// Result alias used across the crate
pub type PhysicsResult<T> = Result<T, PhysicsError>;

#[derive(Debug, thiserror::Error)]
pub enum PhysicsError {
    #[error("invalid world bounds [{min_x}, {min_y}] - [{max_x}, {max_y}]: must be finite with positive width and height")]
    InvalidBounds {
        min_x: f32,
        min_y: f32,
        max_x: f32,
        max_y: f32,
    },

    #[error("cell limit must be at least 1")]
    InvalidCellLimit,

    #[error("cell dimension {width}x{height} must be finite and positive")]
    InvalidCellDimension { width: f32, height: f32 },

    #[error("relaxation count must be at least 1")]
    InvalidRelaxationCount,

    #[error("gravity must be finite, got {0}")]
    InvalidGravity(f32),

    #[error("invalid body: {0}")]
    InvalidBody(&'static str),

    #[error("invalid joint: {0}")]
    InvalidJoint(&'static str),

    #[error("timestep must be finite and non-negative, got {0}")]
    InvalidTimestep(f32),

    #[error("{0} is not registered with this world")]
    UnknownBody(BodyId),

    #[error("{body} is owned by {actual}, not {claimed}")]
    OwnerMismatch {
        body: BodyId,
        claimed: EntityId,
        actual: EntityId,
    },

    /// A body in the active list has no index controller attached
    #[error("{0} has no spatial-index controller")]
    MissingController(BodyId),

    #[error("{0} does not refer to a live index client")]
    StaleClient(ClientId),

    #[error("failed to parse world parameters: {0}")]
    Config(#[from] serde_json::Error),
}

//! Quadrelax - 2D body stepping with a quad-tree broad phase
//!
//! Core modules:
//! - `physics`: Bodies, joints, rays, collision tests, the spatial index and the world step
//! - `config`: Construction-time world parameters (serde, validated)
//! - `entity`: Minimal entity registry standing in for the host framework
//! - `error`: Error taxonomy shared by every fallible operation

pub mod config;
pub mod entity;
pub mod error;
pub mod physics;

pub use config::{CellDimension, WorldParams};
pub use entity::{Entities, Entity, EntityId, GroupLookup};
pub use error::{PhysicsError, PhysicsResult};
pub use physics::{Body, BodyId, Joint, JointId, Ray, RayHit, RaycastQuery, World};

use glam::Vec2;

/// Simulation configuration constants
pub mod consts {
    /// Fixed simulation timestep used by the demo (120 Hz)
    pub const SIM_DT: f32 = 1.0 / 120.0;

    /// Relaxation passes per step when none is configured
    pub const DEFAULT_RELAXATION_COUNT: u32 = 3;
    /// Gravity when none is configured (no gravity)
    pub const DEFAULT_GRAVITY: f32 = 0.0;
    /// World bounds as [[min_x, min_y], [max_x, max_y]]
    pub const DEFAULT_BOUNDS: [[f32; 2]; 2] = [[-1000.0, -1000.0], [1000.0, 1000.0]];
    /// Quad-tree leaf capacity before it splits
    pub const DEFAULT_CELL_LIMIT: usize = 10;
    /// Smallest cell the quad-tree subdivides down to
    pub const DEFAULT_CELL_SIZE: f32 = 100.0;

    /// Hard ceiling on quad-tree depth regardless of the cell sizing hint
    pub const MAX_TREE_DEPTH: u32 = 16;
}

/// Rotate a vector by `angle` radians (counter-clockwise in y-up terms)
#[inline]
pub fn rotate(v: Vec2, angle: f32) -> Vec2 {
    let (sin, cos) = angle.sin_cos();
    Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

/// Unit vector pointing along `angle`
#[inline]
pub fn direction(angle: f32) -> Vec2 {
    Vec2::new(angle.cos(), angle.sin())
}

//! World configuration
//!
//! Parameters are fixed at construction. Missing fields fall back to the
//! defaults in [`crate::consts`]; anything out of range is rejected by
//! [`WorldParams::validate`] rather than clamped.

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::{PhysicsError, PhysicsResult};
use crate::physics::Aabb;

/// Sizing hint for the smallest quad-tree cell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellDimension {
    pub width: f32,
    pub height: f32,
}

impl Default for CellDimension {
    fn default() -> Self {
        Self {
            width: DEFAULT_CELL_SIZE,
            height: DEFAULT_CELL_SIZE,
        }
    }
}

/// Construction-time parameters for a [`crate::World`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldParams {
    /// Relaxation passes per step (more passes = stiffer contact chains)
    pub relaxation_count: u32,
    /// Downward acceleration applied to bodies with nonzero mass
    pub gravity: f32,
    /// World bounds as [[min_x, min_y], [max_x, max_y]]
    pub bounds: [[f32; 2]; 2],
    /// Smallest cell the spatial index subdivides to
    pub cell_dimension: CellDimension,
    /// Clients a leaf holds before it splits
    pub cell_limit: usize,
}

impl Default for WorldParams {
    fn default() -> Self {
        Self {
            relaxation_count: DEFAULT_RELAXATION_COUNT,
            gravity: DEFAULT_GRAVITY,
            bounds: DEFAULT_BOUNDS,
            cell_dimension: CellDimension::default(),
            cell_limit: DEFAULT_CELL_LIMIT,
        }
    }
}

impl WorldParams {
    /// Parse parameters from JSON; absent keys keep their defaults
    pub fn from_json(json: &str) -> PhysicsResult<Self> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    pub fn with_gravity(mut self, gravity: f32) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_relaxation_count(mut self, count: u32) -> Self {
        self.relaxation_count = count;
        self
    }

    pub fn with_bounds(mut self, min: [f32; 2], max: [f32; 2]) -> Self {
        self.bounds = [min, max];
        self
    }

    pub fn with_cell_limit(mut self, limit: usize) -> Self {
        self.cell_limit = limit;
        self
    }

    /// World bounds as an AABB
    pub fn bounds_aabb(&self) -> Aabb {
        let [[min_x, min_y], [max_x, max_y]] = self.bounds;
        Aabb::new(glam::Vec2::new(min_x, min_y), glam::Vec2::new(max_x, max_y))
    }

    /// Deepest quad-tree level allowed by the cell sizing hint
    pub fn max_tree_depth(&self) -> u32 {
        let size = self.bounds_aabb().size();
        let ratio = (size.x / self.cell_dimension.width).max(size.y / self.cell_dimension.height);
        if ratio <= 1.0 {
            return 1;
        }
        (ratio.log2().ceil() as u32).clamp(1, MAX_TREE_DEPTH)
    }

    /// Check every parameter; the first problem found is reported
    pub fn validate(&self) -> PhysicsResult<()> {
        if self.relaxation_count == 0 {
            return Err(PhysicsError::InvalidRelaxationCount);
        }
        if !self.gravity.is_finite() {
            return Err(PhysicsError::InvalidGravity(self.gravity));
        }
        let [[min_x, min_y], [max_x, max_y]] = self.bounds;
        if !self.bounds_aabb().is_valid() {
            return Err(PhysicsError::InvalidBounds {
                min_x,
                min_y,
                max_x,
                max_y,
            });
        }
        let CellDimension { width, height } = self.cell_dimension;
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(PhysicsError::InvalidCellDimension { width, height });
        }
        if self.cell_limit == 0 {
            return Err(PhysicsError::InvalidCellLimit);
        }
        Ok(())
    }
}

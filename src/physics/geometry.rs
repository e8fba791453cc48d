//! Axis-aligned bounding boxes
//!
//! Intervals are closed: boxes that share an edge intersect.

use glam::Vec2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Box centered on `center` with full extent `size`
    pub fn from_center_size(center: Vec2, size: Vec2) -> Self {
        let half = size * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Box covering `center ± range`
    pub fn from_center_range(center: Vec2, range: Vec2) -> Self {
        Self {
            min: center - range,
            max: center + range,
        }
    }

    /// Smallest box containing both points
    pub fn from_points(a: Vec2, b: Vec2) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    #[inline]
    pub fn half_extents(&self) -> Vec2 {
        self.size() * 0.5
    }

    /// Finite with strictly positive width and height
    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.max.x > self.min.x && self.max.y > self.min.y
    }

    #[inline]
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    /// `other` lies entirely inside `self`
    #[inline]
    pub fn contains(&self, other: &Aabb) -> bool {
        other.min.x >= self.min.x
            && other.max.x <= self.max.x
            && other.min.y >= self.min.y
            && other.max.y <= self.max.y
    }

    #[inline]
    pub fn contains_point(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// The four equal quadrants, ordered top-left, top-right, bottom-left, bottom-right
    pub fn quadrants(&self) -> [Aabb; 4] {
        let c = self.center();
        [
            Aabb::new(self.min, c),
            Aabb::new(Vec2::new(c.x, self.min.y), Vec2::new(self.max.x, c.y)),
            Aabb::new(Vec2::new(self.min.x, c.y), Vec2::new(c.x, self.max.y)),
            Aabb::new(c, self.max),
        ]
    }
}

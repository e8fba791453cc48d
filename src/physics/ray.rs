//! Directed segment used for line-of-sight and hit-scan queries

use glam::Vec2;

use super::geometry::Aabb;
use crate::direction;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub position: Vec2,
    /// Heading in radians
    pub angle: f32,
    /// Length of the segment
    pub range: f32,
}

impl Ray {
    pub fn new(position: Vec2, angle: f32, range: f32) -> Self {
        Self {
            position,
            angle,
            range,
        }
    }

    #[inline]
    pub fn direction(&self) -> Vec2 {
        direction(self.angle)
    }

    /// Far end of the segment
    pub fn end(&self) -> Vec2 {
        self.position + self.direction() * self.range
    }

    /// Point `distance` along the ray
    pub fn at(&self, distance: f32) -> Vec2 {
        self.position + self.direction() * distance
    }

    /// Box spanning the whole segment
    pub fn bounding_rect(&self) -> Aabb {
        Aabb::from_points(self.position, self.end())
    }
}

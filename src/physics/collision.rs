//! Narrow-phase tests
//!
//! Ray vs body and body vs body, both against bounding rectangles.
//! Body overlap is resolved along the axis of least penetration. Ties go to
//! the horizontal axis; on that axis a neighbor at the same x counts as being
//! on the right, and on the vertical axis one at the same y counts as below.

use glam::Vec2;

use super::body::{Body, BodyProxy, Side};
use super::geometry::Aabb;
use super::ray::Ray;

/// Directions closer to axis-parallel than this are treated as parallel
const PARALLEL_EPSILON: f32 = 1e-8;

/// Gap still treated as touching. Relaxation leaves resolved pairs within
/// rounding error of each other, on either side of zero.
pub const CONTACT_SLOP: f32 = 1e-4;

/// Result of a ray test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayCollision {
    pub hit: bool,
    /// Where the ray crosses the first edge
    pub point: Vec2,
    /// Distance from the ray origin to `point`
    pub distance: f32,
}

impl RayCollision {
    pub fn miss() -> Self {
        Self {
            hit: false,
            point: Vec2::ZERO,
            distance: f32::MAX,
        }
    }
}

/// Result of a body overlap test, seen from the first body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub hit: bool,
    /// Side of the first body that was touched
    pub side: Side,
    /// Direction that separates the first body from the second
    pub normal: Vec2,
    /// Overlap along `normal` (0 when the bodies share an edge)
    pub penetration: f32,
    /// Center of the overlap region
    pub point: Vec2,
}

impl Contact {
    pub fn miss() -> Self {
        Self {
            hit: false,
            side: Side::Right,
            normal: Vec2::ZERO,
            penetration: 0.0,
            point: Vec2::ZERO,
        }
    }
}

/// Slab test of a segment against a box.
///
/// A ray starting inside the box reports the exit edge.
pub fn ray_aabb_collision(ray: &Ray, aabb: &Aabb) -> RayCollision {
    if !(ray.range > 0.0) {
        return RayCollision::miss();
    }
    let origin = ray.position.to_array();
    let dir = ray.direction().to_array();
    let lo = aabb.min.to_array();
    let hi = aabb.max.to_array();

    let mut t_enter = f32::NEG_INFINITY;
    let mut t_exit = f32::INFINITY;
    for axis in 0..2 {
        if dir[axis].abs() < PARALLEL_EPSILON {
            if origin[axis] < lo[axis] || origin[axis] > hi[axis] {
                return RayCollision::miss();
            }
            continue;
        }
        let mut t1 = (lo[axis] - origin[axis]) / dir[axis];
        let mut t2 = (hi[axis] - origin[axis]) / dir[axis];
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }
        t_enter = t_enter.max(t1);
        t_exit = t_exit.min(t2);
        if t_enter > t_exit {
            return RayCollision::miss();
        }
    }

    let t = if t_enter >= 0.0 { t_enter } else { t_exit };
    if t < 0.0 || t > ray.range {
        return RayCollision::miss();
    }
    RayCollision {
        hit: true,
        point: ray.at(t),
        distance: t,
    }
}

/// Ray against a body's bounding rectangle
pub fn detect_ray_collision(ray: &Ray, body: &Body) -> RayCollision {
    ray_aabb_collision(ray, &body.bounding_rect())
}

/// Overlap of `a` against `b`.
///
/// Sharing an edge (within [`CONTACT_SLOP`]) is a contact with zero
/// penetration; touching only at a corner is not.
pub fn detect_overlap(a: &BodyProxy, b: &BodyProxy) -> Contact {
    let delta = b.position - a.position;
    let reach = a.half_extents + b.half_extents;
    let overlap = reach - delta.abs();

    if overlap.x < -CONTACT_SLOP || overlap.y < -CONTACT_SLOP || overlap.max_element() <= CONTACT_SLOP {
        return Contact::miss();
    }

    let region = Aabb::new(a.bounds().min.max(b.bounds().min), a.bounds().max.min(b.bounds().max));

    if overlap.x <= overlap.y {
        let (side, normal) = if delta.x < 0.0 {
            (Side::Left, Vec2::X)
        } else {
            (Side::Right, Vec2::NEG_X)
        };
        Contact {
            hit: true,
            side,
            normal,
            penetration: overlap.x.max(0.0),
            point: region.center(),
        }
    } else {
        let (side, normal) = if delta.y < 0.0 {
            (Side::Top, Vec2::Y)
        } else {
            (Side::Bottom, Vec2::NEG_Y)
        };
        Contact {
            hit: true,
            side,
            normal,
            penetration: overlap.y.max(0.0),
            point: region.center(),
        }
    }
}

/// Overlap of two bodies, seen from `a`
pub fn detect_body_collision(a: &Body, b: &Body) -> Contact {
    detect_overlap(&a.proxy(), &b.proxy())
}

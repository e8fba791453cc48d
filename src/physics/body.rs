//! Rigid bodies
//!
//! A body is an axis-aligned box (or a circle treated by its bounding box)
//! owned by one entity. Position is authoritative; the spatial index only
//! mirrors it once per step.

use std::collections::BTreeSet;
use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::collision::Contact;
use super::geometry::Aabb;
use crate::entity::EntityId;
use crate::error::{PhysicsError, PhysicsResult};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct BodyId(pub u32);

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BodyId({})", self.0)
    }
}

/// Which side of a body a contact touched (y grows downward)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Top,
    Right,
    Bottom,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
            Side::Top => Side::Bottom,
            Side::Bottom => Side::Top,
        }
    }
}

/// Contacts recorded during the most recent step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Collisions {
    pub left: BTreeSet<BodyId>,
    pub top: BTreeSet<BodyId>,
    pub right: BTreeSet<BodyId>,
    pub bottom: BTreeSet<BodyId>,
    pub all: BTreeSet<BodyId>,
}

impl Collisions {
    pub fn clear(&mut self) {
        self.left.clear();
        self.top.clear();
        self.right.clear();
        self.bottom.clear();
        self.all.clear();
    }

    pub fn record(&mut self, side: Side, other: BodyId) {
        match side {
            Side::Left => self.left.insert(other),
            Side::Top => self.top.insert(other),
            Side::Right => self.right.insert(other),
            Side::Bottom => self.bottom.insert(other),
        };
        self.all.insert(other);
    }

    pub fn on(&self, side: Side) -> &BTreeSet<BodyId> {
        match side {
            Side::Left => &self.left,
            Side::Top => &self.top,
            Side::Right => &self.right,
            Side::Bottom => &self.bottom,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

/// Body geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Rect { width: f32, height: f32 },
    Circle { radius: f32 },
}

impl Shape {
    /// Full width and height of the axis-aligned extent
    pub fn bounding_size(&self) -> Vec2 {
        match *self {
            Shape::Rect { width, height } => Vec2::new(width, height),
            Shape::Circle { radius } => Vec2::splat(radius * 2.0),
        }
    }

    fn is_valid(&self) -> bool {
        let size = self.bounding_size();
        size.is_finite() && size.x > 0.0 && size.y > 0.0
    }
}

/// Collision response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Behavior {
    /// Pushed out of overlaps with other solid bodies
    #[default]
    Solid,
    /// Records contacts but never pushes or is pushed
    Trigger,
}

/// The parts of a body the contact solver reads from a neighbor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyProxy {
    pub position: Vec2,
    pub half_extents: Vec2,
    pub mass: f32,
    pub behavior: Behavior,
}

impl BodyProxy {
    pub fn bounds(&self) -> Aabb {
        Aabb::new(self.position - self.half_extents, self.position + self.half_extents)
    }
}

#[derive(Debug, Clone)]
pub struct Body {
    /// Center of the body, authoritative over the index
    pub position: Vec2,
    /// Units per second
    pub velocity: Vec2,
    /// Velocity kept along the contact normal after a hit (0 = dead stop)
    pub restitution: f32,
    /// How the body reacts to overlaps
    pub behavior: Behavior,
    /// 0 for static bodies
    mass: f32,
    shape: Shape,
    /// Entity the body was added for; set by the world
    owner: Option<EntityId>,
    /// Shape changed since the last reindex
    resized: bool,
    /// Contacts from the current step
    collisions: Collisions,
}

impl Body {
    pub fn new(shape: Shape) -> Self {
        Self {
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            restitution: 0.0,
            behavior: Behavior::Solid,
            mass: 1.0,
            shape,
            owner: None,
            resized: false,
            collisions: Collisions::default(),
        }
    }

    pub fn rect(width: f32, height: f32) -> Self {
        Self::new(Shape::Rect { width, height })
    }

    pub fn circle(radius: f32) -> Self {
        Self::new(Shape::Circle { radius })
    }

    pub fn with_position(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }

    /// Mass 0 makes the body static
    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }

    pub fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    #[inline]
    pub fn is_static(&self) -> bool {
        self.mass == 0.0
    }

    #[inline]
    pub fn inverse_mass(&self) -> f32 {
        if self.is_static() { 0.0 } else { 1.0 / self.mass }
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// Entity this body belongs to, once added to a world
    pub fn owner(&self) -> Option<EntityId> {
        self.owner
    }

    pub(crate) fn set_owner(&mut self, owner: EntityId) {
        self.owner = Some(owner);
    }

    /// Change the shape; the index picks up the new extent at the next reindex
    pub fn resize(&mut self, shape: Shape) -> PhysicsResult<()> {
        if !shape.is_valid() {
            return Err(PhysicsError::InvalidBody("shape extents must be finite and positive"));
        }
        self.shape = shape;
        self.resized = true;
        Ok(())
    }

    pub(crate) fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.resized)
    }

    pub fn collisions(&self) -> &Collisions {
        &self.collisions
    }

    pub(crate) fn clear_collisions(&mut self) {
        self.collisions.clear();
    }

    /// Full width and height of the bounding rectangle
    pub fn bounding_size(&self) -> Vec2 {
        self.shape.bounding_size()
    }

    pub fn bounding_rect(&self) -> Aabb {
        Aabb::from_center_size(self.position, self.bounding_size())
    }

    pub fn proxy(&self) -> BodyProxy {
        BodyProxy {
            position: self.position,
            half_extents: self.bounding_size() * 0.5,
            mass: self.mass,
            behavior: self.behavior,
        }
    }

    /// Explicit Euler position step: `position += velocity * dt`
    pub fn update_position(&mut self, dt: f32) {
        self.position += self.velocity * dt;
    }

    /// Record a contact with `other` and, for two solid bodies, push this
    /// body out along the contact normal by its mass share of the overlap.
    pub(crate) fn respond(&mut self, other_id: BodyId, other: &BodyProxy, contact: &Contact) {
        self.collisions.record(contact.side, other_id);

        if self.is_static() || self.behavior == Behavior::Trigger || other.behavior == Behavior::Trigger {
            return;
        }

        let share = if other.mass == 0.0 {
            1.0
        } else {
            other.mass / (self.mass + other.mass)
        };
        self.position += contact.normal * (contact.penetration * share);

        let into_contact = self.velocity.dot(contact.normal);
        if into_contact < 0.0 {
            self.velocity -= contact.normal * into_contact * (1.0 + self.restitution);
        }
    }

    pub fn validate(&self) -> PhysicsResult<()> {
        if !self.shape.is_valid() {
            return Err(PhysicsError::InvalidBody("shape extents must be finite and positive"));
        }
        if !self.mass.is_finite() || self.mass < 0.0 {
            return Err(PhysicsError::InvalidBody("mass must be finite and non-negative"));
        }
        if !self.position.is_finite() || !self.velocity.is_finite() {
            return Err(PhysicsError::InvalidBody("position and velocity must be finite"));
        }
        if !(0.0..=1.0).contains(&self.restitution) {
            return Err(PhysicsError::InvalidBody("restitution must be within [0, 1]"));
        }
        Ok(())
    }
}

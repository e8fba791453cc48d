//! Physics core
//!
//! Everything here is single-threaded and synchronous. A world step runs to
//! completion before any other mutation is safe, and bodies are always
//! processed in insertion order.

pub mod body;
pub mod collision;
pub mod controller;
pub mod geometry;
pub mod joint;
pub mod quadtree;
pub mod ray;
pub mod world;

pub use body::{Behavior, Body, BodyId, BodyProxy, Collisions, Shape, Side};
pub use collision::{
    Contact, RayCollision, detect_body_collision, detect_overlap, detect_ray_collision,
    ray_aabb_collision,
};
pub use controller::{BodyIndex, IndexController, IndexEntry};
pub use geometry::Aabb;
pub use joint::{Correction, Joint, JointId, JointKind};
pub use quadtree::{Client, ClientId, QueryStats, SpatialIndex};
pub use ray::Ray;
pub use world::{RayHit, RaycastQuery, World};

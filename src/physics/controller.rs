//! Per-body spatial-index controller
//!
//! Keeps one body's client in the world's index in sync with the body and
//! answers "who is near me" for the owning entity. Only the world mutates the
//! index through a controller, and only while attaching, reindexing or
//! removing a body.

use glam::Vec2;

use super::body::{Body, BodyId};
use super::quadtree::{ClientId, SpatialIndex};
use crate::entity::EntityId;
use crate::error::PhysicsResult;

/// Payload stored with every client in the world's index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub entity: EntityId,
    pub body: BodyId,
}

pub type BodyIndex = SpatialIndex<IndexEntry>;

#[derive(Debug, Clone)]
pub struct IndexController {
    owner: EntityId,
    body: BodyId,
    client: ClientId,
    indexed_position: Vec2,
    indexed_size: Vec2,
}

impl IndexController {
    /// Register `body` as a new client
    pub(crate) fn attach(index: &mut BodyIndex, owner: EntityId, id: BodyId, body: &Body) -> Self {
        let size = body.bounding_size();
        let client = index.insert(body.position, size, IndexEntry { entity: owner, body: id });
        Self {
            owner,
            body: id,
            client,
            indexed_position: body.position,
            indexed_size: size,
        }
    }

    pub fn owner(&self) -> EntityId {
        self.owner
    }

    pub fn body(&self) -> BodyId {
        self.body
    }

    pub fn client(&self) -> ClientId {
        self.client
    }

    /// Push the body's current position (and extent, if it was resized) into
    /// the index. After a `clear` the old handle is stale and the body is
    /// registered again.
    pub(crate) fn sync(&mut self, index: &mut BodyIndex, body: &mut Body) -> PhysicsResult<()> {
        let resized = body.take_resized();
        let size = body.bounding_size();
        if index.client(self.client).is_some() {
            index.update(self.client, body.position, resized.then_some(size))?;
            if resized {
                self.indexed_size = size;
            }
        } else {
            let entry = IndexEntry {
                entity: self.owner,
                body: self.body,
            };
            self.client = index.insert(body.position, size, entry);
            self.indexed_size = size;
        }
        self.indexed_position = body.position;
        Ok(())
    }

    /// Drop this body's client from the index
    pub(crate) fn release(&self, index: &mut BodyIndex) {
        if index.client(self.client).is_some() {
            // The handle was just checked, so removal cannot fail
            let _ = index.remove(self.client);
        }
    }

    /// How far the body may have strayed from its indexed box, per axis
    pub fn drift(&self, body: &Body) -> Vec2 {
        let moved = (body.position - self.indexed_position).abs();
        let grown = ((body.bounding_size() - self.indexed_size) * 0.5).max(Vec2::ZERO);
        moved + grown
    }

    /// Entities whose indexed box touches `position ± range`, excluding the owner
    pub fn find_nearby(&self, index: &BodyIndex, position: Vec2, range: Vec2) -> Vec<EntityId> {
        let mut found: Vec<EntityId> = index
            .find_near(position, range)
            .into_iter()
            .filter_map(|id| index.client(id).map(|c| c.data.entity))
            .filter(|&entity| entity != self.owner)
            .collect();
        found.sort_unstable();
        found.dedup();
        found
    }
}

//! Entity registry
//!
//! A deliberately small stand-in for the host's entity framework: stable
//! handles, a position, and a set of group labels. The physics core only asks
//! the host for group membership (see [`GroupLookup`]) and hands positions back
//! after each step.

use std::collections::BTreeSet;
use std::fmt;

use glam::Vec2;

use crate::physics::World;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

/// Group membership as seen by raycast filtering
pub trait GroupLookup {
    fn has_group(&self, entity: EntityId, group: &str) -> bool;
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub position: Vec2,
    groups: BTreeSet<String>,
}

impl Entity {
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(String::as_str)
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }
}

/// Slot map of entities addressed by [`EntityId`]
#[derive(Debug, Default)]
pub struct Entities {
    slots: Vec<Option<Entity>>,
}

impl Entities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an entity at `position`; ids are never reused
    pub fn spawn(&mut self, position: Vec2) -> EntityId {
        let id = EntityId(self.slots.len() as u32);
        self.slots.push(Some(Entity {
            id,
            position,
            groups: BTreeSet::new(),
        }));
        id
    }

    pub fn despawn(&mut self, id: EntityId) -> Option<Entity> {
        self.slots.get_mut(id.0 as usize).and_then(Option::take)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.slots.get(id.0 as usize).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.slots.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    /// Add `entity` to `group`. Returns false if the entity does not exist.
    pub fn add_group(&mut self, id: EntityId, group: &str) -> bool {
        match self.get_mut(id) {
            Some(entity) => {
                entity.groups.insert(group.to_string());
                true
            }
            None => false,
        }
    }

    pub fn remove_group(&mut self, id: EntityId, group: &str) -> bool {
        self.get_mut(id)
            .map(|entity| entity.groups.remove(group))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy every body's position onto its owning entity
    pub fn sync_from_world(&mut self, world: &World) {
        for (_, body) in world.bodies() {
            if let Some(entity) = body.owner().and_then(|owner| self.get_mut(owner)) {
                entity.position = body.position;
            }
        }
    }
}

impl GroupLookup for Entities {
    fn has_group(&self, entity: EntityId, group: &str) -> bool {
        self.get(entity).is_some_and(|e| e.in_group(group))
    }
}

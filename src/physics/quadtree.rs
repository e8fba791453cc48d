//! Quad-tree spatial index
//!
//! A fixed root region split on demand into four equal quadrants. Leaves hold
//! up to `cell_limit` clients; inserting past that splits the leaf and pushes
//! its clients down. A leaf whose clients all cover every quadrant is left
//! whole, and splitting stops at `max_depth`, so many clients stacked on one
//! spot just make a fat leaf.
//!
//! Straddling policy: a client is stored in every leaf its box touches, and
//! queries de-duplicate. Clients not fully inside the root region go to an
//! overflow list that every query scans, so results stay exact.
//!
//! Removal never merges under-full quadrants. [`SpatialIndex::clear`] drops
//! everything (clients and structure); [`SpatialIndex::rebuild`] keeps the
//! clients and re-derives the structure.

use std::fmt;

use glam::Vec2;

use super::geometry::Aabb;
use crate::consts::MAX_TREE_DEPTH;
use crate::error::{PhysicsError, PhysicsResult};

/// Generational handle to a client; stale after `remove` or `clear`
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ClientId {
    slot: u32,
    generation: u32,
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientId({}v{})", self.slot, self.generation)
    }
}

/// One entry in the index: a box centered on `position` plus a payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Client<T> {
    pub position: Vec2,
    pub size: Vec2,
    pub data: T,
}

impl<T> Client<T> {
    #[inline]
    pub fn bounds(&self) -> Aabb {
        Aabb::from_center_size(self.position, self.size)
    }
}

/// Traversal counters for a single query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryStats {
    pub nodes_visited: usize,
    pub candidates_tested: usize,
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    client: Option<Client<T>>,
}

#[derive(Debug)]
enum NodeKind {
    Leaf(Vec<ClientId>),
    Split([usize; 4]),
}

#[derive(Debug)]
struct Node {
    bounds: Aabb,
    depth: u32,
    kind: NodeKind,
}

impl Node {
    fn leaf(bounds: Aabb, depth: u32) -> Self {
        Self {
            bounds,
            depth,
            kind: NodeKind::Leaf(Vec::new()),
        }
    }
}

#[derive(Debug)]
pub struct SpatialIndex<T> {
    bounds: Aabb,
    cell_limit: usize,
    max_depth: u32,
    nodes: Vec<Node>,
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    overflow: Vec<ClientId>,
    len: usize,
}

impl<T: Copy> SpatialIndex<T> {
    /// Create an index over `bounds` with the default depth ceiling
    pub fn new(bounds: Aabb, cell_limit: usize) -> PhysicsResult<Self> {
        Self::with_max_depth(bounds, cell_limit, MAX_TREE_DEPTH)
    }

    pub fn with_max_depth(bounds: Aabb, cell_limit: usize, max_depth: u32) -> PhysicsResult<Self> {
        if !bounds.is_valid() {
            return Err(PhysicsError::InvalidBounds {
                min_x: bounds.min.x,
                min_y: bounds.min.y,
                max_x: bounds.max.x,
                max_y: bounds.max.y,
            });
        }
        if cell_limit == 0 {
            return Err(PhysicsError::InvalidCellLimit);
        }
        Ok(Self {
            bounds,
            cell_limit,
            max_depth: max_depth.min(MAX_TREE_DEPTH),
            nodes: vec![Node::leaf(bounds, 0)],
            slots: Vec::new(),
            free: Vec::new(),
            overflow: Vec::new(),
            len: 0,
        })
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn cell_limit(&self) -> usize {
        self.cell_limit
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Leaf(_)))
            .count()
    }

    /// Deepest level currently in the tree (root is 0)
    pub fn depth(&self) -> u32 {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    pub fn client(&self, id: ClientId) -> Option<&Client<T>> {
        self.slots
            .get(id.slot as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.client.as_ref())
    }

    /// Live clients in slot order
    pub fn iter(&self) -> impl Iterator<Item = (ClientId, &Client<T>)> {
        self.slots.iter().enumerate().filter_map(|(slot, s)| {
            s.client.as_ref().map(|c| {
                (
                    ClientId {
                        slot: slot as u32,
                        generation: s.generation,
                    },
                    c,
                )
            })
        })
    }

    pub fn insert(&mut self, position: Vec2, size: Vec2, data: T) -> ClientId {
        let client = Client {
            position,
            size: size.abs(),
            data,
        };
        let id = match self.free.pop() {
            Some(slot) => {
                let entry = &mut self.slots[slot as usize];
                entry.client = Some(client);
                ClientId {
                    slot,
                    generation: entry.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    client: Some(client),
                });
                ClientId {
                    slot: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        };
        self.len += 1;
        self.attach(id, client.bounds());
        id
    }

    /// Move (and optionally resize) a client; same result as remove + insert
    /// but the handle stays valid
    pub fn update(&mut self, id: ClientId, position: Vec2, size: Option<Vec2>) -> PhysicsResult<()> {
        let old = *self.client(id).ok_or(PhysicsError::StaleClient(id))?;
        self.detach(id, old.bounds());

        let mut moved = old;
        moved.position = position;
        if let Some(size) = size {
            moved.size = size.abs();
        }
        self.slots[id.slot as usize].client = Some(moved);
        self.attach(id, moved.bounds());
        Ok(())
    }

    pub fn remove(&mut self, id: ClientId) -> PhysicsResult<Client<T>> {
        let client = *self.client(id).ok_or(PhysicsError::StaleClient(id))?;
        self.detach(id, client.bounds());

        let entry = &mut self.slots[id.slot as usize];
        entry.client = None;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(id.slot);
        self.len -= 1;
        Ok(client)
    }

    /// Drop every client and collapse to a single root leaf.
    /// All outstanding handles become stale.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.nodes.push(Node::leaf(self.bounds, 0));
        self.overflow.clear();
        for entry in &mut self.slots {
            if entry.client.take().is_some() {
                entry.generation = entry.generation.wrapping_add(1);
            }
        }
        // Lowest slots are handed out first
        self.free = (0..self.slots.len() as u32).rev().collect();
        self.len = 0;
    }

    /// Rebuild the tree structure from the live clients, keeping handles
    pub fn rebuild(&mut self) {
        self.nodes.clear();
        self.nodes.push(Node::leaf(self.bounds, 0));
        self.overflow.clear();
        let live: Vec<(ClientId, Aabb)> = self.iter().map(|(id, c)| (id, c.bounds())).collect();
        for (id, bounds) in live {
            self.attach(id, bounds);
        }
        log::trace!(
            "quadtree rebuilt: {} clients, {} nodes",
            self.len,
            self.nodes.len()
        );
    }

    /// Every client whose box intersects `center ± range`, without duplicates
    pub fn find_near(&self, center: Vec2, range: Vec2) -> Vec<ClientId> {
        self.find_near_with_stats(center, range).0
    }

    pub fn find_near_with_stats(&self, center: Vec2, range: Vec2) -> (Vec<ClientId>, QueryStats) {
        let query = Aabb::from_center_range(center, range.abs());
        let mut stats = QueryStats::default();
        let mut found = Vec::new();

        let mut stack = vec![0usize];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if !node.bounds.intersects(&query) {
                continue;
            }
            stats.nodes_visited += 1;
            match &node.kind {
                NodeKind::Split(children) => stack.extend_from_slice(children),
                NodeKind::Leaf(ids) => {
                    for &id in ids {
                        stats.candidates_tested += 1;
                        if self.client(id).is_some_and(|c| c.bounds().intersects(&query)) {
                            found.push(id);
                        }
                    }
                }
            }
        }

        for &id in &self.overflow {
            stats.candidates_tested += 1;
            if self.client(id).is_some_and(|c| c.bounds().intersects(&query)) {
                found.push(id);
            }
        }

        found.sort_unstable();
        found.dedup();
        (found, stats)
    }

    fn attach(&mut self, id: ClientId, bounds: Aabb) {
        if self.bounds.contains(&bounds) {
            self.insert_at(0, id, bounds);
        } else {
            self.overflow.push(id);
        }
    }

    fn detach(&mut self, id: ClientId, bounds: Aabb) {
        if self.bounds.contains(&bounds) {
            self.remove_at(0, id, bounds);
        } else {
            self.overflow.retain(|&other| other != id);
        }
    }

    fn insert_at(&mut self, index: usize, id: ClientId, bounds: Aabb) {
        if let NodeKind::Split(children) = self.nodes[index].kind {
            for child in children {
                if self.nodes[child].bounds.intersects(&bounds) {
                    self.insert_at(child, id, bounds);
                }
            }
            return;
        }

        let crowded = match &mut self.nodes[index].kind {
            NodeKind::Leaf(ids) => {
                ids.push(id);
                ids.len() > self.cell_limit
            }
            NodeKind::Split(_) => false,
        };
        if crowded && self.nodes[index].depth < self.max_depth && self.split_separates(index) {
            self.split(index);
        }
    }

    /// Whether splitting leaf `index` would leave some quadrant with fewer
    /// clients. Clients that all cover every quadrant stay in a fat leaf.
    fn split_separates(&self, index: usize) -> bool {
        let node = &self.nodes[index];
        let NodeKind::Leaf(ids) = &node.kind else {
            return false;
        };
        node.bounds.quadrants().iter().any(|quadrant| {
            ids.iter()
                .any(|&id| !self.client(id).is_some_and(|c| c.bounds().intersects(quadrant)))
        })
    }

    fn remove_at(&mut self, index: usize, id: ClientId, bounds: Aabb) {
        if let NodeKind::Split(children) = self.nodes[index].kind {
            for child in children {
                if self.nodes[child].bounds.intersects(&bounds) {
                    self.remove_at(child, id, bounds);
                }
            }
        } else if let NodeKind::Leaf(ids) = &mut self.nodes[index].kind {
            ids.retain(|&other| other != id);
        }
    }

    fn split(&mut self, index: usize) {
        let bounds = self.nodes[index].bounds;
        let depth = self.nodes[index].depth + 1;
        let first = self.nodes.len();
        for quadrant in bounds.quadrants() {
            self.nodes.push(Node::leaf(quadrant, depth));
        }
        let children = [first, first + 1, first + 2, first + 3];

        let ids = match std::mem::replace(&mut self.nodes[index].kind, NodeKind::Split(children)) {
            NodeKind::Leaf(ids) => ids,
            NodeKind::Split(_) => return,
        };
        log::trace!(
            "quadtree split node {} at depth {} ({} clients)",
            index,
            depth - 1,
            ids.len()
        );

        for id in ids {
            let Some(client_bounds) = self.client(id).map(Client::bounds) else {
                continue;
            };
            for child in children {
                if self.nodes[child].bounds.intersects(&client_bounds) {
                    self.insert_at(child, id, client_bounds);
                }
            }
        }
    }
}

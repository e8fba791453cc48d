//! The physics world and its fixed step
//!
//! One [`World::update`] runs, strictly in order:
//! 1. clear every body's contact sets
//! 2. apply gravity to non-static bodies, then integrate every body
//! 3. run each joint once, in insertion order
//! 4. `relaxation_count` relaxation passes over the bodies in list order
//! 5. clear the spatial index and re-register every body through its controller
//!
//! Relaxation is a fixed number of position-correction passes, not an exact
//! solve. Results depend on body order, so bodies keep their insertion order.

use std::collections::HashMap;

use glam::Vec2;

use super::body::{Body, BodyId};
use super::collision::{CONTACT_SLOP, detect_overlap, detect_ray_collision};
use super::controller::{BodyIndex, IndexController};
use super::joint::{Joint, JointId};
use super::quadtree::SpatialIndex;
use super::ray::Ray;
use crate::config::WorldParams;
use crate::entity::{EntityId, GroupLookup};
use crate::error::{PhysicsError, PhysicsResult};

/// Parameters of a raycast
#[derive(Debug, Clone, PartialEq)]
pub struct RaycastQuery {
    pub position: Vec2,
    pub angle: f32,
    pub range: f32,
    /// Space-separated group names; a body qualifies if its entity is in any
    pub groups: String,
}

impl RaycastQuery {
    pub fn new(position: Vec2, angle: f32, range: f32, groups: impl Into<String>) -> Self {
        Self {
            position,
            angle,
            range,
            groups: groups.into(),
        }
    }
}

/// One body hit by a raycast
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub body: BodyId,
    pub entity: EntityId,
    pub point: Vec2,
    pub distance: f32,
}

#[derive(Debug)]
pub struct World {
    /// Validated construction parameters
    params: WorldParams,
    /// Broad phase; rebuilt at the end of every step
    index: BodyIndex,
    /// Active bodies by id
    bodies: HashMap<BodyId, Body>,
    /// Body list order, used by every per-body pass
    order: Vec<BodyId>,
    /// One index controller per body
    controllers: HashMap<BodyId, IndexController>,
    /// Joints in insertion order
    joints: Vec<(JointId, Joint)>,
    next_body: u32,
    next_joint: u32,
    /// Completed steps
    step_count: u64,
}

impl World {
    pub fn new(params: WorldParams) -> PhysicsResult<Self> {
        params.validate()?;
        let index = SpatialIndex::with_max_depth(
            params.bounds_aabb(),
            params.cell_limit,
            params.max_tree_depth(),
        )?;
        log::debug!(
            "world created: gravity={}, relaxation={}, cell_limit={}, max_depth={}",
            params.gravity,
            params.relaxation_count,
            params.cell_limit,
            params.max_tree_depth()
        );
        Ok(Self {
            params,
            index,
            bodies: HashMap::new(),
            order: Vec::new(),
            controllers: HashMap::new(),
            joints: Vec::new(),
            next_body: 0,
            next_joint: 0,
            step_count: 0,
        })
    }

    pub fn params(&self) -> &WorldParams {
        &self.params
    }

    /// Read-only view of the spatial index
    pub fn index(&self) -> &BodyIndex {
        &self.index
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn body_count(&self) -> usize {
        self.order.len()
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    pub fn body(&self, id: BodyId) -> Option<&Body> {
        self.bodies.get(&id)
    }

    /// Mutable access for game logic; only call between steps
    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        self.bodies.get_mut(&id)
    }

    /// Active bodies in list order
    pub fn bodies(&self) -> impl Iterator<Item = (BodyId, &Body)> {
        self.order
            .iter()
            .filter_map(|id| self.bodies.get(id).map(|body| (*id, body)))
    }

    pub fn controller(&self, id: BodyId) -> Option<&IndexController> {
        self.controllers.get(&id)
    }

    pub fn joint(&self, id: JointId) -> Option<&Joint> {
        self.joints.iter().find(|(jid, _)| *jid == id).map(|(_, j)| j)
    }

    /// Add `body` for `entity` and attach its index controller
    pub fn add_body(&mut self, entity: EntityId, mut body: Body) -> PhysicsResult<BodyId> {
        body.validate()?;
        let id = BodyId(self.next_body);
        self.next_body += 1;

        if !self.index.bounds().contains(&body.bounding_rect()) {
            log::warn!("{} for {} starts outside the world bounds", id, entity);
        }
        body.set_owner(entity);
        let controller = IndexController::attach(&mut self.index, entity, id, &body);
        self.controllers.insert(id, controller);
        self.bodies.insert(id, body);
        self.order.push(id);
        log::debug!("added {} for {}", id, entity);
        Ok(id)
    }

    /// Remove a body, release its index client and drop joints that use it
    pub fn remove_body(&mut self, entity: EntityId, id: BodyId) -> PhysicsResult<Body> {
        let owner = self
            .bodies
            .get(&id)
            .ok_or(PhysicsError::UnknownBody(id))?
            .owner();
        if owner != Some(entity) {
            return Err(PhysicsError::OwnerMismatch {
                body: id,
                claimed: entity,
                actual: owner.unwrap_or(entity),
            });
        }

        if let Some(controller) = self.controllers.remove(&id) {
            controller.release(&mut self.index);
        } else {
            log::warn!("{} had no index controller when removed", id);
        }
        self.order.retain(|&other| other != id);

        let before = self.joints.len();
        self.joints.retain(|(_, joint)| !joint.involves(id));
        if self.joints.len() != before {
            log::debug!("dropped {} joint(s) attached to {}", before - self.joints.len(), id);
        }

        log::debug!("removed {} from {}", id, entity);
        self.bodies.remove(&id).ok_or(PhysicsError::UnknownBody(id))
    }

    pub fn add_joint(&mut self, joint: Joint) -> PhysicsResult<JointId> {
        for body in [joint.body_a, joint.body_b] {
            if !self.bodies.contains_key(&body) {
                return Err(PhysicsError::UnknownBody(body));
            }
        }
        let id = JointId(self.next_joint);
        self.next_joint += 1;
        self.joints.push((id, joint));
        log::debug!("added {} between {} and {}", id, joint.body_a, joint.body_b);
        Ok(id)
    }

    pub fn remove_joint(&mut self, id: JointId) -> Option<Joint> {
        let pos = self.joints.iter().position(|(jid, _)| *jid == id)?;
        Some(self.joints.remove(pos).1)
    }

    /// Advance the simulation by `dt` seconds.
    ///
    /// Inputs are checked before anything is mutated, so an error leaves the
    /// world exactly as it was.
    pub fn update(&mut self, dt: f32) -> PhysicsResult<()> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(PhysicsError::InvalidTimestep(dt));
        }
        if let Some(&missing) = self.order.iter().find(|id| !self.controllers.contains_key(*id)) {
            return Err(PhysicsError::MissingController(missing));
        }

        for id in &self.order {
            if let Some(body) = self.bodies.get_mut(id) {
                body.clear_collisions();
            }
        }

        let gravity = self.params.gravity;
        for id in &self.order {
            if let Some(body) = self.bodies.get_mut(id) {
                if !body.is_static() {
                    body.velocity.y += gravity * dt;
                }
                body.update_position(dt);
            }
        }

        // Joints always name two different bodies, so `b` can be lifted out
        // while `a` is borrowed in place
        for (_, joint) in &self.joints {
            let Some(mut b) = self.bodies.remove(&joint.body_b) else {
                continue;
            };
            if let Some(a) = self.bodies.get_mut(&joint.body_a) {
                joint.update(a, &mut b, dt);
            }
            self.bodies.insert(joint.body_b, b);
        }

        let mut drift = self.max_drift();
        for _ in 0..self.params.relaxation_count {
            self.relaxation_pass(&mut drift);
        }

        self.reindex()?;
        self.step_count += 1;
        log::trace!(
            "step {}: {} bodies, {} joints, {} index nodes",
            self.step_count,
            self.order.len(),
            self.joints.len(),
            self.index.node_count()
        );
        Ok(())
    }

    /// Entities near `id` (excluding its own), as of the last reindex
    pub fn find_nearby(&self, id: BodyId, range: Vec2) -> PhysicsResult<Vec<EntityId>> {
        let body = self.bodies.get(&id).ok_or(PhysicsError::UnknownBody(id))?;
        let controller = self
            .controllers
            .get(&id)
            .ok_or(PhysicsError::MissingController(id))?;
        Ok(controller.find_nearby(&self.index, body.position, range))
    }

    /// Bodies in any of the query's groups that the ray crosses, in body-list
    /// order. An empty group list or non-positive range finds nothing.
    pub fn raycast(&self, query: &RaycastQuery, groups: &impl GroupLookup) -> Vec<RayHit> {
        let names: Vec<&str> = query.groups.split_whitespace().collect();
        if names.is_empty() || !(query.range > 0.0) {
            return Vec::new();
        }

        let ray = Ray::new(query.position, query.angle, query.range);
        let ray_box = ray.bounding_rect();

        self.bodies()
            .filter_map(|(id, body)| {
                let entity = body.owner()?;
                if !names.iter().any(|group| groups.has_group(entity, group)) {
                    return None;
                }
                let body_box = body.bounding_rect();
                let x_overlap = ray_box.min.x <= body_box.max.x && ray_box.max.x >= body_box.min.x;
                let y_overlap = ray_box.min.y <= body_box.max.y && ray_box.max.y >= body_box.min.y;
                if !(x_overlap || y_overlap) {
                    return None;
                }
                let hit = detect_ray_collision(&ray, body);
                hit.hit.then_some(RayHit {
                    body: id,
                    entity,
                    point: hit.point,
                    distance: hit.distance,
                })
            })
            .collect()
    }

    /// Closest hit of [`World::raycast`]
    pub fn raycast_nearest(&self, query: &RaycastQuery, groups: &impl GroupLookup) -> Option<RayHit> {
        self.raycast(query, groups)
            .into_iter()
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    /// Largest per-axis distance any body has moved from its indexed box
    fn max_drift(&self) -> Vec2 {
        self.order.iter().fold(Vec2::ZERO, |acc, id| {
            match (self.controllers.get(id), self.bodies.get(id)) {
                (Some(controller), Some(body)) => acc.max(controller.drift(body)),
                _ => acc,
            }
        })
    }

    fn relaxation_pass(&mut self, drift: &mut Vec2) {
        for i in 0..self.order.len() {
            let id = self.order[i];
            self.handle_behavior(id, drift);
        }
    }

    /// Resolve one body against whatever currently overlaps it.
    ///
    /// The index lags behind this step's motion, so the search box is grown by
    /// `drift`; it only ever grows as bodies get pushed around.
    fn handle_behavior(&mut self, id: BodyId, drift: &mut Vec2) {
        let Some(body) = self.bodies.get(&id) else {
            return;
        };
        let mut me = body.proxy();
        let candidates = self.index
            .find_near(me.position, me.half_extents + *drift + Vec2::splat(CONTACT_SLOP));

        for client in candidates {
            let Some(other_id) = self.index.client(client).map(|c| c.data.body) else {
                continue;
            };
            if other_id == id {
                continue;
            }
            let Some(other) = self.bodies.get(&other_id).map(Body::proxy) else {
                continue;
            };
            let contact = detect_overlap(&me, &other);
            if !contact.hit {
                continue;
            }
            let Some(body) = self.bodies.get_mut(&id) else {
                return;
            };
            body.respond(other_id, &other, &contact);
            me = body.proxy();
            if let Some(controller) = self.controllers.get(&id) {
                *drift = drift.max(controller.drift(body));
            }
        }
    }

    fn reindex(&mut self) -> PhysicsResult<()> {
        self.index.clear();
        for id in &self.order {
            let controller = self
                .controllers
                .get_mut(id)
                .ok_or(PhysicsError::MissingController(*id))?;
            let body = self.bodies.get_mut(id).ok_or(PhysicsError::UnknownBody(*id))?;
            controller.sync(&mut self.index, body)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entities;
    use crate::physics::body::{Behavior, Side};

    fn world(gravity: f32) -> World {
        World::new(WorldParams::default().with_gravity(gravity)).unwrap()
    }

    fn spawn(world: &mut World, entities: &mut Entities, body: Body) -> (EntityId, BodyId) {
        let entity = entities.spawn(body.position);
        let id = world.add_body(entity, body).unwrap();
        (entity, id)
    }

    #[test]
    fn test_rejects_invalid_params() {
        assert!(World::new(WorldParams::default().with_cell_limit(0)).is_err());
        assert!(World::new(WorldParams::default().with_bounds([5.0, 0.0], [1.0, 10.0])).is_err());
    }

    #[test]
    fn test_gravity_integration() {
        let mut world = world(10.0);
        let mut entities = Entities::new();
        let (_, falling) = spawn(&mut world, &mut entities, Body::rect(1.0, 1.0).with_position(Vec2::new(0.0, 3.0)));
        let (_, fixed) = spawn(
            &mut world,
            &mut entities,
            Body::rect(1.0, 1.0).with_position(Vec2::new(100.0, 0.0)).with_mass(0.0),
        );

        world.update(0.5).unwrap();
        // Gravity lands in velocity before the position step
        assert_eq!(world.body(falling).unwrap().position.y, 3.0 + 10.0 * 0.5 * 0.5);
        assert_eq!(world.body(falling).unwrap().velocity.y, 5.0);
        assert_eq!(world.body(fixed).unwrap().velocity.y, 0.0);
        assert_eq!(world.body(fixed).unwrap().position, Vec2::new(100.0, 0.0));
    }

    #[test]
    fn test_static_body_moves_with_explicit_velocity() {
        let mut world = world(10.0);
        let mut entities = Entities::new();
        let (_, platform) = spawn(
            &mut world,
            &mut entities,
            Body::rect(10.0, 1.0).with_mass(0.0).with_velocity(Vec2::new(4.0, 0.0)),
        );
        world.update(0.25).unwrap();
        assert_eq!(world.body(platform).unwrap().position, Vec2::new(1.0, 0.0));
    }

    #[test]
    fn test_resting_contact_recorded_by_side() {
        let mut world = world(0.0);
        let mut entities = Entities::new();
        let (_, floor) = spawn(
            &mut world,
            &mut entities,
            Body::rect(200.0, 20.0).with_position(Vec2::new(0.0, 100.0)).with_mass(0.0),
        );
        let (_, crate_id) = spawn(&mut world, &mut entities, Body::rect(10.0, 10.0).with_position(Vec2::new(0.0, 87.0)));

        world.update(0.0).unwrap();
        let crate_body = world.body(crate_id).unwrap();
        assert_eq!(crate_body.position, Vec2::new(0.0, 85.0));
        assert!(crate_body.collisions().bottom.contains(&floor));
        assert!(crate_body.collisions().all.contains(&floor));
        assert!(crate_body.collisions().on(Side::Top).is_empty());

        let floor_body = world.body(floor).unwrap();
        assert!(floor_body.collisions().top.contains(&crate_id));
        assert_eq!(floor_body.position, Vec2::new(0.0, 100.0));
    }

    #[test]
    fn test_resting_contact_seen_from_both_sides() {
        // Crate first so relaxation leaves the pair only just touching by the
        // time the floor looks for it
        for i in 0..24 {
            let k = i as f32;
            let mut world = world(600.0);
            let mut entities = Entities::new();
            let (_, crate_id) = spawn(
                &mut world,
                &mut entities,
                Body::rect(7.3 + k * 0.61, 5.9 + k * 0.37)
                    .with_position(Vec2::new(-13.7 + k * 1.13, 11.29 + k * 0.77)),
            );
            let (_, floor) = spawn(
                &mut world,
                &mut entities,
                Body::rect(257.3, 21.9 + k * 0.13)
                    .with_position(Vec2::new(0.7, 80.13 + k * 0.41))
                    .with_mass(0.0),
            );

            for _ in 0..120 {
                world.update(1.0 / 120.0).unwrap();
            }
            let crate_body = world.body(crate_id).unwrap();
            let floor_body = world.body(floor).unwrap();
            assert!(crate_body.collisions().bottom.contains(&floor), "run {i}: crate lost the floor");
            assert!(
                floor_body.collisions().on(Side::Bottom.opposite()).contains(&crate_id),
                "run {i}: floor lost the crate"
            );
        }
    }

    #[test]
    fn test_collision_sets_reset_every_step() {
        let mut world = world(0.0);
        let mut entities = Entities::new();
        let (_, a) = spawn(&mut world, &mut entities, Body::rect(10.0, 10.0));
        let (_, b) = spawn(&mut world, &mut entities, Body::rect(10.0, 10.0).with_position(Vec2::new(8.0, 0.0)));

        world.update(0.0).unwrap();
        assert!(world.body(a).unwrap().collisions().all.contains(&b));

        // Pull them well apart; the next step must forget the old contact
        world.body_mut(b).unwrap().position = Vec2::new(100.0, 0.0);
        world.update(0.0).unwrap();
        for (_, body) in world.bodies() {
            assert!(body.collisions().is_empty());
            assert!(body.collisions().left.is_empty());
            assert!(body.collisions().right.is_empty());
        }
    }

    #[test]
    fn test_body_never_collides_with_itself() {
        let mut world = world(0.0);
        let mut entities = Entities::new();
        let (_, a) = spawn(&mut world, &mut entities, Body::rect(10.0, 10.0));
        world.update(1.0 / 60.0).unwrap();
        assert!(!world.body(a).unwrap().collisions().all.contains(&a));
    }

    #[test]
    fn test_relaxation_reaches_fixed_point() {
        let mut world = world(0.0);
        let mut entities = Entities::new();
        spawn(
            &mut world,
            &mut entities,
            Body::rect(200.0, 20.0).with_position(Vec2::new(0.0, 100.0)).with_mass(0.0),
        );
        let (_, crate_id) = spawn(&mut world, &mut entities, Body::rect(10.0, 10.0).with_position(Vec2::new(0.0, 87.0)));

        let mut drift = world.max_drift();
        world.relaxation_pass(&mut drift);
        let separated: Vec<Vec2> = world.bodies().map(|(_, b)| b.position).collect();
        assert_eq!(world.body(crate_id).unwrap().position.y, 85.0);

        world.relaxation_pass(&mut drift);
        let again: Vec<Vec2> = world.bodies().map(|(_, b)| b.position).collect();
        assert_eq!(separated, again);
    }

    #[test]
    fn test_stale_index_does_not_hide_contacts() {
        let mut world = world(0.0);
        let mut entities = Entities::new();
        let (_, wall) = spawn(
            &mut world,
            &mut entities,
            Body::rect(10.0, 100.0).with_position(Vec2::new(300.0, 0.0)).with_mass(0.0),
        );
        // Fast enough to cross most of the gap in one step
        let (_, bullet) = spawn(
            &mut world,
            &mut entities,
            Body::rect(4.0, 4.0).with_velocity(Vec2::new(594.0, 0.0)),
        );

        world.update(0.5).unwrap();
        let bullet_body = world.body(bullet).unwrap();
        assert!(bullet_body.collisions().right.contains(&wall));
        assert_eq!(bullet_body.position.x, 293.0);
    }

    #[test]
    fn test_trigger_records_without_pushing() {
        let mut world = world(0.0);
        let mut entities = Entities::new();
        let (_, zone) = spawn(
            &mut world,
            &mut entities,
            Body::rect(50.0, 50.0).with_mass(0.0).with_behavior(Behavior::Trigger),
        );
        let (_, player) = spawn(&mut world, &mut entities, Body::rect(10.0, 10.0).with_position(Vec2::new(5.0, 5.0)));

        world.update(0.0).unwrap();
        assert_eq!(world.body(player).unwrap().position, Vec2::new(5.0, 5.0));
        assert!(world.body(player).unwrap().collisions().all.contains(&zone));
        assert!(world.body(zone).unwrap().collisions().all.contains(&player));
    }

    #[test]
    fn test_raycast_hits_wall_group() {
        let mut world = world(0.0);
        let mut entities = Entities::new();
        let (wall_entity, wall) = spawn(
            &mut world,
            &mut entities,
            Body::rect(10.0, 10.0).with_position(Vec2::new(50.0, 0.0)).with_mass(0.0),
        );
        entities.add_group(wall_entity, "wall");

        let hits = world.raycast(&RaycastQuery::new(Vec2::ZERO, 0.0, 100.0, "wall"), &entities);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].body, wall);
        assert_eq!(hits[0].entity, wall_entity);
        assert_eq!(hits[0].point.x, 45.0);
        assert_eq!(hits[0].point.y, 0.0);
    }

    #[test]
    fn test_raycast_group_filter_and_misuse() {
        let mut world = world(0.0);
        let mut entities = Entities::new();
        let (wall_entity, _) = spawn(
            &mut world,
            &mut entities,
            Body::rect(10.0, 10.0).with_position(Vec2::new(50.0, 0.0)).with_mass(0.0),
        );
        entities.add_group(wall_entity, "wall");

        let miss = |query: RaycastQuery| world.raycast(&query, &entities).is_empty();
        assert!(miss(RaycastQuery::new(Vec2::ZERO, 0.0, 100.0, "enemy")));
        assert!(miss(RaycastQuery::new(Vec2::ZERO, 0.0, 100.0, "")));
        assert!(miss(RaycastQuery::new(Vec2::ZERO, 0.0, 100.0, "   ")));
        assert!(miss(RaycastQuery::new(Vec2::ZERO, 0.0, 0.0, "wall")));
        assert!(!miss(RaycastQuery::new(Vec2::ZERO, 0.0, 100.0, "enemy wall")));
    }

    #[test]
    fn test_raycast_nearest() {
        let mut world = world(0.0);
        let mut entities = Entities::new();
        let (far_entity, _) = spawn(
            &mut world,
            &mut entities,
            Body::rect(10.0, 10.0).with_position(Vec2::new(80.0, 0.0)).with_mass(0.0),
        );
        let (near_entity, near) = spawn(
            &mut world,
            &mut entities,
            Body::rect(10.0, 10.0).with_position(Vec2::new(30.0, 0.0)).with_mass(0.0),
        );
        entities.add_group(far_entity, "wall");
        entities.add_group(near_entity, "wall");

        let query = RaycastQuery::new(Vec2::ZERO, 0.0, 100.0, "wall");
        assert_eq!(world.raycast(&query, &entities).len(), 2);
        let nearest = world.raycast_nearest(&query, &entities).unwrap();
        assert_eq!(nearest.body, near);
        assert_eq!(nearest.point.x, 25.0);
    }

    #[test]
    fn test_distance_joint_in_world() {
        let mut world = world(0.0);
        let mut entities = Entities::new();
        let (_, a) = spawn(&mut world, &mut entities, Body::circle(1.0));
        let (_, b) = spawn(&mut world, &mut entities, Body::circle(1.0).with_position(Vec2::new(40.0, 0.0)));
        world.add_joint(Joint::distance(a, b, 20.0, 0.5).unwrap()).unwrap();

        for _ in 0..30 {
            world.update(1.0 / 60.0).unwrap();
        }
        let separation = (world.body(b).unwrap().position - world.body(a).unwrap().position).length();
        assert!((separation - 20.0).abs() < 1e-3);
    }

    #[test]
    fn test_add_joint_rejects_unknown_body() {
        let mut world = world(0.0);
        let mut entities = Entities::new();
        let (_, a) = spawn(&mut world, &mut entities, Body::circle(1.0));
        let joint = Joint::distance(a, BodyId(99), 5.0, 1.0).unwrap();
        assert!(matches!(world.add_joint(joint), Err(PhysicsError::UnknownBody(BodyId(99)))));
    }

    #[test]
    fn test_remove_body_releases_index_entry_and_joints() {
        let mut world = world(0.0);
        let mut entities = Entities::new();
        let (ea, a) = spawn(&mut world, &mut entities, Body::circle(1.0));
        let (_, b) = spawn(&mut world, &mut entities, Body::circle(1.0).with_position(Vec2::new(5.0, 0.0)));
        world.add_joint(Joint::distance(a, b, 5.0, 1.0).unwrap()).unwrap();
        world.update(1.0 / 60.0).unwrap();
        assert_eq!(world.index().len(), 2);

        let removed = world.remove_body(ea, a).unwrap();
        assert_eq!(removed.owner(), Some(ea));
        assert_eq!(world.index().len(), 1);
        assert!(world.controller(a).is_none());
        assert_eq!(world.joint_count(), 0);
        assert_eq!(world.body_count(), 1);
        assert!(matches!(world.remove_body(ea, a), Err(PhysicsError::UnknownBody(_))));

        world.update(1.0 / 60.0).unwrap();
        assert_eq!(world.index().len(), 1);
        assert!(world.find_nearby(b, Vec2::splat(50.0)).unwrap().is_empty());
    }

    #[test]
    fn test_remove_body_checks_owner() {
        let mut world = world(0.0);
        let mut entities = Entities::new();
        let (_, a) = spawn(&mut world, &mut entities, Body::circle(1.0));
        let stranger = entities.spawn(Vec2::ZERO);
        assert!(matches!(
            world.remove_body(stranger, a),
            Err(PhysicsError::OwnerMismatch { .. })
        ));
        assert_eq!(world.body_count(), 1);
    }

    #[test]
    fn test_find_nearby_excludes_self() {
        let mut world = world(0.0);
        let mut entities = Entities::new();
        let (_, a) = spawn(&mut world, &mut entities, Body::rect(2.0, 2.0));
        let (eb, _) = spawn(&mut world, &mut entities, Body::rect(2.0, 2.0).with_position(Vec2::new(6.0, 0.0)));
        spawn(&mut world, &mut entities, Body::rect(2.0, 2.0).with_position(Vec2::new(300.0, 0.0)));
        world.update(0.0).unwrap();

        assert_eq!(world.find_nearby(a, Vec2::splat(10.0)).unwrap(), vec![eb]);
        assert!(matches!(
            world.find_nearby(BodyId(42), Vec2::ONE),
            Err(PhysicsError::UnknownBody(_))
        ));
    }

    #[test]
    fn test_reindex_tracks_every_body() {
        let mut world = World::new(WorldParams::default().with_cell_limit(2)).unwrap();
        let mut entities = Entities::new();
        for i in 0..12 {
            let x = (i % 4) as f32 * 300.0 - 450.0;
            let y = (i / 4) as f32 * 300.0 - 300.0;
            spawn(
                &mut world,
                &mut entities,
                Body::rect(5.0, 5.0).with_position(Vec2::new(x, y)).with_velocity(Vec2::new(10.0, 0.0)),
            );
        }
        world.update(1.0).unwrap();
        assert_eq!(world.index().len(), 12);
        assert!(world.index().node_count() > 1);
        for (id, body) in world.bodies() {
            let controller = world.controller(id).unwrap();
            let client = world.index().client(controller.client()).unwrap();
            assert_eq!(client.position, body.position);
        }
    }

    #[test]
    fn test_reindex_of_overlapping_giants_stays_small() {
        let mut params = WorldParams::default().with_cell_limit(1);
        params.cell_dimension = crate::config::CellDimension { width: 2.0, height: 2.0 };
        assert_eq!(params.max_tree_depth(), 10);
        let mut world = World::new(params).unwrap();
        let mut entities = Entities::new();
        for offset in [0.0, 5.0] {
            spawn(
                &mut world,
                &mut entities,
                Body::rect(1500.0, 1500.0)
                    .with_position(Vec2::splat(offset))
                    .with_mass(0.0)
                    .with_behavior(Behavior::Trigger),
            );
        }

        world.update(1.0 / 120.0).unwrap();
        assert_eq!(world.index().len(), 2);
        assert_eq!(world.index().node_count(), 1);
    }

    #[test]
    fn test_resized_body_reindexed_with_new_extent() {
        let mut world = world(0.0);
        let mut entities = Entities::new();
        let (_, a) = spawn(&mut world, &mut entities, Body::rect(2.0, 2.0));
        world.update(0.0).unwrap();
        world
            .body_mut(a)
            .unwrap()
            .resize(crate::physics::body::Shape::Rect { width: 8.0, height: 4.0 })
            .unwrap();
        world.update(0.0).unwrap();
        let client = world.index().client(world.controller(a).unwrap().client()).unwrap();
        assert_eq!(client.size, Vec2::new(8.0, 4.0));
    }

    #[test]
    fn test_failed_step_leaves_world_untouched() {
        let mut world = world(10.0);
        let mut entities = Entities::new();
        let (_, a) = spawn(&mut world, &mut entities, Body::rect(2.0, 2.0));

        assert!(matches!(world.update(f32::NAN), Err(PhysicsError::InvalidTimestep(_))));
        assert!(world.update(-1.0).is_err());

        world.controllers.remove(&a);
        assert!(matches!(world.update(0.1), Err(PhysicsError::MissingController(_))));
        assert_eq!(world.body(a).unwrap().position, Vec2::ZERO);
        assert_eq!(world.body(a).unwrap().velocity, Vec2::ZERO);
        assert_eq!(world.step_count(), 0);
    }

    #[test]
    fn test_stack_settles_on_floor() {
        let mut world = World::new(WorldParams::default().with_gravity(500.0).with_relaxation_count(6)).unwrap();
        let mut entities = Entities::new();
        let (_, floor) = spawn(
            &mut world,
            &mut entities,
            Body::rect(400.0, 20.0).with_position(Vec2::new(0.0, 200.0)).with_mass(0.0),
        );
        let (_, lower) = spawn(&mut world, &mut entities, Body::rect(20.0, 20.0).with_position(Vec2::new(0.0, 170.0)));
        let (_, upper) = spawn(&mut world, &mut entities, Body::rect(20.0, 20.0).with_position(Vec2::new(0.0, 140.0)));

        for _ in 0..240 {
            world.update(1.0 / 120.0).unwrap();
        }
        let lower_body = world.body(lower).unwrap();
        let upper_body = world.body(upper).unwrap();
        assert!(lower_body.collisions().bottom.contains(&floor));
        assert!(upper_body.collisions().bottom.contains(&lower));
        // Resting centers: floor top is 190, each box is 20 tall
        assert!((lower_body.position.y - 180.0).abs() < 0.5);
        assert!((upper_body.position.y - 160.0).abs() < 1.0);
    }
}

//! Quadrelax demo
//!
//! Drops a deterministic scatter of crates onto a static floor, lets them
//! settle, then reports resting contacts and a hit-scan across the pile.

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Quadrelax demo starting...");

    if let Err(err) = demo::run(0x5eed) {
        log::error!("demo failed: {err}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The library is driven by the host page on wasm; nothing to run here
}

#[cfg(not(target_arch = "wasm32"))]
mod demo {
    use glam::Vec2;
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg32;

    use quadrelax::consts::SIM_DT;
    use quadrelax::{Body, Entities, PhysicsResult, RaycastQuery, World, WorldParams};

    const CRATE_COUNT: usize = 40;
    const SIM_SECONDS: f32 = 4.0;

    pub fn run(seed: u64) -> PhysicsResult<()> {
        let params = WorldParams::default()
            .with_gravity(600.0)
            .with_relaxation_count(4)
            .with_cell_limit(6);
        let mut world = World::new(params)?;
        let mut entities = Entities::new();
        let mut rng = Pcg32::seed_from_u64(seed);

        let floor_entity = entities.spawn(Vec2::new(0.0, 300.0));
        entities.add_group(floor_entity, "terrain");
        let floor = world.add_body(
            floor_entity,
            Body::rect(800.0, 40.0)
                .with_position(Vec2::new(0.0, 300.0))
                .with_mass(0.0),
        )?;

        for i in 0..CRATE_COUNT {
            let position = Vec2::new(
                rng.random_range(-300.0..300.0),
                rng.random_range(-400.0..200.0),
            );
            let size = rng.random_range(12.0..36.0);
            let entity = entities.spawn(position);
            entities.add_group(entity, if i % 2 == 0 { "crate" } else { "barrel" });
            world.add_body(
                entity,
                Body::rect(size, size)
                    .with_position(position)
                    .with_mass(size * size / 100.0),
            )?;
        }

        let steps = (SIM_SECONDS / SIM_DT) as u32;
        for _ in 0..steps {
            world.update(SIM_DT)?;
        }
        entities.sync_from_world(&world);

        let resting = world
            .bodies()
            .filter(|(_, body)| body.collisions().bottom.contains(&floor))
            .count();
        log::info!(
            "after {} steps: {} of {} crates resting on the floor, index has {} nodes",
            world.step_count(),
            resting,
            CRATE_COUNT,
            world.index().node_count()
        );

        let query = RaycastQuery::new(Vec2::new(-400.0, 270.0), 0.0, 800.0, "crate barrel");
        match world.raycast_nearest(&query, &entities) {
            Some(hit) => log::info!(
                "hit-scan from the left wall hits {} at ({:.1}, {:.1})",
                hit.entity,
                hit.point.x,
                hit.point.y
            ),
            None => log::info!("hit-scan from the left wall hits nothing"),
        }
        Ok(())
    }
}

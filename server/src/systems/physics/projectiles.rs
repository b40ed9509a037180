// skystrike/server/src/systems/physics/projectiles.rs
use tracing::trace;

use crate::concurrent::spatial_index::SpatialIndex;
use crate::core::config::SimConfig;
use crate::core::types::EntityId;
use crate::world::hitbox::{HitboxCache, HullKind};
use crate::world::store::World;

use super::sub_steps;

/// Advance every live missile by the tick's frame factor: accelerate along
/// the spawn heading, clamp to the type's speed ceiling, integrate position
/// and accumulate distance traveled. Range and world-bounds termination are
/// enforced exactly once per tick on the compensated distance delta — never
/// skipped under frame-skip compensation. Returns the despawned ids, already
/// deregistered from the world store and spatial index.
pub fn update_missiles(
    world: &mut World,
    spatial: &mut SpatialIndex,
    hitboxes: &HitboxCache,
    config: &SimConfig,
    frame_factor: f64,
) -> Vec<EntityId> {
    let steps = sub_steps(frame_factor);
    let bounds = &config.bounds;
    let mut despawned = Vec::new();

    for id in world.missiles.ids() {
        let Some(missile) = world.missiles.get_mut(id) else { continue };
        let physics = config.missile(missile.kind);

        for &step in &steps {
            let old_velocity = missile.vel.v;
            missile.vel.v = missile.vel.v + missile.rot.heading().scaled(physics.accel * step);
            missile.vel.clamp(physics.max_speed);
            let displacement = (old_velocity + missile.vel.v).scaled(0.5 * step);
            missile.pos = missile.pos + displacement;
            missile.distance += displacement.length();
        }

        let out_of_bounds = missile.pos.x < bounds.min_x
            || missile.pos.x > bounds.max_x
            || missile.pos.y < bounds.min_y
            || missile.pos.y > bounds.max_y;

        if missile.exceeded_range(physics) || out_of_bounds {
            missile.alive = false;
            despawned.push(id);
            continue;
        }

        let hull = HullKind::Missile(missile.kind);
        let aabb = hitboxes.aabb(hull, missile.rot.bucket(), missile.pos);
        let (pos, sin, cos) = (missile.pos, missile.rot.sin(), missile.rot.cos());
        spatial.set_state(id, pos, sin, cos, aabb);
    }

    // Deferred removal batch: never while iterating the table above.
    for id in &despawned {
        world.remove_missile(*id);
        spatial.remove(*id);
        trace!("Missile {} despawned (range/bounds)", id);
    }
    despawned
}

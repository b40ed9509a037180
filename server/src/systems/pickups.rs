// skystrike/server/src/systems/pickups.rs
use rand::Rng;
use tracing::debug;

use crate::concurrent::spatial_index::{ColliderKind, SpatialIndex, SpatialShape};
use crate::concurrent::static_index::{StaticIndex, StaticKind};
use crate::core::config::SimConfig;
use crate::core::constants::{PICKUP_LIFETIME_FRAMES, PICKUP_RADIUS};
use crate::core::types::{Aabb, PickupKind, Vec2};
use crate::entities::mob::Pickup;
use crate::world::hitbox::HullKind;
use crate::world::map::MapGenerator;
use crate::world::store::World;

const PLACEMENT_ATTEMPTS: usize = 8;

/// Keeps the configured number of powerup crates alive, scattering
/// replacements at randomized positions clear of terrain. Each crate carries
/// a lifetime; expiry is observed by the viewport scan and despawned there.
pub fn maintain(
    world: &mut World,
    spatial: &mut SpatialIndex,
    statics: &StaticIndex,
    config: &SimConfig,
    rng: &mut impl Rng,
) {
    let active = world.pickups.iter().filter(|(_, pickup)| pickup.active).count();
    if active >= config.pickup_target_count {
        return;
    }
    let deficit = config.pickup_target_count - active;

    for _ in 0..deficit {
        let Some(pos) = clear_position(statics, rng) else { continue };
        let kind = match rng.gen_range(0..3) {
            0 => PickupKind::Upgrade,
            1 => PickupKind::Shield,
            _ => PickupKind::Inferno,
        };
        let id = world.allocate_id();
        let expires_at = world.sim_frames + PICKUP_LIFETIME_FRAMES;
        // World store and spatial index registration in the same step.
        world.insert_pickup(Pickup::new(id, kind, pos, expires_at));
        spatial.insert(SpatialShape {
            entity: id,
            kind: ColliderKind::Pickup,
            hull: HullKind::Crate,
            pos,
            sin: 0.0,
            cos: 1.0,
            aabb: Aabb::around(pos, PICKUP_RADIUS, PICKUP_RADIUS),
            team: 0,
            owner: None,
            active: true,
        });
        debug!("Scattered {:?} crate {} at ({:.0}, {:.0})", kind, id, pos.x, pos.y);
    }
}

/// Random position not overlapping a mountain. Gives up after a few attempts
/// and lets the next tick retry.
fn clear_position(statics: &StaticIndex, rng: &mut impl Rng) -> Option<Vec2> {
    for _ in 0..PLACEMENT_ATTEMPTS {
        let pos = MapGenerator::scatter_position(rng);
        let probe = Aabb::around(pos, PICKUP_RADIUS, PICKUP_RADIUS);
        let obstructed = statics.query_aabb(&probe).iter().any(|shape| {
            shape.kind == StaticKind::Mountain
                && (shape.pos - pos).length() < shape.radius + PICKUP_RADIUS
        });
        if !obstructed {
            return Some(pos);
        }
    }
    None
}

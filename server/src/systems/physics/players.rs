// skystrike/server/src/systems/physics/players.rs
use tracing::trace;

use crate::concurrent::spatial_index::{ColliderKind, SpatialIndex, SpatialShape};
use crate::core::config::{FireSlot, SimConfig};
use crate::core::constants::{MIN_SHOT_INTERVAL_FRAMES, MISSILE_INHERIT_FACTOR};
use crate::core::types::{
    EntityId, MissileKind, PlayerId, Rotation, SpecialKind, Team, Vec2,
};
use crate::entities::projectile::Missile;
use crate::world::hitbox::{HitboxCache, HullKind};
use crate::world::store::World;

use super::sub_steps;

/// Missile spawned by this tick's fire resolution. The instance pre-seeds
/// each one into the firing player's broadcast state before the viewport
/// scan runs.
#[derive(Debug, Clone, Copy)]
pub struct FiredMissile {
    pub id: EntityId,
    pub owner: PlayerId,
}

struct FireRequest {
    owner: PlayerId,
    team: Team,
    missile: MissileKind,
    slots: Vec<FireSlot>,
    pos: Vec2,
    radians: f32,
    sin: f32,
    cos: f32,
    forward_speed: f32,
    spawn_frame: f64,
}

/// Advance every alive player by the tick's frame factor: regeneration, ship
/// specials, rotation and thrust input, speed clamp, trapezoidal position
/// integration, world-bounds clamp, bucket-gated hitbox refresh, and weapon
/// fire. Spawned missiles are registered into the world store and spatial
/// index in the same step.
pub fn update_players(
    world: &mut World,
    spatial: &mut SpatialIndex,
    hitboxes: &HitboxCache,
    config: &SimConfig,
    frame_factor: f64,
) -> Vec<FiredMissile> {
    let steps = sub_steps(frame_factor);
    let base_frame = world.sim_frames;
    let bounds = &config.bounds;
    let mut requests: Vec<FireRequest> = Vec::new();

    for id in world.players.ids() {
        let Some(player) = world.players.get_mut(id) else { continue };
        if !player.alive {
            player.powerups.expire(base_frame);
            continue;
        }
        let ship = config.ship(player.ship);
        let strafing = ship.special == SpecialKind::Strafe && player.keys.special;
        let mut elapsed_in_tick = 0.0f64;

        for &step in &steps {
            elapsed_in_tick += step as f64;
            let now = base_frame + elapsed_in_tick;

            player.powerups.expire(now);
            player.regen(ship, step);

            // Ship special abilities, each with its own energy cost and
            // cooldown gate.
            match ship.special {
                SpecialKind::Boost => {
                    let cost = ship.special_energy * step;
                    if player.keys.special && player.energy > cost {
                        player.energy -= cost;
                        player.boosting = true;
                    } else {
                        player.boosting = false;
                    }
                }
                SpecialKind::Repel => {
                    if player.keys.special
                        && player.energy >= ship.special_energy
                        && now - player.last_special_frame >= ship.special_cooldown_frames
                    {
                        player.energy -= ship.special_energy;
                        player.last_special_frame = now;
                        player.repel_pending = true;
                    }
                }
                SpecialKind::Stealth => {
                    if player.keys.special
                        && !player.stealthed
                        && player.energy >= ship.special_energy
                        && now - player.last_special_frame >= ship.special_cooldown_frames
                    {
                        player.energy -= ship.special_energy;
                        player.last_special_frame = now;
                        player.stealthed = true;
                    }
                }
                SpecialKind::Strafe | SpecialKind::Barrage => {}
            }

            // Rotation input. Strafing ships slide instead of turning.
            if !strafing {
                if player.keys.left {
                    player.rot.turn(-ship.turn * step);
                }
                if player.keys.right {
                    player.rot.turn(ship.turn * step);
                }
            }

            // Acceleration from input direction relative to current rotation.
            let mut accel = Vec2::zero();
            if player.keys.up {
                accel = accel + player.rot.heading().scaled(ship.accel);
            }
            if player.keys.down {
                accel = accel - player.rot.heading().scaled(ship.accel);
            }
            if strafing {
                let side = Vec2::new(player.rot.cos(), player.rot.sin());
                if player.keys.left {
                    accel = accel - side.scaled(ship.accel);
                }
                if player.keys.right {
                    accel = accel + side.scaled(ship.accel);
                }
            }

            let old_velocity = player.vel.v;
            if accel == Vec2::zero() {
                // No thrust: drag toward rest.
                player.vel.v = player.vel.v.scaled((1.0 - ship.brake * step).max(0.0));
            } else {
                let boost = if player.boosting { ship.boost_factor } else { 1.0 };
                player.vel.v = player.vel.v + accel.scaled(boost * step);
            }
            let max_speed = player.max_speed(ship);
            player.vel.clamp(max_speed);

            // Trapezoidal integration, then world-bounds clamp.
            let displacement = (old_velocity + player.vel.v).scaled(0.5 * step);
            player.pos = player.pos + displacement;
            player.pos.x = player.pos.x.clamp(bounds.min_x, bounds.max_x);
            player.pos.y = player.pos.y.clamp(bounds.min_y, bounds.max_y);

            // Weapon fire, gated by energy and simulation-time shot delay.
            let barrage = ship.special == SpecialKind::Barrage && player.keys.special;
            if player.keys.fire {
                let (slots, cost) = if barrage {
                    (&ship.inferno_slots, ship.special_energy)
                } else if player.powerups.inferno_active(now) {
                    (&ship.inferno_slots, ship.fire_energy)
                } else {
                    (&ship.slots, ship.fire_energy)
                };
                let delay = ship.fire_delay_frames.max(MIN_SHOT_INTERVAL_FRAMES);
                if player.energy >= cost && now - player.last_fire_frame >= delay {
                    player.energy -= cost;
                    player.last_fire_frame = now;
                    player.stealthed = false;
                    let forward_speed = player.vel.v.dot(player.rot.heading()).max(0.0);
                    requests.push(FireRequest {
                        owner: player.id,
                        team: player.team,
                        missile: ship.missile,
                        slots: slots.clone(),
                        pos: player.pos,
                        radians: player.rot.radians(),
                        sin: player.rot.sin(),
                        cos: player.rot.cos(),
                        forward_speed,
                        spawn_frame: now,
                    });
                }
            }
        }

        // Hitbox refresh: the trig-derived extents are cache lookups keyed by
        // the rotation bucket; only the bucket marker needs maintaining.
        let bucket = player.rot.bucket();
        if bucket != player.hitbox_bucket {
            player.hitbox_bucket = bucket;
        }
        let aabb = hitboxes.aabb(HullKind::Ship(player.ship), bucket, player.pos);
        let (pos, sin, cos) = (player.pos, player.rot.sin(), player.rot.cos());
        spatial.set_state(id, pos, sin, cos, aabb);
    }

    spawn_missiles(world, spatial, hitboxes, config, requests)
}

fn spawn_missiles(
    world: &mut World,
    spatial: &mut SpatialIndex,
    hitboxes: &HitboxCache,
    config: &SimConfig,
    requests: Vec<FireRequest>,
) -> Vec<FiredMissile> {
    let mut fired = Vec::new();
    for request in requests {
        let physics = config.missile(request.missile);
        for slot in &request.slots {
            let id = world.allocate_id();
            let pos = request.pos + slot.offset().rotated(request.sin, request.cos);
            let rot = Rotation::new(request.radians + slot.angle);
            let speed = physics.base_speed + MISSILE_INHERIT_FACTOR * request.forward_speed;
            let missile = Missile::new(
                id,
                request.missile,
                request.owner,
                request.team,
                pos,
                rot,
                speed,
                request.spawn_frame,
            );
            let hull = HullKind::Missile(request.missile);
            let aabb = hitboxes.aabb(hull, rot.bucket(), pos);
            spatial.insert(SpatialShape {
                entity: id,
                kind: ColliderKind::Missile,
                hull,
                pos,
                sin: rot.sin(),
                cos: rot.cos(),
                aabb,
                team: request.team,
                owner: Some(request.owner),
                active: true,
            });
            world.insert_missile(missile);
            fired.push(FiredMissile { id, owner: request.owner });
        }
        trace!(
            "Player {:?} fired {} missile(s) at frame {:.2}",
            request.owner,
            request.slots.len(),
            request.spawn_frame
        );
    }
    fired
}

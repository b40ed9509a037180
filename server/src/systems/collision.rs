// skystrike/server/src/systems/collision.rs
//
// Narrow-phase collision resolution over the broad-phase candidates, in five
// strictly ordered phases per tick:
//   1. rebuild the broad-phase buckets;
//   2. viewport scans (expired pickups observed but only batched);
//   3. apply the batched pickup despawns;
//   4. per alive player: repel first, then flag zones, flags, mountains,
//      pickups and incoming missiles, stopping early at minimum health;
//   5. missile-vs-mountain for the missiles that survived phase 4.
// Several invariants (no double-death, deferred despawn) depend on this
// order; do not reorder.
use tracing::trace;

use crate::concurrent::spatial_index::{ColliderKind, SpatialIndex, SpatialShape};
use crate::concurrent::static_index::{StaticIndex, StaticKind};
use crate::concurrent::event_bus::EventBus;
use crate::core::config::SimConfig;
use crate::core::constants::{
    BOUNCE_FACTOR, INFERNO_DURATION_FRAMES, KILL_SCORE, REPEL_PLAYER_SPEED, REPEL_RADIUS,
    SHIELD_DURATION_FRAMES, UPGRADE_SCORE, UPGRADE_SPEED_MAX_LEVEL,
};
use crate::core::types::{Aabb, EntityId, GameEvent, PickupKind, PlayerId, Vec2};
use crate::systems::viewport::ViewportManager;
use crate::world::hitbox::{forward_circle, hull, HitboxCache};
use crate::world::store::World;

pub fn run(
    world: &mut World,
    spatial: &mut SpatialIndex,
    statics: &StaticIndex,
    viewports: &mut ViewportManager,
    events: &mut EventBus,
    hitboxes: &HitboxCache,
    config: &SimConfig,
) {
    // Phase 1: rebuild broad-phase buckets from the post-physics AABBs.
    spatial.update();

    // Phase 2: per-viewport visibility. Read-only; expiry only observed.
    let expired_pickups = viewports.scan(world, spatial);

    // Phase 3: apply the batched despawns after the scan completes.
    for id in expired_pickups {
        despawn_pickup(world, spatial, viewports, id);
    }

    // Phase 4: per-player resolution. Liveness is re-checked from the store
    // at each iteration; earlier kills in the same pass make this a no-op.
    for raw in world.players.ids() {
        let pid = PlayerId(raw);
        let alive = world.player(pid).map(|p| p.alive).unwrap_or(false);
        if !alive {
            continue;
        }
        let repel = world.player(pid).map(|p| p.repel_pending).unwrap_or(false);
        if repel {
            if let Some(player) = world.player_mut(pid) {
                player.repel_pending = false;
            }
            apply_repel(world, spatial, pid);
        }
        resolve_player(world, spatial, statics, viewports, events, hitboxes, config, pid);
    }

    // Phase 5: terrain pass for surviving missiles.
    resolve_missile_terrain(world, spatial, statics, viewports);
}

/// Push every nearby enemy player and missile away from the caster. Velocity
/// is replaced outright; positions correct themselves over the next ticks.
fn apply_repel(world: &mut World, spatial: &mut SpatialIndex, caster: PlayerId) {
    let Some(player) = world.player(caster) else { return };
    let caster_pos = player.pos;
    let caster_team = player.team;

    for target in spatial.query_radius(caster_pos, REPEL_RADIUS) {
        if target == caster.entity() {
            continue;
        }
        let Some(shape) = spatial.shape(target) else { continue };
        if shape.team == caster_team {
            continue;
        }
        let kind = shape.kind;
        let shape_pos = shape.pos;
        let away = push_direction(shape_pos, caster_pos);
        match kind {
            ColliderKind::Player => {
                if let Some(other) = world.players.get_mut(target) {
                    if other.alive {
                        other.vel.v = away.scaled(REPEL_PLAYER_SPEED);
                        other.vel.at_max = false;
                        other.vel.stalled = false;
                    }
                }
            }
            ColliderKind::Missile => {
                let mut redirected = None;
                if let Some(missile) = world.missiles.get_mut(target) {
                    let speed = missile.vel.speed().max(1.0);
                    missile.vel.v = away.scaled(speed);
                    missile.rot.set(away.x.atan2(-away.y));
                    redirected = Some((missile.pos, missile.rot.sin(), missile.rot.cos()));
                }
                if let Some((pos, sin, cos)) = redirected {
                    let aabb = shape_aabb_unchanged(spatial, target);
                    spatial.set_state(target, pos, sin, cos, aabb);
                }
            }
            _ => {}
        }
    }
    trace!("Repel discharged by {:?}", caster);
}

// The AABB of a redirected missile is rotation-bucket dependent; reuse the
// stored one (near-symmetric hulls make the error sub-pixel) rather than
// threading the cache through.
fn shape_aabb_unchanged(spatial: &SpatialIndex, entity: EntityId) -> Aabb {
    spatial
        .shape(entity)
        .map(|shape| shape.aabb)
        .unwrap_or_else(|| Aabb::new(0.0, 0.0, 0.0, 0.0))
}

#[allow(clippy::too_many_arguments)]
fn resolve_player(
    world: &mut World,
    spatial: &mut SpatialIndex,
    statics: &StaticIndex,
    viewports: &mut ViewportManager,
    events: &mut EventBus,
    hitboxes: &HitboxCache,
    config: &SimConfig,
    pid: PlayerId,
) {
    let entity = pid.entity();
    let Some(mut p_shape) = spatial.shape(entity).cloned() else { return };
    if !p_shape.active {
        return;
    }
    let (zone_prev, flag_prev, rot_bucket) = match world.player(pid) {
        Some(p) => (p.in_zone, p.touching_flag, p.rot.bucket()),
        None => return,
    };
    let p_team = p_shape.team;

    let static_hits = statics.query_aabb(&p_shape.aabb);

    // Flag zones: circle-vs-rect with the clamped-point test, reported once
    // per enter/leave.
    let mut zone_now: Option<EntityId> = None;
    for shape in &static_hits {
        if shape.kind == StaticKind::Zone && hull_overlaps_rect(&p_shape, &shape.aabb) {
            zone_now = Some(shape.id);
            break;
        }
    }
    if zone_now != zone_prev {
        if let Some(old_zone) = zone_prev {
            events.push(GameEvent::ZoneCross {
                player: pid,
                zone: old_zone,
                entered: false,
                position: p_shape.pos,
            });
        }
        if let Some(new_zone) = zone_now {
            events.push(GameEvent::ZoneCross {
                player: pid,
                zone: new_zone,
                entered: true,
                position: p_shape.pos,
            });
        }
        if let Some(player) = world.player_mut(pid) {
            player.in_zone = zone_now;
        }
    }

    let candidates = spatial.query_aabb(&p_shape.aabb);

    // Flags: reported on contact start; the core never consumes the flag.
    let mut flag_now: Option<EntityId> = None;
    for candidate in &candidates {
        let Some(shape) = spatial.shape(*candidate) else { continue };
        if shape.kind == ColliderKind::Flag && hulls_overlap(&p_shape, shape) {
            flag_now = Some(*candidate);
            break;
        }
    }
    if flag_now != flag_prev {
        if let Some(flag) = flag_now {
            events.push(GameEvent::Pickup {
                player: pid,
                entity: flag,
                kind: PickupKind::Flag,
                position: p_shape.pos,
            });
        }
        if let Some(player) = world.player_mut(pid) {
            player.touching_flag = flag_now;
        }
    }

    // Mountains: reflect velocity off the contact normal and separate.
    for shape in &static_hits {
        if shape.kind != StaticKind::Mountain {
            continue;
        }
        let mut deepest = 0.0f32;
        for circle in hull(p_shape.hull) {
            let center = circle.world_center(p_shape.pos, p_shape.sin, p_shape.cos);
            let distance = (center - shape.pos).length();
            let penetration = (circle.radius + shape.radius) - distance;
            deepest = deepest.max(penetration);
        }
        if deepest <= 0.0 {
            continue;
        }
        let normal = push_direction(p_shape.pos, shape.pos);
        if let Some(player) = world.player_mut(pid) {
            let approach = player.vel.v.dot(normal);
            if approach < 0.0 {
                player.vel.v =
                    (player.vel.v - normal.scaled(2.0 * approach)).scaled(BOUNCE_FACTOR);
            }
            player.pos = player.pos + normal.scaled(deepest);
            player.stealthed = false;
            p_shape.pos = player.pos;
        }
        let aabb = hitboxes.aabb(p_shape.hull, rot_bucket, p_shape.pos);
        p_shape.aabb = aabb;
        spatial.set_state(entity, p_shape.pos, p_shape.sin, p_shape.cos, aabb);
        events.push(GameEvent::Bounce { player: pid, obstacle: shape.id, position: p_shape.pos });
    }

    // Pickups: inactive the instant collection is observed; other observers
    // reconcile via the despawn broadcast.
    for candidate in &candidates {
        let is_pickup = spatial
            .shape(*candidate)
            .map(|shape| shape.kind == ColliderKind::Pickup)
            .unwrap_or(false);
        if !is_pickup {
            continue;
        }
        let Some(pickup_shape) = spatial.shape(*candidate).cloned() else { continue };
        let Some(pickup) = world.pickups.get(*candidate) else { continue };
        if !pickup.active || !hulls_overlap(&p_shape, &pickup_shape) {
            continue;
        }
        let kind = pickup.kind;
        let position = pickup.pos;
        if let Some(stored) = world.pickups.get_mut(*candidate) {
            stored.active = false;
        }
        let now = world.sim_frames;
        if let Some(player) = world.player_mut(pid) {
            match kind {
                PickupKind::Upgrade => {
                    player.upgrades.speed = (player.upgrades.speed + 1).min(UPGRADE_SPEED_MAX_LEVEL);
                    player.score += UPGRADE_SCORE;
                }
                PickupKind::Shield => {
                    player.powerups.shield_until = Some(now + SHIELD_DURATION_FRAMES);
                }
                PickupKind::Inferno => {
                    player.powerups.inferno_until = Some(now + INFERNO_DURATION_FRAMES);
                }
                PickupKind::Flag => {}
            }
        }
        events.push(GameEvent::Pickup { player: pid, entity: *candidate, kind, position });
        despawn_pickup(world, spatial, viewports, *candidate);
    }

    // Incoming missiles. Same-team hits short-circuit off the shape's cached
    // team; a player at minimum health processes no further projectiles.
    for candidate in &candidates {
        let Some(shape) = spatial.shape(*candidate) else { continue };
        if shape.kind != ColliderKind::Missile {
            continue;
        }
        if shape.team == p_team {
            continue;
        }
        if shape.owner == Some(pid) {
            continue;
        }
        let missile_shape = shape.clone();
        // Guarded lookup: the missile may already be gone from an
        // earlier-in-tick event.
        if !world.missile_ids.contains(candidate) {
            continue;
        }
        if !hulls_overlap(&p_shape, &missile_shape) {
            continue;
        }
        let (missile_kind, missile_owner, missile_pos) = match world.missiles.get(*candidate) {
            Some(m) => (m.kind, m.owner, m.pos),
            None => continue,
        };
        let damage = config.missile(missile_kind).damage;
        let now = world.sim_frames;
        let died = match world.player_mut(pid) {
            Some(player) => player.apply_damage(damage, now),
            None => continue,
        };
        events.push(GameEvent::Hit {
            missile: *candidate,
            target: pid,
            owner: missile_owner,
            damage,
            position: missile_pos,
        });
        world.remove_missile(*candidate);
        spatial.remove(*candidate);
        viewports.broadcast_despawn(*candidate);

        if died {
            if let Some(killer) = world.player_mut(missile_owner) {
                killer.kills += 1;
                killer.score += KILL_SCORE;
            }
            spatial.set_active(entity, false);
            events.push(GameEvent::Kill {
                victim: pid,
                killer: missile_owner,
                position: p_shape.pos,
            });
            break;
        }
    }
}

/// Phase 5: missiles that survived the player pass against mountains, tested
/// with the forward hit-circle only. This is an intentional
/// accuracy/performance trade-off, valid only while missile speed stays below
/// the map's scale-factor ceiling (enforced at startup warmup by
/// `SimConfig::validate_against_scale`).
fn resolve_missile_terrain(
    world: &mut World,
    spatial: &mut SpatialIndex,
    statics: &StaticIndex,
    viewports: &mut ViewportManager,
) {
    for id in world.missiles.ids() {
        let Some(shape) = spatial.shape(id).cloned() else { continue };
        let nose = forward_circle(hull(shape.hull));
        let center = nose.world_center(shape.pos, shape.sin, shape.cos);
        let probe = Aabb::around(center, nose.radius, nose.radius);

        let mut struck = false;
        for static_shape in statics.query_aabb(&probe) {
            if static_shape.kind == StaticKind::Mountain
                && circles_overlap(center, nose.radius, static_shape.pos, static_shape.radius)
            {
                struck = true;
                break;
            }
        }
        if struck {
            world.remove_missile(id);
            spatial.remove(id);
            viewports.broadcast_despawn(id);
        }
    }
}

fn despawn_pickup(
    world: &mut World,
    spatial: &mut SpatialIndex,
    viewports: &mut ViewportManager,
    id: EntityId,
) {
    if let Some(pickup) = world.pickups.get_mut(id) {
        pickup.active = false;
    } else {
        return;
    }
    world.remove_pickup(id);
    spatial.remove(id);
    viewports.broadcast_despawn(id);
}

fn push_direction(from_target: Vec2, from_source: Vec2) -> Vec2 {
    let direction = (from_target - from_source).normalized();
    if direction == Vec2::zero() {
        Vec2::new(0.0, -1.0)
    } else {
        direction
    }
}

fn circles_overlap(a: Vec2, ra: f32, b: Vec2, rb: f32) -> bool {
    let summed = ra + rb;
    (a - b).length_sq() <= summed * summed
}

/// Multi-circle hull vs multi-circle hull, summed-radius test per pair.
pub fn hulls_overlap(a: &SpatialShape, b: &SpatialShape) -> bool {
    let hull_a = hull(a.hull);
    let hull_b = hull(b.hull);
    for circle_a in hull_a {
        let center_a = circle_a.world_center(a.pos, a.sin, a.cos);
        for circle_b in hull_b {
            let center_b = circle_b.world_center(b.pos, b.sin, b.cos);
            if circles_overlap(center_a, circle_a.radius, center_b, circle_b.radius) {
                return true;
            }
        }
    }
    false
}

/// Hull vs axis-aligned rectangle: clamped-point distance test per circle.
pub fn hull_overlaps_rect(shape: &SpatialShape, rect: &Aabb) -> bool {
    for circle in hull(shape.hull) {
        let center = circle.world_center(shape.pos, shape.sin, shape.cos);
        let closest_x = center.x.clamp(rect.min_x, rect.max_x);
        let closest_y = center.y.clamp(rect.min_y, rect.max_y);
        let dx = center.x - closest_x;
        let dy = center.y - closest_y;
        if dx * dx + dy * dy < circle.radius * circle.radius {
            return true;
        }
    }
    false
}

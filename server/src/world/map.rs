// skystrike/server/src/world/map.rs
use rand::Rng;

use crate::core::constants::*;
use crate::core::error::{SimError, SimResult};
use crate::core::types::{Aabb, Team, Vec2};
use crate::entities::mob::{Flag, FlagZone, Mountain};
use crate::world::store::World;

/// Builds the static arena geometry: mountain belts for cover, one capture
/// zone and flag per team, and the team spawn areas. Registered into the
/// world store once at startup; the static spatial index is built from the
/// same pass.
pub struct MapGenerator;

impl MapGenerator {
    /// Populate `world` with the standard arena and return the smallest
    /// mountain radius (the scale ceiling the missile tables are validated
    /// against).
    pub fn populate_standard(world: &mut World) -> SimResult<f32> {
        let mut min_radius = f32::MAX;

        for (x, y, radius) in Self::mountain_belt() {
            min_radius = min_radius.min(radius);
            let id = world.allocate_id();
            world.insert_mountain(Mountain { id, pos: Vec2::new(x, y), radius });
        }

        for (team, center) in Self::zone_centers() {
            let id = world.allocate_id();
            world.insert_zone(FlagZone {
                id,
                team,
                rect: Aabb::around(center, ZONE_HALF_WIDTH, ZONE_HALF_HEIGHT),
            });
            let flag_id = world.allocate_id();
            world.insert_flag(Flag { id: flag_id, team, pos: center });
        }

        if world.mountains.is_empty() {
            return Err(SimError::Map("standard arena produced no obstacles".into()));
        }
        Ok(min_radius)
    }

    /// Fixed mountain layout: a central ridge, two flanking arcs and scattered
    /// singles near each base approach. Radii stay well above every missile's
    /// per-frame travel so the forward-circle narrow phase holds.
    fn mountain_belt() -> Vec<(f32, f32, f32)> {
        let mut mountains = Vec::new();

        // Central ridge running north-south.
        for i in -3i32..=3 {
            let y = i as f32 * 900.0;
            mountains.push((i as f32 * 120.0, y, 180.0 + (i.abs() as f32) * 20.0));
        }

        // Flanking arcs midway to each base.
        let arc_radius = 5200.0;
        for i in 0..5 {
            let angle = (i as f32 - 2.0) * 0.35;
            mountains.push((-arc_radius + angle.sin() * 900.0, angle.cos() * 2400.0 - 1200.0, 140.0));
            mountains.push((arc_radius - angle.sin() * 900.0, 1200.0 - angle.cos() * 2400.0, 140.0));
        }

        // Scattered singles near the base approaches.
        for (x, y) in [
            (-10500.0, -3000.0),
            (-10500.0, 3000.0),
            (10500.0, -3000.0),
            (10500.0, 3000.0),
            (-7000.0, 0.0),
            (7000.0, 0.0),
        ] {
            mountains.push((x, y, 220.0));
        }

        mountains
    }

    fn zone_centers() -> Vec<(Team, Vec2)> {
        vec![(1, Vec2::new(-13000.0, 0.0)), (2, Vec2::new(13000.0, 0.0))]
    }

    pub fn team_spawn_center(team: Team) -> Vec2 {
        match team {
            1 => Vec2::new(-12000.0, 0.0),
            2 => Vec2::new(12000.0, 0.0),
            _ => Vec2::zero(),
        }
    }

    /// Spawn position with a little scatter so simultaneous respawns do not
    /// stack on one point.
    pub fn spawn_position(team: Team, rng: &mut impl Rng) -> Vec2 {
        let center = Self::team_spawn_center(team);
        Vec2::new(
            center.x + rng.gen_range(-400.0..400.0),
            center.y + rng.gen_range(-400.0..400.0),
        )
    }

    /// Uniform position inside world bounds, padded away from the edges.
    /// Used by the pickup scatter.
    pub fn scatter_position(rng: &mut impl Rng) -> Vec2 {
        Vec2::new(
            rng.gen_range(WORLD_MIN_X + 600.0..WORLD_MAX_X - 600.0),
            rng.gen_range(WORLD_MIN_Y + 600.0..WORLD_MAX_Y - 600.0),
        )
    }
}

pub const ZONE_HALF_WIDTH: f32 = 200.0;
pub const ZONE_HALF_HEIGHT: f32 = 200.0;

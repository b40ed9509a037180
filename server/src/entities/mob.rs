// skystrike/server/src/entities/mob.rs
//
// Non-player simulated objects: powerup crates, static mountains, capture
// zones and flags. Mountains and zones never move; their spatial entries live
// in the static R-tree, not the per-tick grid.
use crate::core::types::{Aabb, EntityId, PickupKind, Team, Vec2};

#[derive(Debug, Clone)]
pub struct Pickup {
    pub id: EntityId,
    pub kind: PickupKind,
    pub pos: Vec2,
    /// Cleared the instant either collection or expiry is observed; every
    /// other observer reconciles via the despawn broadcast.
    pub active: bool,
    /// Simulation frame after which the crate expires unclaimed.
    pub expires_at: f64,
}

impl Pickup {
    pub fn new(id: EntityId, kind: PickupKind, pos: Vec2, expires_at: f64) -> Self {
        Pickup { id, kind, pos, active: true, expires_at }
    }

    pub fn expired(&self, sim_frames: f64) -> bool {
        sim_frames >= self.expires_at
    }
}

#[derive(Debug, Clone)]
pub struct Mountain {
    pub id: EntityId,
    pub pos: Vec2,
    pub radius: f32,
}

impl Mountain {
    pub fn aabb(&self) -> Aabb {
        Aabb::around(self.pos, self.radius, self.radius)
    }
}

/// Rectangular capture zone. The core reports crossings; scoring is the
/// game-mode layer's business.
#[derive(Debug, Clone)]
pub struct FlagZone {
    pub id: EntityId,
    pub team: Team,
    pub rect: Aabb,
}

/// Capture-the-flag flag. Contact is reported as a pickup event; the core
/// never consumes the flag itself.
#[derive(Debug, Clone)]
pub struct Flag {
    pub id: EntityId,
    pub team: Team,
    pub pos: Vec2,
}

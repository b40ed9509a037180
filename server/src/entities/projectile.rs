// skystrike/server/src/entities/projectile.rs
use crate::core::config::MissilePhysics;
use crate::core::types::{EntityId, MissileKind, PlayerId, Rotation, Team, Vec2, Velocity};

/// A live missile. Flies straight along its spawn rotation, accelerating up
/// to the type's speed ceiling, and despawns once its accumulated travel
/// distance exceeds the type's range or it leaves world bounds.
#[derive(Debug, Clone)]
pub struct Missile {
    pub id: EntityId,
    pub kind: MissileKind,
    pub owner: PlayerId,
    /// Owning team at fire time, mirrored onto the spatial shape. The
    /// narrow-phase resolver short-circuits same-team hits off the shape's
    /// cached copy, not this field.
    pub team: Team,
    pub pos: Vec2,
    pub rot: Rotation,
    pub vel: Velocity,
    /// Total distance traveled. Monotonically non-decreasing while alive.
    pub distance: f32,
    pub spawned_at: f64,
    pub alive: bool,
}

impl Missile {
    pub fn new(
        id: EntityId,
        kind: MissileKind,
        owner: PlayerId,
        team: Team,
        pos: Vec2,
        rot: Rotation,
        initial_speed: f32,
        spawned_at: f64,
    ) -> Self {
        let vel = Velocity { v: rot.heading().scaled(initial_speed), ..Default::default() };
        Missile { id, kind, owner, team, pos, rot, vel, distance: 0.0, spawned_at, alive: true }
    }

    pub fn exceeded_range(&self, physics: &MissilePhysics) -> bool {
        self.distance >= physics.max_range
    }
}

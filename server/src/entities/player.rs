// skystrike/server/src/entities/player.rs
use crate::core::config::ShipPhysics;
use crate::core::constants::{ENERGY_MAX, HEALTH_MAX, HEALTH_MIN};
use crate::core::types::{
    EntityId, KeyState, PlayerId, Powerups, Rotation, ShipKind, Team, Upgrades, Vec2, Velocity,
};

/// One connected player's ship. Mutated every tick by the physics pipeline;
/// the collision resolver only ever touches health, velocity and flags.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub ship: ShipKind,
    pub team: Team,

    pub pos: Vec2,
    pub rot: Rotation,
    pub vel: Velocity,

    pub health: f32,
    pub energy: f32,
    pub alive: bool,

    pub keys: KeyState,

    // Ship special state
    pub boosting: bool,
    pub stealthed: bool,
    /// Set by the physics pipeline when a repel discharge was paid for this
    /// tick; consumed (and cleared) by the collision resolver.
    pub repel_pending: bool,
    pub last_fire_frame: f64,
    pub last_special_frame: f64,

    pub powerups: Powerups,
    pub upgrades: Upgrades,

    pub kills: u32,
    pub deaths: u32,
    pub score: u32,

    /// Rotation bucket the cached hitbox was last computed for. The hitbox is
    /// refreshed only when this changes.
    pub hitbox_bucket: u16,
    /// Flag zone the player currently stands in, if any. Tracked so zone
    /// crossings fire once per enter/leave.
    pub in_zone: Option<EntityId>,
    /// Flag currently in contact, so flag pickups fire once per touch.
    pub touching_flag: Option<EntityId>,
    /// A respawn request was already forwarded for the current death.
    pub respawn_requested: bool,
    /// Spectated host, when this connection piggy-backs on another viewport.
    pub spectating: Option<PlayerId>,

    pub died_at_frame: Option<f64>,
}

impl Player {
    pub fn new(id: PlayerId, name: String, ship: ShipKind, team: Team, pos: Vec2) -> Self {
        Player {
            id,
            name,
            ship,
            team,
            pos,
            rot: Rotation::default(),
            vel: Velocity::default(),
            health: HEALTH_MAX,
            energy: ENERGY_MAX,
            alive: true,
            keys: KeyState::default(),
            boosting: false,
            stealthed: false,
            repel_pending: false,
            last_fire_frame: f64::NEG_INFINITY,
            last_special_frame: f64::NEG_INFINITY,
            powerups: Powerups::default(),
            upgrades: Upgrades::default(),
            kills: 0,
            deaths: 0,
            score: 0,
            hitbox_bucket: 0,
            in_zone: None,
            touching_flag: None,
            respawn_requested: false,
            spectating: None,
            died_at_frame: None,
        }
    }

    /// Effective speed ceiling this sub-step: ship constant times the active
    /// boost and upgrade factors.
    pub fn max_speed(&self, ship: &ShipPhysics) -> f32 {
        let boost = if self.boosting { ship.boost_factor } else { 1.0 };
        ship.max_speed * boost * self.upgrades.speed_factor()
    }

    /// Health/energy regeneration for one sub-step of `step` logical frames.
    pub fn regen(&mut self, ship: &ShipPhysics, step: f32) {
        self.energy = (self.energy + ship.energy_regen * step).min(ENERGY_MAX);
        self.health = (self.health + ship.health_regen * step).min(HEALTH_MAX);
    }

    /// Apply missile damage, honoring an active shield. Returns true when the
    /// hit was lethal. Stealth always drops on a hit.
    pub fn apply_damage(&mut self, damage: f32, sim_frames: f64) -> bool {
        if !self.alive {
            return false;
        }
        self.stealthed = false;
        let factor = if self.powerups.shield_active(sim_frames) { 0.0 } else { 1.0 };
        self.health = (self.health - damage * factor).max(HEALTH_MIN);
        if self.health <= HEALTH_MIN {
            self.die(sim_frames);
            return true;
        }
        false
    }

    fn die(&mut self, sim_frames: f64) {
        self.alive = false;
        self.deaths += 1;
        self.died_at_frame = Some(sim_frames);
        self.vel = Velocity::default();
        self.boosting = false;
        self.stealthed = false;
        self.repel_pending = false;
        self.in_zone = None;
        self.touching_flag = None;
    }

    pub fn respawn(&mut self, pos: Vec2) {
        self.alive = true;
        self.health = HEALTH_MAX;
        self.energy = ENERGY_MAX;
        self.pos = pos;
        self.rot = Rotation::default();
        self.vel = Velocity::default();
        self.powerups = Powerups::default();
        self.died_at_frame = None;
        self.respawn_requested = false;
        self.in_zone = None;
        self.touching_flag = None;
        self.spectating = None;
    }

    pub fn at_minimum_health(&self) -> bool {
        self.health <= HEALTH_MIN
    }
}

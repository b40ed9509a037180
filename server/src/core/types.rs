// skystrike/server/src/core/types.rs
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

use super::constants::{MIN_SPEED_EPSILON, ROTATION_BUCKETS};

/// Stable integer identity for every simulated object. Allocated once by the
/// world store and never reused within a session.
pub type EntityId = u32;

/// Entity id of a connected (or recently disconnected) player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub EntityId);

impl PlayerId {
    pub fn entity(self) -> EntityId {
        self.0
    }
}

pub type Team = u8;

// --- Basic Geometric Types ---

#[derive(Clone, Debug, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Vec2 { x, y }
    }

    pub fn zero() -> Self {
        Vec2 { x: 0.0, y: 0.0 }
    }

    pub fn length_sq(self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    pub fn length(self) -> f32 {
        self.length_sq().sqrt()
    }

    pub fn dot(self, other: Vec2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    pub fn scaled(self, factor: f32) -> Vec2 {
        Vec2::new(self.x * factor, self.y * factor)
    }

    pub fn normalized(self) -> Vec2 {
        let len = self.length();
        if len <= MIN_SPEED_EPSILON {
            Vec2::zero()
        } else {
            self.scaled(1.0 / len)
        }
    }

    /// Rotate by a rotation whose sine/cosine are already cached.
    pub fn rotated(self, sin: f32, cos: f32) -> Vec2 {
        Vec2::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Low-precision position used for cheap broadcast deltas. Derived, never
/// stored back into the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoarsePosition {
    pub x: i16,
    pub y: i16,
}

pub fn coarse(position: Vec2) -> CoarsePosition {
    CoarsePosition {
        x: position.x.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16,
        y: position.y.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16,
    }
}

/// Axis-aligned bounding box, min-corner + max-corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Aabb {
    pub fn new(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Aabb { min_x, min_y, max_x, max_y }
    }

    pub fn around(center: Vec2, half_x: f32, half_y: f32) -> Self {
        Aabb {
            min_x: center.x - half_x,
            min_y: center.y - half_y,
            max_x: center.x + half_x,
            max_y: center.y + half_y,
        }
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min_x < other.max_x
            && self.max_x > other.min_x
            && self.min_y < other.max_y
            && self.max_y > other.min_y
    }

    pub fn contains_point(&self, p: Vec2) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }
}

/// Rotation with cached sine/cosine and the quantized bucket that keys the
/// precomputed hitbox table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation {
    radians: f32,
    sin: f32,
    cos: f32,
    bucket: u16,
}

impl Rotation {
    pub fn new(radians: f32) -> Self {
        let mut rot = Rotation { radians: 0.0, sin: 0.0, cos: 1.0, bucket: 0 };
        rot.set(radians);
        rot
    }

    pub fn set(&mut self, radians: f32) {
        let wrapped = radians.rem_euclid(TAU);
        self.radians = wrapped;
        self.sin = wrapped.sin();
        self.cos = wrapped.cos();
        self.bucket = rotation_bucket(wrapped);
    }

    pub fn turn(&mut self, delta: f32) {
        self.set(self.radians + delta);
    }

    pub fn radians(&self) -> f32 {
        self.radians
    }

    pub fn sin(&self) -> f32 {
        self.sin
    }

    pub fn cos(&self) -> f32 {
        self.cos
    }

    pub fn bucket(&self) -> u16 {
        self.bucket
    }

    /// Unit vector the ship's nose points along. Zero radians faces "north"
    /// (negative y), matching the client's sprite orientation.
    pub fn heading(&self) -> Vec2 {
        Vec2::new(self.sin, -self.cos)
    }
}

impl Default for Rotation {
    fn default() -> Self {
        Rotation::new(0.0)
    }
}

pub fn rotation_bucket(radians: f32) -> u16 {
    let wrapped = radians.rem_euclid(TAU);
    ((wrapped / TAU) * ROTATION_BUCKETS as f32) as u16 % ROTATION_BUCKETS
}

pub fn bucket_radians(bucket: u16) -> f32 {
    (bucket as f32 / ROTATION_BUCKETS as f32) * TAU
}

/// Velocity with max-speed clamping and the min/max flags the broadcast layer
/// folds into its delta encoding.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Velocity {
    pub v: Vec2,
    pub at_max: bool,
    pub stalled: bool,
}

impl Velocity {
    pub fn clamp(&mut self, max_speed: f32) {
        let speed_sq = self.v.length_sq();
        if speed_sq > max_speed * max_speed {
            self.v = self.v.normalized().scaled(max_speed);
            self.at_max = true;
        } else {
            self.at_max = false;
        }
        if self.v.length_sq() < MIN_SPEED_EPSILON * MIN_SPEED_EPSILON {
            self.v = Vec2::zero();
            self.stalled = true;
        } else {
            self.stalled = false;
        }
    }

    pub fn speed(&self) -> f32 {
        self.v.length()
    }
}

// --- Ship / missile vocabulary ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShipKind {
    Raptor,
    Juggernaut,
    Wasp,
    Trident,
    Ghost,
}

impl ShipKind {
    pub const ALL: [ShipKind; 5] = [
        ShipKind::Raptor,
        ShipKind::Juggernaut,
        ShipKind::Wasp,
        ShipKind::Trident,
        ShipKind::Ghost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ShipKind::Raptor => "raptor",
            ShipKind::Juggernaut => "juggernaut",
            ShipKind::Wasp => "wasp",
            ShipKind::Trident => "trident",
            ShipKind::Ghost => "ghost",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MissileKind {
    Standard,
    Heavy,
    Swift,
    Splinter,
}

impl MissileKind {
    pub const ALL: [MissileKind; 4] = [
        MissileKind::Standard,
        MissileKind::Heavy,
        MissileKind::Swift,
        MissileKind::Splinter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MissileKind::Standard => "standard",
            MissileKind::Heavy => "heavy",
            MissileKind::Swift => "swift",
            MissileKind::Splinter => "splinter",
        }
    }
}

/// Ship special abilities. Resolved by the physics pipeline (energy and
/// cooldown gating) and, for Repel, applied by the collision resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpecialKind {
    Boost,
    Repel,
    Strafe,
    Stealth,
    Barrage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PickupKind {
    Upgrade,
    Shield,
    Inferno,
    Flag,
}

// --- Player input ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKey {
    Up,
    Down,
    Left,
    Right,
    Fire,
    Special,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyState {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub fire: bool,
    pub special: bool,
}

impl KeyState {
    pub fn apply(&mut self, key: InputKey, pressed: bool) {
        match key {
            InputKey::Up => self.up = pressed,
            InputKey::Down => self.down = pressed,
            InputKey::Left => self.left = pressed,
            InputKey::Right => self.right = pressed,
            InputKey::Fire => self.fire = pressed,
            InputKey::Special => self.special = pressed,
        }
    }

    pub fn any(&self) -> bool {
        self.up || self.down || self.left || self.right || self.fire || self.special
    }
}

/// Decoded player intent handed over by the connection layer. Already
/// shape-validated; the core never sees protocol bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerIntent {
    Key { player: PlayerId, key: InputKey, pressed: bool },
    Horizon { player: PlayerId, width: f32, height: f32 },
    Spectate { player: PlayerId, target: Option<PlayerId> },
}

impl PlayerIntent {
    pub fn player(&self) -> PlayerId {
        match self {
            PlayerIntent::Key { player, .. } => *player,
            PlayerIntent::Horizon { player, .. } => *player,
            PlayerIntent::Spectate { player, .. } => *player,
        }
    }
}

// --- Broadcast vocabulary ---

/// Why an entity appears in a connection's broadcast set this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastReason {
    /// Entity became visible this tick; the dispatch layer sends a full spawn
    /// record.
    FirstSeen,
    /// Entity was already known; a positional delta is enough.
    Update,
    /// Entity moved out of the viewport but still exists.
    LeftView,
    /// Entity ceased to exist; overrides any other reason in the same tick.
    Despawned,
}

/// Per-connection set of `{entity id -> reason}` produced once per tick.
pub type BroadcastSet = AHashMap<EntityId, BroadcastReason>;

// --- Gameplay events ---

/// Typed event stream consumed by the game-mode rule systems. Each event
/// carries enough identity/position context that consumers never re-query the
/// world mid-tick.
#[derive(Clone, Debug)]
pub enum GameEvent {
    PlayerJoined { player: PlayerId },
    PlayerLeft { player: PlayerId },
    Hit { missile: EntityId, target: PlayerId, owner: PlayerId, damage: f32, position: Vec2 },
    Kill { victim: PlayerId, killer: PlayerId, position: Vec2 },
    Pickup { player: PlayerId, entity: EntityId, kind: PickupKind, position: Vec2 },
    ZoneCross { player: PlayerId, zone: EntityId, entered: bool, position: Vec2 },
    Bounce { player: PlayerId, obstacle: EntityId, position: Vec2 },
    RespawnRequest { player: PlayerId },
}

impl GameEvent {
    pub fn name(&self) -> &'static str {
        match self {
            GameEvent::PlayerJoined { .. } => "player_joined",
            GameEvent::PlayerLeft { .. } => "player_left",
            GameEvent::Hit { .. } => "hit",
            GameEvent::Kill { .. } => "kill",
            GameEvent::Pickup { .. } => "pickup",
            GameEvent::ZoneCross { .. } => "zone_cross",
            GameEvent::Bounce { .. } => "bounce",
            GameEvent::RespawnRequest { .. } => "respawn_request",
        }
    }
}

// --- Powerups / upgrades ---

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Powerups {
    pub shield_until: Option<f64>,
    pub inferno_until: Option<f64>,
}

impl Powerups {
    pub fn shield_active(&self, sim_frames: f64) -> bool {
        self.shield_until.map_or(false, |until| sim_frames < until)
    }

    pub fn inferno_active(&self, sim_frames: f64) -> bool {
        self.inferno_until.map_or(false, |until| sim_frames < until)
    }

    pub fn expire(&mut self, sim_frames: f64) {
        if !self.shield_active(sim_frames) {
            self.shield_until = None;
        }
        if !self.inferno_active(sim_frames) {
            self.inferno_until = None;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Upgrades {
    pub speed: u8,
}

impl Upgrades {
    pub fn speed_factor(&self) -> f32 {
        let level = self.speed.min(super::constants::UPGRADE_SPEED_MAX_LEVEL);
        1.0 + super::constants::UPGRADE_SPEED_STEP * level as f32
    }
}

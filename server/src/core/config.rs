// skystrike/server/src/core/config.rs
use std::collections::HashMap;
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use super::constants;
use super::error::{SimError, SimResult};
use super::types::{MissileKind, ShipKind, SpecialKind, Vec2};

/// Per-ship physics constants. All speeds/accelerations are in world units per
/// logical frame; regeneration rates are in [0,1] health/energy per frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipPhysics {
    pub max_speed: f32,
    pub accel: f32,
    pub brake: f32,
    pub turn: f32,
    pub energy_regen: f32,
    pub health_regen: f32,
    pub special: SpecialKind,
    pub special_energy: f32,
    pub special_cooldown_frames: f64,
    pub boost_factor: f32,
    pub missile: MissileKind,
    pub fire_energy: f32,
    pub fire_delay_frames: f64,
    pub slots: Vec<FireSlot>,
    pub inferno_slots: Vec<FireSlot>,
}

/// Per-missile physics constants. `max_range` is the travel distance after
/// which the projectile despawns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissilePhysics {
    pub base_speed: f32,
    pub max_speed: f32,
    pub accel: f32,
    pub damage: f32,
    pub max_range: f32,
}

/// One muzzle of a fire template: spawn offset and angle relative to the
/// firing ship's nose.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FireSlot {
    pub offset_x: f32,
    pub offset_y: f32,
    pub angle: f32,
}

impl FireSlot {
    pub fn offset(&self) -> Vec2 {
        Vec2::new(self.offset_x, self.offset_y)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldBounds {
    pub min_x: f32,
    pub max_x: f32,
    pub min_y: f32,
    pub max_y: f32,
}

impl Default for WorldBounds {
    fn default() -> Self {
        WorldBounds {
            min_x: constants::WORLD_MIN_X,
            max_x: constants::WORLD_MAX_X,
            min_y: constants::WORLD_MIN_Y,
            max_y: constants::WORLD_MAX_Y,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub tick_rate: u64,
    pub bounds: WorldBounds,
    /// Hard ceiling on viewport half-extents, regardless of what horizon a
    /// client declares or what the scale factor is.
    pub max_viewport_x: f32,
    pub max_viewport_y: f32,
    /// Multiplier applied to every client-declared horizon. Changing it at
    /// runtime (generation bump) triggers a one-time viewport recomputation
    /// for every connected player.
    pub scale_factor: f32,
    pub clock_reset_frames: u64,
    /// Number of powerup crates the scatter system keeps alive.
    pub pickup_target_count: usize,
    pub ships: HashMap<ShipKind, ShipPhysics>,
    pub missiles: HashMap<MissileKind, MissilePhysics>,
    /// Monotonic generation counter; bumped on every runtime swap.
    #[serde(default)]
    pub generation: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            tick_rate: constants::SERVER_TICK_RATE,
            bounds: WorldBounds::default(),
            max_viewport_x: 4096.0,
            max_viewport_y: 2048.0,
            scale_factor: 1.0,
            clock_reset_frames: constants::CLOCK_RESET_FRAMES,
            pickup_target_count: 12,
            ships: default_ship_table(),
            missiles: default_missile_table(),
            generation: 0,
        }
    }
}

impl SimConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> SimResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: SimConfig = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn ship(&self, kind: ShipKind) -> &ShipPhysics {
        // validate() guarantees presence before the first tick runs.
        &self.ships[&kind]
    }

    pub fn missile(&self, kind: MissileKind) -> &MissilePhysics {
        &self.missiles[&kind]
    }

    /// Startup-warmup invariant check: the system refuses to start with
    /// partial physics tables.
    pub fn validate(&self) -> SimResult<()> {
        if self.tick_rate == 0 {
            return Err(SimError::Config("tick_rate must be positive".into()));
        }
        if self.bounds.min_x >= self.bounds.max_x || self.bounds.min_y >= self.bounds.max_y {
            return Err(SimError::Config("world bounds are degenerate".into()));
        }
        if self.scale_factor <= 0.0 {
            return Err(SimError::Config("scale_factor must be positive".into()));
        }
        for kind in ShipKind::ALL {
            let ship = self
                .ships
                .get(&kind)
                .ok_or_else(|| SimError::MissingPhysicsTable(format!("ship {}", kind.as_str())))?;
            if !self.missiles.contains_key(&ship.missile) {
                return Err(SimError::MissingPhysicsTable(format!(
                    "missile {} (fired by {})",
                    ship.missile.as_str(),
                    kind.as_str()
                )));
            }
            if ship.slots.is_empty() || ship.inferno_slots.is_empty() {
                return Err(SimError::Config(format!(
                    "ship {} has an empty fire template",
                    kind.as_str()
                )));
            }
            if ship.max_speed <= 0.0 || ship.accel <= 0.0 {
                return Err(SimError::Config(format!(
                    "ship {} has non-positive speed constants",
                    kind.as_str()
                )));
            }
        }
        for kind in MissileKind::ALL {
            if !self.missiles.contains_key(&kind) {
                return Err(SimError::MissingPhysicsTable(format!("missile {}", kind.as_str())));
            }
        }
        Ok(())
    }

    /// The forward-hit-circle shortcut for missile-vs-mountain tests is only
    /// sound while no missile can travel further than the smallest mountain
    /// radius in one logical frame. Checked once at startup warmup.
    pub fn validate_against_scale(&self, min_obstacle_radius: f32) -> SimResult<()> {
        for (kind, missile) in &self.missiles {
            if missile.max_speed >= min_obstacle_radius {
                return Err(SimError::Config(format!(
                    "missile {} max_speed {} exceeds the map scale ceiling {}",
                    kind.as_str(),
                    missile.max_speed,
                    min_obstacle_radius
                )));
            }
        }
        Ok(())
    }

    pub fn tick_duration(&self) -> std::time::Duration {
        std::time::Duration::from_micros(1_000_000 / self.tick_rate)
    }
}

/// Shared handle for the connection layer and admin surface; the tick reads a
/// consistent snapshot via `load_full()` once per tick.
pub type SharedConfig = Arc<ArcSwap<SimConfig>>;

pub fn shared(config: SimConfig) -> SharedConfig {
    Arc::new(ArcSwap::from_pointee(config))
}

/// Swap in a new scale factor at runtime, bumping the generation so the
/// instance recomputes every viewport exactly once.
pub fn set_scale_factor(shared: &SharedConfig, scale_factor: f32) {
    let current = shared.load_full();
    let mut next = (*current).clone();
    next.scale_factor = scale_factor;
    next.generation = current.generation + 1;
    shared.store(Arc::new(next));
}

fn single_slot() -> Vec<FireSlot> {
    vec![FireSlot { offset_x: 0.0, offset_y: -20.0, angle: 0.0 }]
}

fn inferno_triple() -> Vec<FireSlot> {
    vec![
        FireSlot { offset_x: -12.0, offset_y: -16.0, angle: -0.17 },
        FireSlot { offset_x: 0.0, offset_y: -20.0, angle: 0.0 },
        FireSlot { offset_x: 12.0, offset_y: -16.0, angle: 0.17 },
    ]
}

fn default_ship_table() -> HashMap<ShipKind, ShipPhysics> {
    let mut ships = HashMap::new();
    ships.insert(
        ShipKind::Raptor,
        ShipPhysics {
            max_speed: 5.5,
            accel: 0.225,
            brake: 0.025,
            turn: 0.065,
            energy_regen: 0.008,
            health_regen: 0.001,
            special: SpecialKind::Boost,
            special_energy: 0.01,
            special_cooldown_frames: 0.0,
            boost_factor: 1.5,
            missile: MissileKind::Standard,
            fire_energy: 0.5,
            fire_delay_frames: 33.0,
            slots: single_slot(),
            inferno_slots: inferno_triple(),
        },
    );
    ships.insert(
        ShipKind::Juggernaut,
        ShipPhysics {
            max_speed: 3.5,
            accel: 0.1,
            brake: 0.0375,
            turn: 0.04,
            energy_regen: 0.005,
            health_regen: 0.0005,
            special: SpecialKind::Repel,
            special_energy: 0.5,
            special_cooldown_frames: 60.0,
            boost_factor: 1.0,
            missile: MissileKind::Heavy,
            fire_energy: 0.9,
            fire_delay_frames: 90.0,
            slots: single_slot(),
            inferno_slots: inferno_triple(),
        },
    );
    ships.insert(
        ShipKind::Wasp,
        ShipPhysics {
            max_speed: 6.0,
            accel: 0.275,
            brake: 0.025,
            turn: 0.07,
            energy_regen: 0.01,
            health_regen: 0.001,
            special: SpecialKind::Strafe,
            special_energy: 0.0,
            special_cooldown_frames: 0.0,
            boost_factor: 1.0,
            missile: MissileKind::Swift,
            fire_energy: 0.3,
            fire_delay_frames: 18.0,
            slots: single_slot(),
            inferno_slots: inferno_triple(),
        },
    );
    ships.insert(
        ShipKind::Trident,
        ShipPhysics {
            max_speed: 4.5,
            accel: 0.2,
            brake: 0.025,
            turn: 0.055,
            energy_regen: 0.006,
            health_regen: 0.001,
            special: SpecialKind::Barrage,
            special_energy: 0.9,
            special_cooldown_frames: 0.0,
            boost_factor: 1.0,
            missile: MissileKind::Splinter,
            fire_energy: 0.75,
            fire_delay_frames: 45.0,
            slots: vec![
                FireSlot { offset_x: -15.0, offset_y: -12.0, angle: -0.12 },
                FireSlot { offset_x: 0.0, offset_y: -20.0, angle: 0.0 },
                FireSlot { offset_x: 15.0, offset_y: -12.0, angle: 0.12 },
            ],
            inferno_slots: vec![
                FireSlot { offset_x: -22.0, offset_y: -8.0, angle: -0.3 },
                FireSlot { offset_x: -15.0, offset_y: -12.0, angle: -0.15 },
                FireSlot { offset_x: 0.0, offset_y: -20.0, angle: 0.0 },
                FireSlot { offset_x: 15.0, offset_y: -12.0, angle: 0.15 },
                FireSlot { offset_x: 22.0, offset_y: -8.0, angle: 0.3 },
            ],
        },
    );
    ships.insert(
        ShipKind::Ghost,
        ShipPhysics {
            max_speed: 4.5,
            accel: 0.2,
            brake: 0.025,
            turn: 0.055,
            energy_regen: 0.006,
            health_regen: 0.001,
            special: SpecialKind::Stealth,
            special_energy: 0.6,
            special_cooldown_frames: 90.0,
            boost_factor: 1.0,
            missile: MissileKind::Standard,
            fire_energy: 0.5,
            fire_delay_frames: 33.0,
            slots: single_slot(),
            inferno_slots: inferno_triple(),
        },
    );
    ships
}

fn default_missile_table() -> HashMap<MissileKind, MissilePhysics> {
    let mut missiles = HashMap::new();
    missiles.insert(
        MissileKind::Standard,
        MissilePhysics { base_speed: 6.0, max_speed: 9.0, accel: 0.105, damage: 0.4, max_range: 1400.0 },
    );
    missiles.insert(
        MissileKind::Heavy,
        MissilePhysics { base_speed: 3.6, max_speed: 4.5, accel: 0.06, damage: 1.2, max_range: 1100.0 },
    );
    missiles.insert(
        MissileKind::Swift,
        MissilePhysics { base_speed: 7.0, max_speed: 10.5, accel: 0.14, damage: 0.2, max_range: 1200.0 },
    );
    missiles.insert(
        MissileKind::Splinter,
        MissilePhysics { base_speed: 5.6, max_speed: 8.5, accel: 0.1, damage: 0.3, max_range: 1050.0 },
    );
    missiles
}

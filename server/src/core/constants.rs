// skystrike/server/src/core/constants.rs
use std::time::Duration;

pub const SERVER_TICK_RATE: u64 = 60;
pub const TICK_DURATION_MICROS: u64 = 1_000_000 / SERVER_TICK_RATE;
pub const TICK_DURATION: Duration = Duration::from_micros(TICK_DURATION_MICROS);

// World constants
pub const WORLD_MIN_X: f32 = -16384.0;
pub const WORLD_MAX_X: f32 = 16384.0;
pub const WORLD_MIN_Y: f32 = -8192.0;
pub const WORLD_MAX_Y: f32 = 8192.0;

// Spatial Index constants
pub const SPATIAL_INDEX_CELL_SIZE: f32 = 512.0;

// Rotation is discretized into this many buckets; the hitbox cache is keyed
// by (hull kind, bucket).
pub const ROTATION_BUCKETS: u16 = 256;

// Ticker constants
//
// Remaining waits above the threshold use the coarse timer; below it the
// ticker spins on the fine-grained yield until the boundary is reached.
pub const FINE_WAIT_THRESHOLD: Duration = Duration::from_millis(2);
// A tick spanning more than this many logical frames is folded into the next
// tick's frame factor instead of being simulated in one oversized step.
pub const MAX_FRAMES_PER_TICK: f64 = 2.0;
// Counter/reference reset boundary (frames). About 20 days of uptime at 60Hz.
pub const CLOCK_RESET_FRAMES: u64 = 100_000_000;

// Player constants
pub const HEALTH_MAX: f32 = 1.0;
pub const HEALTH_MIN: f32 = 0.0;
pub const ENERGY_MAX: f32 = 1.0;
// Below this speed the velocity snaps to zero and the `stalled` flag is set.
pub const MIN_SPEED_EPSILON: f32 = 0.0001;
pub const UPGRADE_SPEED_STEP: f32 = 0.04;
pub const UPGRADE_SPEED_MAX_LEVEL: u8 = 5;
pub const RESPAWN_DELAY_FRAMES: f64 = 120.0;

// Weapon constants
pub const MIN_SHOT_INTERVAL_FRAMES: f64 = 6.0;
// Fraction of the firing ship's forward speed inherited by a spawned missile.
pub const MISSILE_INHERIT_FACTOR: f32 = 0.3;

// Powerup durations (simulation frames)
pub const SHIELD_DURATION_FRAMES: f64 = 600.0;
pub const INFERNO_DURATION_FRAMES: f64 = 600.0;

// Pickup constants
pub const PICKUP_RADIUS: f32 = 24.0;
pub const PICKUP_LIFETIME_FRAMES: f64 = 3600.0;

// Repel (ship special)
pub const REPEL_RADIUS: f32 = 225.0;
pub const REPEL_PLAYER_SPEED: f32 = 5.1;

// Bounce off static obstacles
pub const BOUNCE_FACTOR: f32 = 0.6;

// Score awards
pub const KILL_SCORE: u32 = 25;
pub const UPGRADE_SCORE: u32 = 1;

// Viewport constants
pub const DEFAULT_HORIZON_X: f32 = 1680.0;
pub const DEFAULT_HORIZON_Y: f32 = 1050.0;

// Client liveness, evaluated once per tick against cached activity stamps
pub const AFK_TIMEOUT: Duration = Duration::from_secs(120);
pub const LAG_WARNING: Duration = Duration::from_secs(5);

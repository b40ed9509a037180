// skystrike/server/src/world/hitbox.rs
//
// Collision shapes are multi-circle hulls in entity-local space. The
// axis-aligned hitbox used for broad-phase filtering depends only on the hull
// kind and the discretized rotation, so the full table is computed once at
// startup warmup and looked up per tick.
use ahash::AHashMap;
use once_cell::sync::Lazy;
use smallvec::{smallvec, SmallVec};
use tracing::debug;

use crate::core::constants::ROTATION_BUCKETS;
use crate::core::types::{bucket_radians, Aabb, MissileKind, ShipKind, Vec2};

/// One circle of a hull, offset from the entity origin in local space.
/// Local +y points toward the tail; the nose is at negative y.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitCircle {
    pub offset: Vec2,
    pub radius: f32,
}

impl HitCircle {
    pub const fn new(x: f32, y: f32, radius: f32) -> Self {
        HitCircle { offset: Vec2 { x, y }, radius }
    }

    /// World-space center for an entity at `pos` with cached sin/cos.
    pub fn world_center(&self, pos: Vec2, sin: f32, cos: f32) -> Vec2 {
        pos + self.offset.rotated(sin, cos)
    }
}

pub type Hull = SmallVec<[HitCircle; 4]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HullKind {
    Ship(ShipKind),
    Missile(MissileKind),
    Crate,
    Flag,
}

impl HullKind {
    fn all() -> Vec<HullKind> {
        let mut kinds = Vec::new();
        for ship in ShipKind::ALL {
            kinds.push(HullKind::Ship(ship));
        }
        for missile in MissileKind::ALL {
            kinds.push(HullKind::Missile(missile));
        }
        kinds.push(HullKind::Crate);
        kinds.push(HullKind::Flag);
        kinds
    }
}

static HULLS: Lazy<AHashMap<HullKind, Hull>> =
    Lazy::new(|| HullKind::all().into_iter().map(|kind| (kind, build_hull(kind))).collect());

/// Local-space hull template. Missile hulls list the forward (nose) circle
/// first: the mountain narrow phase tests only that circle.
pub fn hull(kind: HullKind) -> &'static Hull {
    &HULLS[&kind]
}

fn build_hull(kind: HullKind) -> Hull {
    match kind {
        HullKind::Ship(ShipKind::Raptor) => smallvec![
            HitCircle::new(0.0, -16.0, 10.0),
            HitCircle::new(0.0, 2.0, 16.0),
            HitCircle::new(0.0, 18.0, 9.0),
        ],
        HullKind::Ship(ShipKind::Juggernaut) => smallvec![
            HitCircle::new(0.0, -20.0, 18.0),
            HitCircle::new(0.0, 6.0, 24.0),
            HitCircle::new(0.0, 28.0, 14.0),
        ],
        HullKind::Ship(ShipKind::Wasp) => smallvec![
            HitCircle::new(0.0, -12.0, 8.0),
            HitCircle::new(0.0, 2.0, 12.0),
            HitCircle::new(0.0, 14.0, 7.0),
        ],
        HullKind::Ship(ShipKind::Trident) => smallvec![
            HitCircle::new(0.0, -14.0, 9.0),
            HitCircle::new(-10.0, 4.0, 11.0),
            HitCircle::new(10.0, 4.0, 11.0),
            HitCircle::new(0.0, 16.0, 8.0),
        ],
        HullKind::Ship(ShipKind::Ghost) => smallvec![
            HitCircle::new(0.0, -14.0, 9.0),
            HitCircle::new(0.0, 2.0, 13.0),
            HitCircle::new(0.0, 15.0, 8.0),
        ],
        HullKind::Missile(MissileKind::Standard) => {
            smallvec![HitCircle::new(0.0, -8.0, 4.0), HitCircle::new(0.0, 3.0, 5.0)]
        }
        HullKind::Missile(MissileKind::Heavy) => {
            smallvec![HitCircle::new(0.0, -10.0, 6.0), HitCircle::new(0.0, 4.0, 8.0)]
        }
        HullKind::Missile(MissileKind::Swift) => {
            smallvec![HitCircle::new(0.0, -7.0, 3.0), HitCircle::new(0.0, 2.0, 4.0)]
        }
        HullKind::Missile(MissileKind::Splinter) => {
            smallvec![HitCircle::new(0.0, -6.0, 3.0), HitCircle::new(0.0, 2.0, 4.0)]
        }
        HullKind::Crate => smallvec![HitCircle::new(0.0, 0.0, crate::core::constants::PICKUP_RADIUS)],
        HullKind::Flag => smallvec![HitCircle::new(0.0, 0.0, 46.0)],
    }
}

/// Forward hit-circle, by the hull convention above.
pub fn forward_circle(hull: &Hull) -> HitCircle {
    hull[0]
}

/// Axis-aligned extents of a rotated hull: half-sizes and the offset of the
/// box center from the entity position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitboxExtent {
    pub half_x: f32,
    pub half_y: f32,
    pub center: Vec2,
}

impl HitboxExtent {
    pub fn aabb(&self, pos: Vec2) -> Aabb {
        Aabb::around(pos + self.center, self.half_x, self.half_y)
    }
}

/// Fresh bounding-box computation for a hull rotated by `radians`. Used by
/// the warmup and as the reference in tests; per-tick code reads the cache.
pub fn compute_extent(kind: HullKind, radians: f32) -> HitboxExtent {
    let (sin, cos) = radians.sin_cos();
    let circles = hull(kind);
    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for circle in circles {
        let center = circle.offset.rotated(sin, cos);
        min_x = min_x.min(center.x - circle.radius);
        min_y = min_y.min(center.y - circle.radius);
        max_x = max_x.max(center.x + circle.radius);
        max_y = max_y.max(center.y + circle.radius);
    }
    HitboxExtent {
        half_x: (max_x - min_x) / 2.0,
        half_y: (max_y - min_y) / 2.0,
        center: Vec2::new((min_x + max_x) / 2.0, (min_y + max_y) / 2.0),
    }
}

/// Precomputed hitbox table keyed by (hull kind, rotation bucket). Populated
/// once at startup warmup; lookups are infallible afterwards.
pub struct HitboxCache {
    extents: AHashMap<HullKind, Vec<HitboxExtent>>,
}

impl HitboxCache {
    pub fn warm_up() -> Self {
        let mut extents = AHashMap::new();
        for kind in HullKind::all() {
            let mut per_bucket = Vec::with_capacity(ROTATION_BUCKETS as usize);
            for bucket in 0..ROTATION_BUCKETS {
                per_bucket.push(compute_extent(kind, bucket_radians(bucket)));
            }
            extents.insert(kind, per_bucket);
        }
        debug!(
            "Hitbox cache warmed: {} hull kinds x {} rotation buckets",
            extents.len(),
            ROTATION_BUCKETS
        );
        HitboxCache { extents }
    }

    pub fn extent(&self, kind: HullKind, bucket: u16) -> HitboxExtent {
        self.extents[&kind][(bucket % ROTATION_BUCKETS) as usize]
    }

    pub fn aabb(&self, kind: HullKind, bucket: u16, pos: Vec2) -> Aabb {
        self.extent(kind, bucket).aabb(pos)
    }
}

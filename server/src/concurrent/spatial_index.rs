// skystrike/server/src/concurrent/spatial_index.rs
//
// Broad-phase structure for the dynamic colliders (players, missiles,
// pickups, flags): a uniform grid of AABB buckets, rebuilt at the start of
// every collision pass. Narrow-phase tests live in systems::collision.
use ahash::AHashMap;
use tracing::debug;

use crate::core::config::WorldBounds;
use crate::core::types::{Aabb, EntityId, PlayerId, Team, Vec2};
use crate::world::hitbox::HullKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColliderKind {
    Player,
    Missile,
    Pickup,
    Flag,
}

/// One inserted collider. Team and owner are cached here deliberately: the
/// narrow-phase resolver short-circuits same-team collisions off this copy,
/// so a team change must be mirrored via `set_team` the moment it happens.
#[derive(Debug, Clone)]
pub struct SpatialShape {
    pub entity: EntityId,
    pub kind: ColliderKind,
    pub hull: HullKind,
    pub pos: Vec2,
    pub sin: f32,
    pub cos: f32,
    pub aabb: Aabb,
    pub team: Team,
    pub owner: Option<PlayerId>,
    /// Inactive shapes (dead players, consumed pickups) stay registered but
    /// are skipped by the bucket rebuild and all queries.
    pub active: bool,
}

pub struct SpatialIndex {
    shapes: AHashMap<EntityId, SpatialShape>,
    buckets: Vec<Vec<EntityId>>,
    grid_width: usize,
    grid_height: usize,
    cell_size: f32,
    min_x: f32,
    min_y: f32,
}

impl SpatialIndex {
    pub fn new(bounds: &WorldBounds, cell_size: f32) -> Self {
        let grid_width = (((bounds.max_x - bounds.min_x) / cell_size).ceil() as usize).max(1);
        let grid_height = (((bounds.max_y - bounds.min_y) / cell_size).ceil() as usize).max(1);
        let total_cells = grid_width * grid_height;

        let mut buckets = Vec::with_capacity(total_cells);
        for _ in 0..total_cells {
            buckets.push(Vec::new());
        }

        debug!(
            "Spatial index initialized: {}x{} grid, {} cells, cell size {}",
            grid_width, grid_height, total_cells, cell_size
        );

        SpatialIndex {
            shapes: AHashMap::new(),
            buckets,
            grid_width,
            grid_height,
            cell_size,
            min_x: bounds.min_x,
            min_y: bounds.min_y,
        }
    }

    pub fn insert(&mut self, shape: SpatialShape) {
        self.shapes.insert(shape.entity, shape);
    }

    pub fn remove(&mut self, entity: EntityId) -> Option<SpatialShape> {
        // Buckets still referencing the id are harmless until the next
        // rebuild: queries guard every id through `shapes`.
        self.shapes.remove(&entity)
    }

    pub fn shape(&self, entity: EntityId) -> Option<&SpatialShape> {
        self.shapes.get(&entity)
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.shapes.contains_key(&entity)
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Refresh a shape's kinematic state after physics integration. The AABB
    /// handed in must already be in sync with `pos` (hitbox-cache lookup);
    /// the index never recomputes it.
    pub fn set_state(&mut self, entity: EntityId, pos: Vec2, sin: f32, cos: f32, aabb: Aabb) {
        if let Some(shape) = self.shapes.get_mut(&entity) {
            shape.pos = pos;
            shape.sin = sin;
            shape.cos = cos;
            shape.aabb = aabb;
        }
    }

    /// Mirror a team change onto the cached shape. Mandatory at the moment a
    /// player switches team.
    pub fn set_team(&mut self, entity: EntityId, team: Team) {
        if let Some(shape) = self.shapes.get_mut(&entity) {
            shape.team = team;
        }
    }

    pub fn set_active(&mut self, entity: EntityId, active: bool) {
        if let Some(shape) = self.shapes.get_mut(&entity) {
            shape.active = active;
        }
    }

    /// Rebuild the broad-phase buckets from every active shape's current
    /// AABB. Called exactly once per tick, before any query.
    pub fn update(&mut self) {
        for bucket in self.buckets.iter_mut() {
            bucket.clear();
        }
        let grid_width = self.grid_width;
        for shape in self.shapes.values() {
            if !shape.active {
                continue;
            }
            let (x0, x1, y0, y1) = cell_range(
                &shape.aabb,
                self.min_x,
                self.min_y,
                self.cell_size,
                self.grid_width,
                self.grid_height,
            );
            for y in y0..=y1 {
                for x in x0..=x1 {
                    self.buckets[y * grid_width + x].push(shape.entity);
                }
            }
        }
    }

    /// Candidate entities whose AABB-covered cells overlap `aabb`, deduped,
    /// filtered to actual AABB overlap. Returns owned ids so callers may
    /// mutate the index while walking the result.
    pub fn query_aabb(&self, aabb: &Aabb) -> Vec<EntityId> {
        let (x0, x1, y0, y1) = cell_range(
            aabb,
            self.min_x,
            self.min_y,
            self.cell_size,
            self.grid_width,
            self.grid_height,
        );
        let mut candidates = Vec::new();
        for y in y0..=y1 {
            for x in x0..=x1 {
                for entity in &self.buckets[y * self.grid_width + x] {
                    if let Some(shape) = self.shapes.get(entity) {
                        if shape.active && shape.aabb.overlaps(aabb) {
                            candidates.push(*entity);
                        }
                    }
                }
            }
        }
        candidates.sort_unstable();
        candidates.dedup();
        candidates
    }

    /// Candidates within `radius` of `center`, measured center-to-center.
    pub fn query_radius(&self, center: Vec2, radius: f32) -> Vec<EntityId> {
        let aabb = Aabb::around(center, radius, radius);
        let radius_sq = radius * radius;
        self.query_aabb(&aabb)
            .into_iter()
            .filter(|entity| {
                self.shapes
                    .get(entity)
                    .map(|shape| (shape.pos - center).length_sq() <= radius_sq)
                    .unwrap_or(false)
            })
            .collect()
    }
}

#[inline]
fn cell_range(
    aabb: &Aabb,
    min_x: f32,
    min_y: f32,
    cell_size: f32,
    grid_width: usize,
    grid_height: usize,
) -> (usize, usize, usize, usize) {
    let clamp_x = |v: f32| (((v - min_x) / cell_size).floor().max(0.0) as usize).min(grid_width - 1);
    let clamp_y =
        |v: f32| (((v - min_y) / cell_size).floor().max(0.0) as usize).min(grid_height - 1);
    (clamp_x(aabb.min_x), clamp_x(aabb.max_x), clamp_y(aabb.min_y), clamp_y(aabb.max_y))
}

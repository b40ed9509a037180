// skystrike/server/src/concurrent/static_index.rs
use rstar::{RTree, RTreeObject, AABB};
use tracing::debug;

use crate::core::types::{Aabb, EntityId, Vec2};
use crate::world::store::World;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticKind {
    Mountain,
    Zone,
}

/// One piece of static geometry. Mountains carry their circle radius for the
/// narrow phase; zones are pure rectangles.
#[derive(Debug, Clone)]
pub struct StaticShape {
    pub id: EntityId,
    pub kind: StaticKind,
    pub pos: Vec2,
    pub radius: f32,
    pub aabb: Aabb,
}

impl RTreeObject for StaticShape {
    type Envelope = AABB<[f32; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners([self.aabb.min_x, self.aabb.min_y], [self.aabb.max_x, self.aabb.max_y])
    }
}

/// R-tree over the immutable geometry (mountains, capture zones). Built once
/// at startup warmup from the world store; never mutated during play.
pub struct StaticIndex {
    rtree: RTree<StaticShape>,
}

impl StaticIndex {
    pub fn build(world: &World) -> Self {
        let mut shapes = Vec::with_capacity(world.mountains.len() + world.zones.len());
        for (id, mountain) in world.mountains.iter() {
            shapes.push(StaticShape {
                id,
                kind: StaticKind::Mountain,
                pos: mountain.pos,
                radius: mountain.radius,
                aabb: mountain.aabb(),
            });
        }
        for (id, zone) in world.zones.iter() {
            shapes.push(StaticShape {
                id,
                kind: StaticKind::Zone,
                pos: Vec2::new(
                    (zone.rect.min_x + zone.rect.max_x) / 2.0,
                    (zone.rect.min_y + zone.rect.max_y) / 2.0,
                ),
                radius: 0.0,
                aabb: zone.rect,
            });
        }
        debug!("Static index built with {} shapes", shapes.len());
        StaticIndex { rtree: RTree::bulk_load(shapes) }
    }

    /// Static shapes whose envelope intersects `aabb`, cloned out so callers
    /// may mutate other structures while walking the result.
    pub fn query_aabb(&self, aabb: &Aabb) -> Vec<StaticShape> {
        let envelope = AABB::from_corners([aabb.min_x, aabb.min_y], [aabb.max_x, aabb.max_y]);
        self.rtree.locate_in_envelope_intersecting(&envelope).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.rtree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.rtree.size() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::mob::{FlagZone, Mountain};

    #[test]
    fn finds_mountains_and_zones_by_envelope() {
        let mut world = World::new();
        let m_id = world.allocate_id();
        world.insert_mountain(Mountain { id: m_id, pos: Vec2::new(100.0, 100.0), radius: 50.0 });
        let z_id = world.allocate_id();
        world.insert_zone(FlagZone {
            id: z_id,
            team: 1,
            rect: Aabb::new(400.0, 400.0, 600.0, 600.0),
        });

        let index = StaticIndex::build(&world);
        assert_eq!(index.len(), 2);

        let near_mountain = index.query_aabb(&Aabb::new(40.0, 40.0, 60.0, 60.0));
        assert_eq!(near_mountain.len(), 1);
        assert_eq!(near_mountain[0].kind, StaticKind::Mountain);

        let near_zone = index.query_aabb(&Aabb::new(450.0, 450.0, 470.0, 470.0));
        assert_eq!(near_zone.len(), 1);
        assert_eq!(near_zone[0].kind, StaticKind::Zone);

        let nowhere = index.query_aabb(&Aabb::new(-500.0, -500.0, -400.0, -400.0));
        assert!(nowhere.is_empty());
    }
}

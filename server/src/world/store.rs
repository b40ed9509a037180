// skystrike/server/src/world/store.rs
//
// The world store is an explicitly owned context passed by reference into
// each system's per-tick call. No ambient/static state: ownership and
// mutation order stay auditable. Callers know which typed table an id
// belongs to via the id-set indices kept alongside the tables.
use ahash::{AHashMap, AHashSet};
use serde::Serialize;

use crate::core::types::{EntityId, PickupKind, PlayerId, ShipKind, Team, Vec2};
use crate::entities::mob::{Flag, FlagZone, Mountain, Pickup};
use crate::entities::player::Player;
use crate::entities::projectile::Missile;

/// Homogeneous entity collection: O(1) lookup by id, iteration in insertion
/// order. Iterating while deleting is prohibited; systems collect ids first
/// and apply removals at phase boundaries.
#[derive(Debug)]
pub struct EntityTable<V> {
    map: AHashMap<EntityId, V>,
    order: Vec<EntityId>,
}

impl<V> EntityTable<V> {
    pub fn new() -> Self {
        EntityTable { map: AHashMap::new(), order: Vec::new() }
    }

    pub fn insert(&mut self, id: EntityId, value: V) {
        if self.map.insert(id, value).is_none() {
            self.order.push(id);
        }
    }

    pub fn remove(&mut self, id: EntityId) -> Option<V> {
        let removed = self.map.remove(&id);
        if removed.is_some() {
            self.order.retain(|existing| *existing != id);
        }
        removed
    }

    pub fn get(&self, id: EntityId) -> Option<&V> {
        self.map.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut V> {
        self.map.get_mut(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.map.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Ids in insertion order, materialized so the caller can mutate the
    /// table while walking them (with guarded lookups).
    pub fn ids(&self) -> Vec<EntityId> {
        self.order.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &V)> {
        self.order.iter().filter_map(move |id| self.map.get(id).map(|value| (*id, value)))
    }

    pub fn for_each_mut<F>(&mut self, mut func: F)
    where
        F: FnMut(EntityId, &mut V),
    {
        let map = &mut self.map;
        for id in &self.order {
            if let Some(value) = map.get_mut(id) {
                func(*id, value);
            }
        }
    }
}

impl<V> Default for EntityTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
pub struct World {
    pub tick: u64,
    /// Simulated time in logical frames, advanced by each tick's frame
    /// factor. All cooldowns and expiries compare against this, never against
    /// wall clock.
    pub sim_frames: f64,
    next_id: EntityId,

    pub players: EntityTable<Player>,
    pub missiles: EntityTable<Missile>,
    pub pickups: EntityTable<Pickup>,
    pub mountains: EntityTable<Mountain>,
    pub zones: EntityTable<FlagZone>,
    pub flags: EntityTable<Flag>,

    // Typed id-set indices; the hot loops test membership here instead of
    // probing every table.
    pub player_ids: AHashSet<EntityId>,
    pub missile_ids: AHashSet<EntityId>,
    pub pickup_ids: AHashSet<EntityId>,
}

impl World {
    pub fn new() -> Self {
        World { next_id: 1, ..Default::default() }
    }

    pub fn allocate_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn insert_player(&mut self, player: Player) -> PlayerId {
        let id = player.id;
        self.player_ids.insert(id.entity());
        self.players.insert(id.entity(), player);
        id
    }

    pub fn remove_player(&mut self, id: PlayerId) -> Option<Player> {
        self.player_ids.remove(&id.entity());
        self.players.remove(id.entity())
    }

    pub fn insert_missile(&mut self, missile: Missile) -> EntityId {
        let id = missile.id;
        self.missile_ids.insert(id);
        self.missiles.insert(id, missile);
        id
    }

    pub fn remove_missile(&mut self, id: EntityId) -> Option<Missile> {
        self.missile_ids.remove(&id);
        self.missiles.remove(id)
    }

    pub fn insert_pickup(&mut self, pickup: Pickup) -> EntityId {
        let id = pickup.id;
        self.pickup_ids.insert(id);
        self.pickups.insert(id, pickup);
        id
    }

    pub fn remove_pickup(&mut self, id: EntityId) -> Option<Pickup> {
        self.pickup_ids.remove(&id);
        self.pickups.remove(id)
    }

    pub fn insert_mountain(&mut self, mountain: Mountain) -> EntityId {
        let id = mountain.id;
        self.mountains.insert(id, mountain);
        id
    }

    pub fn insert_zone(&mut self, zone: FlagZone) -> EntityId {
        let id = zone.id;
        self.zones.insert(id, zone);
        id
    }

    pub fn insert_flag(&mut self, flag: Flag) -> EntityId {
        let id = flag.id;
        self.flags.insert(id, flag);
        id
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(id.entity())
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id.entity())
    }

    /// Read-only per-entity state for the external snapshot/recovery
    /// subsystem. The core never writes durable storage itself.
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            tick: self.tick,
            sim_frames: self.sim_frames,
            players: self
                .players
                .iter()
                .map(|(_, p)| PlayerSnapshot {
                    id: p.id,
                    name: p.name.clone(),
                    ship: p.ship,
                    team: p.team,
                    x: p.pos.x,
                    y: p.pos.y,
                    health: p.health,
                    energy: p.energy,
                    alive: p.alive,
                    kills: p.kills,
                    deaths: p.deaths,
                    score: p.score,
                })
                .collect(),
            missiles: self
                .missiles
                .iter()
                .map(|(id, m)| MissileSnapshot {
                    id,
                    owner: m.owner,
                    x: m.pos.x,
                    y: m.pos.y,
                    distance: m.distance,
                })
                .collect(),
            pickups: self
                .pickups
                .iter()
                .filter(|(_, p)| p.active)
                .map(|(id, p)| PickupSnapshot { id, kind: p.kind, x: p.pos.x, y: p.pos.y })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WorldSnapshot {
    pub tick: u64,
    pub sim_frames: f64,
    pub players: Vec<PlayerSnapshot>,
    pub missiles: Vec<MissileSnapshot>,
    pub pickups: Vec<PickupSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub name: String,
    pub ship: ShipKind,
    pub team: Team,
    pub x: f32,
    pub y: f32,
    pub health: f32,
    pub energy: f32,
    pub alive: bool,
    pub kills: u32,
    pub deaths: u32,
    pub score: u32,
}

#[derive(Debug, Serialize)]
pub struct MissileSnapshot {
    pub id: EntityId,
    pub owner: PlayerId,
    pub x: f32,
    pub y: f32,
    pub distance: f32,
}

#[derive(Debug, Serialize)]
pub struct PickupSnapshot {
    pub id: EntityId,
    pub kind: PickupKind,
    pub x: f32,
    pub y: f32,
}

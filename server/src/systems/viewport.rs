// skystrike/server/src/systems/viewport.rs
//
// Per-client interest management. Each connected player owns a rectangular
// region of interest; every tick the manager recomputes which entities are
// newly visible, still visible or just left visibility, and produces the
// per-connection broadcast set the dispatch layer transmits. Static geometry
// (mountains, zones) is part of the client's map load and never broadcast.
use ahash::{AHashMap, AHashSet};
use smallvec::SmallVec;
use tracing::debug;

use crate::concurrent::spatial_index::{ColliderKind, SpatialIndex};
use crate::core::config::SimConfig;
use crate::core::constants::{DEFAULT_HORIZON_X, DEFAULT_HORIZON_Y};
use crate::core::types::{Aabb, BroadcastReason, BroadcastSet, EntityId, PlayerId, Vec2};
use crate::world::store::World;

pub struct PlayerViewport {
    pub player: PlayerId,
    /// Client-declared horizon (half-extents), before scaling and clamping.
    horizon: Vec2,
    /// Effective half-extents: horizon x scale factor, clamped to the
    /// configured maximum area.
    pub half: Vec2,
    /// Previously-visible set (what the client currently knows about).
    known: AHashSet<EntityId>,
    /// Currently-visible set, rebuilt by each scan.
    current: AHashSet<EntityId>,
    /// Entities pre-seeded into this tick's broadcast (own fired missiles).
    preseeded: AHashSet<EntityId>,
    /// Spectators piggy-backing on this viewport.
    pub subscribers: SmallVec<[PlayerId; 2]>,
    set: BroadcastSet,
}

impl PlayerViewport {
    fn new(player: PlayerId, config: &SimConfig) -> Self {
        let horizon = Vec2::new(DEFAULT_HORIZON_X, DEFAULT_HORIZON_Y);
        PlayerViewport {
            player,
            horizon,
            half: effective_half(horizon, config),
            known: AHashSet::new(),
            current: AHashSet::new(),
            preseeded: AHashSet::new(),
            subscribers: SmallVec::new(),
            set: BroadcastSet::default(),
        }
    }

    pub fn broadcast_set(&self) -> &BroadcastSet {
        &self.set
    }

    pub fn knows(&self, entity: EntityId) -> bool {
        self.known.contains(&entity)
    }
}

fn effective_half(horizon: Vec2, config: &SimConfig) -> Vec2 {
    Vec2::new(
        (horizon.x * config.scale_factor).min(config.max_viewport_x),
        (horizon.y * config.scale_factor).min(config.max_viewport_y),
    )
}

pub struct ViewportManager {
    viewports: AHashMap<PlayerId, PlayerViewport>,
    order: Vec<PlayerId>,
}

impl ViewportManager {
    pub fn new() -> Self {
        ViewportManager { viewports: AHashMap::new(), order: Vec::new() }
    }

    pub fn add_player(&mut self, player: PlayerId, config: &SimConfig) {
        if self.viewports.insert(player, PlayerViewport::new(player, config)).is_none() {
            self.order.push(player);
        }
    }

    pub fn remove_player(&mut self, player: PlayerId) {
        self.viewports.remove(&player);
        self.order.retain(|existing| *existing != player);
        for viewport in self.viewports.values_mut() {
            viewport.subscribers.retain(|subscriber| *subscriber != player);
        }
    }

    pub fn viewport(&self, player: PlayerId) -> Option<&PlayerViewport> {
        self.viewports.get(&player)
    }

    pub fn len(&self) -> usize {
        self.viewports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.viewports.is_empty()
    }

    /// Apply a client-declared horizon, clamped to the server maximum.
    pub fn set_horizon(&mut self, player: PlayerId, width: f32, height: f32, config: &SimConfig) {
        if let Some(viewport) = self.viewports.get_mut(&player) {
            viewport.horizon = Vec2::new(width.max(1.0), height.max(1.0));
            viewport.half = effective_half(viewport.horizon, config);
        }
    }

    /// One-time recomputation of every viewport's bounds after a scale-factor
    /// change.
    pub fn recompute_bounds(&mut self, config: &SimConfig) {
        for viewport in self.viewports.values_mut() {
            viewport.half = effective_half(viewport.horizon, config);
        }
        debug!(
            "Viewport bounds recomputed for {} players (scale factor {})",
            self.viewports.len(),
            config.scale_factor
        );
    }

    pub fn subscribe(&mut self, spectator: PlayerId, host: PlayerId) {
        // A spectator follows at most one host.
        self.unsubscribe(spectator);
        if let Some(viewport) = self.viewports.get_mut(&host) {
            if !viewport.subscribers.contains(&spectator) {
                viewport.subscribers.push(spectator);
            }
        }
    }

    pub fn unsubscribe(&mut self, spectator: PlayerId) {
        for viewport in self.viewports.values_mut() {
            viewport.subscribers.retain(|existing| *existing != spectator);
        }
        // The spectator's own sets restart from scratch on the next scan.
        if let Some(viewport) = self.viewports.get_mut(&spectator) {
            viewport.known.clear();
        }
    }

    /// Clear per-tick state. Runs before the physics pipeline so weapon fire
    /// can pre-seed.
    pub fn begin_tick(&mut self) {
        for viewport in self.viewports.values_mut() {
            viewport.set.clear();
            viewport.preseeded.clear();
        }
    }

    /// Pre-seed a just-fired missile into the firing player's broadcast
    /// state, so observers already tracking the shooter never receive a
    /// projectile with no prior existence record.
    pub fn preseed(&mut self, owner: PlayerId, entity: EntityId) {
        if let Some(viewport) = self.viewports.get_mut(&owner) {
            viewport.set.insert(entity, BroadcastReason::FirstSeen);
            viewport.known.insert(entity);
            viewport.preseeded.insert(entity);
        }
    }

    /// Recompute visibility for every connected player and fill the broadcast
    /// sets. Read-only over world and index; expired pickups observed during
    /// the scan are returned as a batch for the caller to apply afterwards —
    /// never mutated mid-scan.
    pub fn scan(&mut self, world: &World, spatial: &SpatialIndex) -> Vec<EntityId> {
        let now = world.sim_frames;
        let mut expired: Vec<EntityId> = Vec::new();

        for pid in self.order.clone() {
            let Some(player) = world.player(pid) else { continue };

            // Spectators piggy-back on the host's sets at finish_tick.
            if let Some(host) = player.spectating {
                if host != pid && self.viewports.contains_key(&host) {
                    continue;
                }
            }

            let center = player
                .spectating
                .and_then(|host| world.player(host))
                .map(|host| host.pos)
                .unwrap_or(player.pos);

            let Some(viewport) = self.viewports.get_mut(&pid) else { continue };
            let rect = Aabb::around(center, viewport.half.x, viewport.half.y);
            let candidates = spatial.query_aabb(&rect);

            viewport.current.clear();
            for candidate in candidates {
                let Some(shape) = spatial.shape(candidate) else { continue };
                match shape.kind {
                    ColliderKind::Player if candidate != pid.entity() => {
                        // Stealthed enemies are withheld; teammates still see
                        // them.
                        match world.players.get(candidate) {
                            Some(other) if other.stealthed && other.team != player.team => continue,
                            Some(_) => {}
                            None => continue,
                        }
                    }
                    ColliderKind::Pickup => {
                        if let Some(pickup) = world.pickups.get(candidate) {
                            if pickup.active && pickup.expired(now) {
                                expired.push(candidate);
                            }
                        }
                    }
                    _ => {}
                }
                viewport.current.insert(candidate);
            }

            // Entering / still-visible.
            for &entity in viewport.current.iter() {
                if viewport.known.contains(&entity) {
                    // Ongoing state: only moving kinds need a delta; an
                    // already-known pickup or flag is not re-broadcast.
                    let moving = matches!(
                        spatial.shape(entity).map(|shape| shape.kind),
                        Some(ColliderKind::Player) | Some(ColliderKind::Missile)
                    );
                    if moving {
                        viewport.set.entry(entity).or_insert(BroadcastReason::Update);
                    }
                } else {
                    viewport.set.insert(entity, BroadcastReason::FirstSeen);
                }
            }

            // Leaving: previously-visible minus currently-visible. An entity
            // pre-seeded (announced) this same tick is never simultaneously
            // reported as leaving.
            for &entity in viewport.known.iter() {
                if !viewport.current.contains(&entity)
                    && viewport.set.get(&entity) != Some(&BroadcastReason::FirstSeen)
                {
                    viewport.set.insert(entity, BroadcastReason::LeftView);
                }
            }
        }

        expired.sort_unstable();
        expired.dedup();
        expired
    }

    /// Announce an entity's destruction to every observer that tracked it.
    /// Overrides any other reason already recorded this tick, so a client is
    /// never told both "left view" and "despawned" for the same entity.
    pub fn broadcast_despawn(&mut self, entity: EntityId) {
        for viewport in self.viewports.values_mut() {
            let was_known = viewport.known.remove(&entity);
            let was_current = viewport.current.remove(&entity);
            let was_preseeded = viewport.preseeded.remove(&entity);
            let was_announced = viewport.set.contains_key(&entity);
            if was_known || was_current || was_preseeded || was_announced {
                viewport.set.insert(entity, BroadcastReason::Despawned);
            }
        }
    }

    /// Promote currently-visible to previously-visible and mirror each host's
    /// outputs to its spectators. Runs at the end of the tick, after all
    /// despawn broadcasts.
    pub fn finish_tick(&mut self) {
        for viewport in self.viewports.values_mut() {
            let mut known = std::mem::take(&mut viewport.current);
            known.extend(viewport.preseeded.iter().copied());
            viewport.known = known;
        }

        let mut copies: Vec<(PlayerId, BroadcastSet, AHashSet<EntityId>)> = Vec::new();
        for viewport in self.viewports.values() {
            for subscriber in &viewport.subscribers {
                copies.push((*subscriber, viewport.set.clone(), viewport.known.clone()));
            }
        }
        for (subscriber, set, known) in copies {
            if let Some(viewport) = self.viewports.get_mut(&subscriber) {
                viewport.set = set;
                viewport.known = known;
            }
        }
    }
}

impl Default for ViewportManager {
    fn default() -> Self {
        Self::new()
    }
}

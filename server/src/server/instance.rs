// skystrike/server/src/server/instance.rs
use dashmap::DashMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace};

use crate::concurrent::event_bus::EventBus;
use crate::concurrent::intent_queue::{IntentQueue, IntentSender};
use crate::concurrent::spatial_index::{ColliderKind, SpatialIndex, SpatialShape};
use crate::concurrent::static_index::StaticIndex;
use crate::core::config::{SharedConfig, SimConfig};
use crate::core::constants::{
    AFK_TIMEOUT, LAG_WARNING, RESPAWN_DELAY_FRAMES, SPATIAL_INDEX_CELL_SIZE,
};
use crate::core::error::SimResult;
use crate::core::ticker::Tick;
use crate::core::types::{
    BroadcastSet, GameEvent, PlayerId, PlayerIntent, ShipKind, Team, Vec2,
};
use crate::entities::player::Player;
use crate::systems::{collision, physics, pickups};
use crate::systems::viewport::ViewportManager;
use crate::world::hitbox::{HitboxCache, HullKind};
use crate::world::map::MapGenerator;
use crate::world::store::{World, WorldSnapshot};

/// The simulation core: one owned world, one spatial pipeline, one viewport
/// layer, driven single-threaded by the ticker. The concurrent members
/// (intent queue, liveness stamps, shared config) are the only structures the
/// connection layer touches from other threads; everything else is mutated
/// exclusively inside `run_tick`.
pub struct ArenaServer {
    config: SharedConfig,
    applied_generation: u64,

    pub world: World,
    pub spatial: SpatialIndex,
    pub statics: StaticIndex,
    pub hitboxes: HitboxCache,
    pub viewports: ViewportManager,
    pub events: EventBus,

    intents: IntentQueue,
    liveness: Arc<DashMap<PlayerId, Instant>>,
    rng: StdRng,
    timed_out: Vec<PlayerId>,
}

impl ArenaServer {
    /// Startup warmup: validate the physics tables, build the arena, the
    /// static index and the hitbox cache. Refuses to start on any
    /// configuration invariant violation.
    pub fn new(config: SharedConfig) -> SimResult<Self> {
        let cfg = config.load_full();
        cfg.validate()?;

        let mut world = World::new();
        let min_obstacle_radius = MapGenerator::populate_standard(&mut world)?;
        cfg.validate_against_scale(min_obstacle_radius)?;

        let statics = StaticIndex::build(&world);
        let hitboxes = HitboxCache::warm_up();
        let mut spatial = SpatialIndex::new(&cfg.bounds, SPATIAL_INDEX_CELL_SIZE);

        // Flags are dynamic colliders (interest-managed, touchable), seeded
        // from the map.
        for (id, flag) in world.flags.iter() {
            spatial.insert(SpatialShape {
                entity: id,
                kind: ColliderKind::Flag,
                hull: HullKind::Flag,
                pos: flag.pos,
                sin: 0.0,
                cos: 1.0,
                aabb: hitboxes.aabb(HullKind::Flag, 0, flag.pos),
                team: flag.team,
                owner: None,
                active: true,
            });
        }

        let generation = cfg.generation;
        info!(
            "Arena server warmed up: {} mountains, {} zones, tick rate {}",
            world.mountains.len(),
            world.zones.len(),
            cfg.tick_rate
        );

        Ok(ArenaServer {
            config,
            applied_generation: generation,
            world,
            spatial,
            statics,
            hitboxes,
            viewports: ViewportManager::new(),
            events: EventBus::new(),
            intents: IntentQueue::new(),
            liveness: Arc::new(DashMap::new()),
            rng: StdRng::from_entropy(),
            timed_out: Vec::new(),
        })
    }

    // --- Boundary handles for the connection layer ---

    pub fn intent_sender(&self) -> IntentSender {
        self.intents.sender()
    }

    /// Activity stamps; the connection layer refreshes these on every decoded
    /// message.
    pub fn liveness_handle(&self) -> Arc<DashMap<PlayerId, Instant>> {
        self.liveness.clone()
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    /// Per-connection broadcast set produced by the last completed tick.
    pub fn broadcast_set(&self, player: PlayerId) -> Option<&BroadcastSet> {
        self.viewports.viewport(player).map(|viewport| viewport.broadcast_set())
    }

    /// Players whose last activity stamp exceeded the AFK timeout as of the
    /// last tick. The embedder decides whether to disconnect them.
    pub fn timed_out_players(&self) -> &[PlayerId] {
        &self.timed_out
    }

    pub fn on_event<F>(&mut self, name: &str, handler: F)
    where
        F: FnMut(&GameEvent) + Send + 'static,
    {
        self.events.register(name, handler);
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        self.world.snapshot()
    }

    // --- Player lifecycle ---

    /// Register a player: world store, spatial index and viewport in the same
    /// step. A team of 0 auto-balances.
    pub fn add_player(&mut self, name: &str, ship: ShipKind, team: Team) -> PlayerId {
        let cfg = self.config.load_full();
        let team = if team == 0 { self.balanced_team() } else { team };
        let pos = MapGenerator::spawn_position(team, &mut self.rng);
        let id = PlayerId(self.world.allocate_id());
        let player = Player::new(id, name.to_string(), ship, team, pos);

        let hull = HullKind::Ship(ship);
        self.spatial.insert(SpatialShape {
            entity: id.entity(),
            kind: ColliderKind::Player,
            hull,
            pos,
            sin: player.rot.sin(),
            cos: player.rot.cos(),
            aabb: self.hitboxes.aabb(hull, player.rot.bucket(), pos),
            team,
            owner: None,
            active: true,
        });
        self.world.insert_player(player);
        self.viewports.add_player(id, &cfg);
        self.liveness.insert(id, Instant::now());
        self.events.push(GameEvent::PlayerJoined { player: id });
        info!("Player {:?} '{}' joined team {} as {:?}", id, name, team, ship);
        id
    }

    fn balanced_team(&self) -> Team {
        let mut team1 = 0usize;
        let mut team2 = 0usize;
        for (_, player) in self.world.players.iter() {
            match player.team {
                1 => team1 += 1,
                2 => team2 += 1,
                _ => {}
            }
        }
        if team1 <= team2 {
            1
        } else {
            2
        }
    }

    /// Deregister from every structure that references the player, in one
    /// step: world store, spatial index, viewport layer, liveness stamps.
    pub fn remove_player(&mut self, id: PlayerId) {
        if self.world.remove_player(id).is_none() {
            debug!("remove_player: {:?} was not registered", id);
            return;
        }
        self.spatial.remove(id.entity());
        self.viewports.broadcast_despawn(id.entity());
        self.viewports.remove_player(id);
        self.liveness.remove(&id);
        // Spectators following this player fall back to their own viewport.
        self.world.players.for_each_mut(|_, player| {
            if player.spectating == Some(id) {
                player.spectating = None;
            }
        });
        self.events.push(GameEvent::PlayerLeft { player: id });
        info!("Player {:?} left", id);
    }

    /// Change a player's team, mirroring the new team onto the cached spatial
    /// shape — the narrow-phase resolver reads the shape's copy. Missiles
    /// already in flight keep their fire-time team.
    pub fn set_player_team(&mut self, id: PlayerId, team: Team) {
        if let Some(player) = self.world.player_mut(id) {
            player.team = team;
            self.spatial.set_team(id.entity(), team);
            debug!("Player {:?} switched to team {}", id, team);
        }
    }

    /// Respawn a dead player at their team spawn area. Typically invoked by
    /// the game-mode layer in response to a `RespawnRequest` event.
    pub fn respawn_player(&mut self, id: PlayerId) {
        let Some(team) = self.world.player(id).map(|p| p.team) else { return };
        let pos = MapGenerator::spawn_position(team, &mut self.rng);
        let Some(player) = self.world.player_mut(id) else { return };
        player.respawn(pos);
        let (bucket, sin, cos, hull_kind) =
            (player.rot.bucket(), player.rot.sin(), player.rot.cos(), HullKind::Ship(player.ship));
        self.viewports.unsubscribe(id);
        self.spatial.set_active(id.entity(), true);
        self.spatial.set_state(id.entity(), pos, sin, cos, self.hitboxes.aabb(hull_kind, bucket, pos));
    }

    /// Make `spectator` piggy-back on `host`'s viewport, or return to their
    /// own with `None`.
    pub fn spectate(&mut self, spectator: PlayerId, host: Option<PlayerId>) {
        match host {
            Some(host) if host != spectator && self.world.player(host).is_some() => {
                if let Some(player) = self.world.player_mut(spectator) {
                    player.spectating = Some(host);
                }
                self.viewports.subscribe(spectator, host);
            }
            _ => {
                if let Some(player) = self.world.player_mut(spectator) {
                    player.spectating = None;
                }
                self.viewports.unsubscribe(spectator);
            }
        }
    }

    // --- The tick ---

    /// One complete simulation tick. Runs to completion; there is no mid-tick
    /// cancellation. Order: intents -> physics (players, fire, missiles) ->
    /// pickup scatter -> collision phases 1-5 -> respawn requests ->
    /// liveness -> broadcast finalization -> event fan-out.
    pub fn run_tick(&mut self, tick: Tick) {
        let cfg = self.config.load_full();
        if cfg.generation != self.applied_generation {
            // Scale factor changed at runtime: one-time viewport bounds
            // recomputation for every connected player.
            self.viewports.recompute_bounds(&cfg);
            self.applied_generation = cfg.generation;
        }
        self.world.tick = tick.tick;

        self.viewports.begin_tick();

        for intent in self.intents.drain() {
            self.apply_intent(intent, &cfg);
        }

        let fired = physics::players::update_players(
            &mut self.world,
            &mut self.spatial,
            &self.hitboxes,
            &cfg,
            tick.frame_factor,
        );
        for missile in &fired {
            self.viewports.preseed(missile.owner, missile.id);
        }

        let despawned = physics::projectiles::update_missiles(
            &mut self.world,
            &mut self.spatial,
            &self.hitboxes,
            &cfg,
            tick.frame_factor,
        );
        for id in despawned {
            self.viewports.broadcast_despawn(id);
        }

        // Simulated time advances by the frame factor, never by wall clock.
        self.world.sim_frames += tick.frame_factor;

        pickups::maintain(&mut self.world, &mut self.spatial, &self.statics, &cfg, &mut self.rng);

        collision::run(
            &mut self.world,
            &mut self.spatial,
            &self.statics,
            &mut self.viewports,
            &mut self.events,
            &self.hitboxes,
            &cfg,
        );

        self.collect_respawn_requests();
        self.evaluate_liveness();

        self.viewports.finish_tick();
        self.events.drain();
    }

    fn apply_intent(&mut self, intent: PlayerIntent, cfg: &SimConfig) {
        match intent {
            PlayerIntent::Key { player, key, pressed } => {
                self.liveness.insert(player, Instant::now());
                if let Some(state) = self.world.player_mut(player) {
                    state.keys.apply(key, pressed);
                } else {
                    trace!("Key intent for unknown player {:?}", player);
                }
            }
            PlayerIntent::Horizon { player, width, height } => {
                self.viewports.set_horizon(player, width, height, cfg);
            }
            PlayerIntent::Spectate { player, target } => {
                self.spectate(player, target);
            }
        }
    }

    /// A dead player pressing any key after the respawn delay raises one
    /// `RespawnRequest` for the game-mode layer.
    fn collect_respawn_requests(&mut self) {
        let now = self.world.sim_frames;
        let mut requests = Vec::new();
        self.world.players.for_each_mut(|raw, player| {
            if player.alive || player.respawn_requested || !player.keys.any() {
                return;
            }
            if let Some(died_at) = player.died_at_frame {
                if now - died_at >= RESPAWN_DELAY_FRAMES {
                    player.respawn_requested = true;
                    requests.push(PlayerId(raw));
                }
            }
        });
        for player in requests {
            self.events.push(GameEvent::RespawnRequest { player });
        }
    }

    /// Client liveness: one cheap comparison per player per tick against the
    /// cached last-activity stamps. No per-connection timers.
    fn evaluate_liveness(&mut self) {
        let now = Instant::now();
        self.timed_out.clear();
        for (raw, _) in self.world.players.iter() {
            let pid = PlayerId(raw);
            if let Some(stamp) = self.liveness.get(&pid) {
                let idle = now.saturating_duration_since(*stamp.value());
                if idle >= AFK_TIMEOUT {
                    self.timed_out.push(pid);
                } else if idle >= LAG_WARNING {
                    trace!("Player {:?} idle for {:?}", pid, idle);
                }
            }
        }
    }

    /// Spawn position helper exposed for game modes that place players
    /// explicitly (tests included).
    pub fn place_player(&mut self, id: PlayerId, pos: Vec2) {
        let Some(player) = self.world.player_mut(id) else { return };
        player.pos = pos;
        let (bucket, sin, cos, hull_kind) =
            (player.rot.bucket(), player.rot.sin(), player.rot.cos(), HullKind::Ship(player.ship));
        self.spatial.set_state(id.entity(), pos, sin, cos, self.hitboxes.aabb(hull_kind, bucket, pos));
    }
}

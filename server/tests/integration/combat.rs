// skystrike/server/tests/integration/combat.rs
//
// Narrow-phase outcomes across whole server ticks: team short-circuits,
// double-death protection, projectile lifecycle, repel, bounces and zone
// crossings.

use parking_lot::Mutex;
use std::sync::Arc;

use skystrike_server_core::concurrent::spatial_index::{ColliderKind, SpatialShape};
use skystrike_server_core::core::config::{self, SimConfig};
use skystrike_server_core::core::ticker::Tick;
use skystrike_server_core::core::types::{
    EntityId, GameEvent, MissileKind, PlayerId, Rotation, ShipKind, Vec2,
};
use skystrike_server_core::entities::projectile::Missile;
use skystrike_server_core::server::instance::ArenaServer;
use skystrike_server_core::world::hitbox::HullKind;

type EventLog = Arc<Mutex<Vec<GameEvent>>>;

fn setup_server_with_log() -> (ArenaServer, EventLog) {
    let shared = config::shared(SimConfig::default());
    let mut server = ArenaServer::new(shared).expect("server warmup must succeed");
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    server.on_event("capture", move |event| sink.lock().push(event.clone()));
    (server, log)
}

fn tick(n: u64, frame_factor: f64) -> Tick {
    Tick { tick: n, frame_factor }
}

fn add_parked_player(server: &mut ArenaServer, name: &str, ship: ShipKind, team: u8, pos: Vec2) -> PlayerId {
    let id = server.add_player(name, ship, team);
    server.place_player(id, pos);
    id
}

/// Spawn a slow missile directly, registered into the world store and spatial
/// index the way the fire path does it.
fn spawn_missile(
    server: &mut ArenaServer,
    kind: MissileKind,
    owner: PlayerId,
    team: u8,
    pos: Vec2,
) -> EntityId {
    let id = server.world.allocate_id();
    let rot = Rotation::new(0.0);
    let missile = Missile::new(id, kind, owner, team, pos, rot, 0.0, server.world.sim_frames);
    let hull = HullKind::Missile(kind);
    let aabb = server.hitboxes.aabb(hull, rot.bucket(), pos);
    server.spatial.insert(SpatialShape {
        entity: id,
        kind: ColliderKind::Missile,
        hull,
        pos,
        sin: rot.sin(),
        cos: rot.cos(),
        aabb,
        team,
        owner: Some(owner),
        active: true,
    });
    server.world.insert_missile(missile);
    id
}

fn hits(log: &EventLog) -> Vec<(EntityId, PlayerId)> {
    log.lock()
        .iter()
        .filter_map(|event| match event {
            GameEvent::Hit { missile, target, .. } => Some((*missile, *target)),
            _ => None,
        })
        .collect()
}

#[test]
fn same_team_missile_never_collides_enemy_missile_hits_once() {
    let (mut server, log) = setup_server_with_log();
    // Two same-team players with overlapping hitboxes.
    let p1 = add_parked_player(&mut server, "ally_one", ShipKind::Raptor, 1, Vec2::new(3000.0, 3000.0));
    let p2 = add_parked_player(&mut server, "ally_two", ShipKind::Raptor, 1, Vec2::new(3020.0, 3000.0));
    // A friendly missile between them, and an enemy one from a third team.
    let friendly = spawn_missile(&mut server, MissileKind::Standard, p2, 1, Vec2::new(3010.0, 3000.0));
    let hostile = spawn_missile(&mut server, MissileKind::Standard, PlayerId(9999), 3, Vec2::new(3010.0, 3002.0));

    server.run_tick(tick(1, 1.0));

    let recorded = hits(&log);
    assert_eq!(recorded.len(), 1, "expected exactly one hit, got {:?}", recorded);
    assert_eq!(recorded[0].0, hostile, "only the enemy missile may collide");
    assert!(
        server.world.missiles.get(friendly).is_some(),
        "same-team missile must pass through untouched"
    );
    assert!(server.world.missiles.get(hostile).is_none(), "enemy missile is consumed on impact");
    let survivor = if recorded[0].1 == p1 { p2 } else { p1 };
    assert!(server.world.player(survivor).unwrap().alive);
}

#[test]
fn player_at_minimum_health_processes_no_further_missiles() {
    let (mut server, log) = setup_server_with_log();
    let victim = add_parked_player(&mut server, "victim", ShipKind::Raptor, 1, Vec2::new(3000.0, 3000.0));
    let killer = add_parked_player(&mut server, "killer", ShipKind::Raptor, 2, Vec2::new(4000.0, 4000.0));
    server.world.player_mut(victim).unwrap().health = 0.3;

    // Two lethal missiles overlapping the victim in the same tick.
    let first = spawn_missile(&mut server, MissileKind::Standard, killer, 2, Vec2::new(3000.0, 3002.0));
    let second = spawn_missile(&mut server, MissileKind::Standard, killer, 2, Vec2::new(3002.0, 3000.0));

    server.run_tick(tick(1, 1.0));

    let recorded = hits(&log);
    assert_eq!(recorded.len(), 1, "second missile must not be processed after death");
    assert_eq!(recorded[0].0, first, "candidates resolve in id order");
    assert!(server.world.missiles.get(second).is_some(), "unprocessed missile survives the tick");

    let kills: Vec<_> = log
        .lock()
        .iter()
        .filter(|event| matches!(event, GameEvent::Kill { .. }))
        .cloned()
        .collect();
    assert_eq!(kills.len(), 1, "exactly one kill event");
    assert!(!server.world.player(victim).unwrap().alive);
    assert_eq!(server.world.player(killer).unwrap().kills, 1);
}

#[test]
fn shielded_player_survives_a_lethal_missile() {
    let (mut server, log) = setup_server_with_log();
    let victim = add_parked_player(&mut server, "shielded", ShipKind::Raptor, 1, Vec2::new(3000.0, 3000.0));
    {
        let sim_frames = server.world.sim_frames;
        let player = server.world.player_mut(victim).unwrap();
        player.powerups.shield_until = Some(sim_frames + 600.0);
        player.health = 0.1;
    }
    spawn_missile(&mut server, MissileKind::Heavy, PlayerId(9999), 2, Vec2::new(3000.0, 3002.0));

    server.run_tick(tick(1, 1.0));

    assert_eq!(hits(&log).len(), 1, "the hit still registers");
    let player = server.world.player(victim).unwrap();
    assert!(player.alive, "shield must absorb the damage");
    // Health regeneration still ticks; only missile damage is absorbed.
    assert!((player.health - 0.1).abs() < 0.01);
}

#[test]
fn missile_despawns_at_max_range_and_observers_are_told() {
    let (mut server, _log) = setup_server_with_log();
    let observer = add_parked_player(&mut server, "watcher", ShipKind::Raptor, 1, Vec2::new(3000.0, 3000.0));
    let missile = spawn_missile(&mut server, MissileKind::Standard, PlayerId(9999), 2, Vec2::new(3300.0, 3000.0));

    server.run_tick(tick(1, 1.0));
    assert!(server.broadcast_set(observer).unwrap().contains_key(&missile));

    // Push the accumulated distance to the cap; the next tick's compensated
    // delta crosses it.
    server.world.missiles.get_mut(missile).unwrap().distance = 1399.9;
    server.run_tick(tick(2, 1.0));

    assert!(server.world.missiles.get(missile).is_none(), "missile must despawn at range");
    assert!(!server.spatial.contains(missile));
    let set = server.broadcast_set(observer).unwrap();
    assert_eq!(
        set.get(&missile),
        Some(&skystrike_server_core::core::types::BroadcastReason::Despawned)
    );
}

#[test]
fn repel_pushes_enemy_players_and_redirects_missiles() {
    let (mut server, _log) = setup_server_with_log();
    let caster = add_parked_player(&mut server, "bulwark", ShipKind::Juggernaut, 1, Vec2::new(3000.0, 3000.0));
    let enemy = add_parked_player(&mut server, "pusher_target", ShipKind::Raptor, 2, Vec2::new(3100.0, 3000.0));
    let incoming = spawn_missile(&mut server, MissileKind::Standard, enemy, 2, Vec2::new(3080.0, 3000.0));

    server.world.player_mut(caster).unwrap().keys.special = true;
    server.run_tick(tick(1, 1.0));

    let pushed = server.world.player(enemy).unwrap();
    assert!(pushed.vel.v.x > 4.0, "enemy must be pushed away along +x, got {:?}", pushed.vel.v);

    if let Some(missile) = server.world.missiles.get(incoming) {
        assert!(missile.vel.v.x > 0.0, "missile must be redirected away from the caster");
    }

    let caster_state = server.world.player(caster).unwrap();
    assert!(caster_state.energy < 0.6, "repel must cost energy");
}

#[test]
fn bounce_reflects_velocity_off_a_mountain() {
    let (mut server, log) = setup_server_with_log();
    // The central ridge has a mountain at the origin.
    let pilot = add_parked_player(&mut server, "rammer", ShipKind::Raptor, 1, Vec2::new(170.0, 0.0));
    server.world.player_mut(pilot).unwrap().vel.v = Vec2::new(-2.0, 0.0);

    server.run_tick(tick(1, 1.0));

    let player = server.world.player(pilot).unwrap();
    assert!(player.vel.v.x > 0.0, "velocity must reflect off the contact normal");
    let bounced = log
        .lock()
        .iter()
        .any(|event| matches!(event, GameEvent::Bounce { player, .. } if *player == pilot));
    assert!(bounced, "bounce event must be emitted");
}

#[test]
fn zone_crossings_fire_once_per_enter_and_leave() {
    let (mut server, log) = setup_server_with_log();
    let runner = add_parked_player(&mut server, "flag_runner", ShipKind::Wasp, 2, Vec2::new(3000.0, 3000.0));

    server.run_tick(tick(1, 1.0));
    server.place_player(runner, Vec2::new(-13000.0, 0.0));
    server.run_tick(tick(2, 1.0));
    server.run_tick(tick(3, 1.0));
    server.place_player(runner, Vec2::new(3000.0, 3000.0));
    server.run_tick(tick(4, 1.0));

    let crossings: Vec<(bool,)> = log
        .lock()
        .iter()
        .filter_map(|event| match event {
            GameEvent::ZoneCross { player, entered, .. } if *player == runner => Some((*entered,)),
            _ => None,
        })
        .collect();
    assert_eq!(crossings, vec![(true,), (false,)], "one enter and one leave, in order");
}

#[test]
fn kill_awards_score_and_respawn_restores_the_player() {
    let (mut server, log) = setup_server_with_log();
    let victim = add_parked_player(&mut server, "doomed", ShipKind::Raptor, 1, Vec2::new(3000.0, 3000.0));
    let killer = add_parked_player(&mut server, "scorer", ShipKind::Raptor, 2, Vec2::new(4000.0, 4000.0));
    server.world.player_mut(victim).unwrap().health = 0.1;
    spawn_missile(&mut server, MissileKind::Standard, killer, 2, Vec2::new(3000.0, 3002.0));

    server.run_tick(tick(1, 1.0));
    assert!(!server.world.player(victim).unwrap().alive);
    assert_eq!(server.world.player(killer).unwrap().score, 25);
    assert!(log.lock().iter().any(|event| matches!(event, GameEvent::Kill { .. })));

    server.respawn_player(victim);
    let revived = server.world.player(victim).unwrap();
    assert!(revived.alive);
    assert!((revived.health - 1.0).abs() < f32::EPSILON);
    assert_eq!(revived.deaths, 1);

    // Dead-state bookkeeping is gone; the revived player collides again.
    server.run_tick(tick(2, 1.0));
    assert!(server.world.player(victim).unwrap().alive);
}

#[test]
fn team_change_is_mirrored_onto_the_cached_shape() {
    let (mut server, log) = setup_server_with_log();
    let turncoat = add_parked_player(&mut server, "turncoat", ShipKind::Raptor, 1, Vec2::new(3000.0, 3000.0));
    // A missile from team 2 overlapping the player.
    spawn_missile(&mut server, MissileKind::Standard, PlayerId(9999), 2, Vec2::new(3000.0, 3002.0));

    // Switch to team 2 before the tick: the narrow phase reads the shape's
    // cached team and must now short-circuit the collision.
    server.set_player_team(turncoat, 2);
    server.run_tick(tick(1, 1.0));

    assert!(hits(&log).is_empty(), "same-team after switch: no collision event");
    assert!(server.world.player(turncoat).unwrap().alive);
}

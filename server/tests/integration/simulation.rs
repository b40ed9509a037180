// skystrike/server/tests/integration/simulation.rs
//
// Frame-factor behavior of the whole pipeline: sub-stepping conservation,
// runtime scale-factor swaps, snapshots and the tick orchestration itself.

use skystrike_server_core::core::config::{self, SimConfig};
use skystrike_server_core::core::ticker::Tick;
use skystrike_server_core::core::types::{PlayerId, ShipKind, Vec2};
use skystrike_server_core::server::instance::ArenaServer;

fn setup_server() -> ArenaServer {
    let shared = config::shared(SimConfig::default());
    ArenaServer::new(shared).expect("server warmup must succeed")
}

fn tick(n: u64, frame_factor: f64) -> Tick {
    Tick { tick: n, frame_factor }
}

/// Add a player parked at a quiet spot away from terrain and the zones.
fn add_parked_player(server: &mut ArenaServer, name: &str, team: u8, pos: Vec2) -> PlayerId {
    let id = server.add_player(name, ShipKind::Raptor, team);
    server.place_player(id, pos);
    id
}

#[test]
fn frame_factor_conservation_for_constant_thrust() {
    // A player holding forward across ticks whose factors sum to F must end
    // up where a unit-tick sequence summing to F ends up.
    let mut server_a = setup_server();
    let a = add_parked_player(&mut server_a, "unit", 1, Vec2::new(3000.0, 3000.0));
    server_a.world.player_mut(a).unwrap().keys.up = true;

    let mut server_b = setup_server();
    let b = add_parked_player(&mut server_b, "coalesced", 1, Vec2::new(3000.0, 3000.0));
    server_b.world.player_mut(b).unwrap().keys.up = true;

    for n in 0..10u64 {
        server_a.run_tick(tick(n + 1, 1.0));
    }
    let mut n = 0;
    for factor in [1.0, 1.0, 2.5, 1.5, 4.0] {
        n += 1;
        server_b.run_tick(tick(n, factor));
    }

    let pos_a = server_a.world.player(a).unwrap().pos;
    let pos_b = server_b.world.player(b).unwrap().pos;
    assert!(
        (pos_a.x - pos_b.x).abs() < 1e-2 && (pos_a.y - pos_b.y).abs() < 1e-2,
        "unit ticks ended at ({}, {}), coalesced at ({}, {})",
        pos_a.x,
        pos_a.y,
        pos_b.x,
        pos_b.y
    );
}

#[test]
fn coalesced_tick_matches_explicit_substep_sequence() {
    // frameFactor = 3.4 is three full sub-steps plus a 0.4 remainder; the
    // displacement must match running those factors as separate ticks.
    let mut server_a = setup_server();
    let a = add_parked_player(&mut server_a, "one_shot", 1, Vec2::new(3000.0, 3000.0));
    server_a.world.player_mut(a).unwrap().keys.up = true;

    let mut server_b = setup_server();
    let b = add_parked_player(&mut server_b, "stepped", 1, Vec2::new(3000.0, 3000.0));
    server_b.world.player_mut(b).unwrap().keys.up = true;

    server_a.run_tick(tick(1, 3.4));
    let mut n = 0;
    for factor in [1.0, 1.0, 1.0, 0.4] {
        n += 1;
        server_b.run_tick(tick(n, factor));
    }

    let pos_a = server_a.world.player(a).unwrap().pos;
    let pos_b = server_b.world.player(b).unwrap().pos;
    assert!((pos_a.x - pos_b.x).abs() < 1e-2);
    assert!((pos_a.y - pos_b.y).abs() < 1e-2);
}

#[test]
fn velocity_approaches_max_speed_and_never_exceeds_it() {
    // Ship scenario from the physics tables: maxSpeed 5.5, accelFactor 0.225.
    let mut server = setup_server();
    let id = add_parked_player(&mut server, "speedster", 1, Vec2::new(3000.0, 3000.0));
    server.world.player_mut(id).unwrap().keys.up = true;

    let mut previous = 0.0f32;
    for n in 0..120u64 {
        server.run_tick(tick(n + 1, 1.0));
        let speed = server.world.player(id).unwrap().vel.speed();
        assert!(speed <= 5.5 + 1e-4, "tick {}: speed {} above max", n, speed);
        assert!(speed + 1e-4 >= previous, "speed fell while thrusting");
        previous = speed;
    }
    assert!((previous - 5.5).abs() < 1e-3, "terminal speed {}", previous);
}

#[test]
fn simulated_time_advances_by_frame_factor() {
    let mut server = setup_server();
    server.run_tick(tick(1, 1.0));
    server.run_tick(tick(2, 3.4));
    assert!((server.world.sim_frames - 4.4).abs() < 1e-9);
    assert_eq!(server.world.tick, 2);
}

#[test]
fn runtime_scale_factor_change_recomputes_viewports_once() {
    let shared = config::shared(SimConfig::default());
    let mut server = ArenaServer::new(shared.clone()).unwrap();
    let id = server.add_player("zoomer", ShipKind::Wasp, 1);

    server.run_tick(tick(1, 1.0));
    let before = server.viewports.viewport(id).unwrap().half;

    config::set_scale_factor(&shared, 2.0);
    server.run_tick(tick(2, 1.0));
    let after = server.viewports.viewport(id).unwrap().half;

    assert!(after.x > before.x && after.y > before.y);
    let cfg = shared.load();
    assert!(after.x <= cfg.max_viewport_x && after.y <= cfg.max_viewport_y);
}

#[test]
fn snapshot_exposes_score_relevant_state() {
    let mut server = setup_server();
    let id = add_parked_player(&mut server, "snap", 2, Vec2::new(3000.0, -3000.0));
    server.run_tick(tick(1, 1.0));

    let snapshot = server.snapshot();
    let entry = snapshot.players.iter().find(|p| p.id == id).expect("player in snapshot");
    assert_eq!(entry.team, 2);
    assert!(entry.alive);
    assert!(serde_json::to_string(&snapshot).is_ok());
}

#[test]
fn missing_physics_table_refuses_startup() {
    let mut broken = SimConfig::default();
    broken.ships.remove(&ShipKind::Ghost);
    let shared = config::shared(broken);
    assert!(ArenaServer::new(shared).is_err(), "partial physics tables must be fatal");
}

#[test]
fn timed_out_players_are_reported() {
    let mut server = setup_server();
    let id = add_parked_player(&mut server, "afk", 1, Vec2::new(3000.0, 3000.0));

    let liveness = server.liveness_handle();
    if let Some(stale) =
        std::time::Instant::now().checked_sub(std::time::Duration::from_secs(500))
    {
        liveness.insert(id, stale);
        server.run_tick(tick(1, 1.0));
        assert!(server.timed_out_players().contains(&id));
    }
}

#[test]
fn intents_feed_key_state_through_the_queue() {
    use skystrike_server_core::core::types::{InputKey, PlayerIntent};

    let mut server = setup_server();
    let id = add_parked_player(&mut server, "keyed", 1, Vec2::new(3000.0, 3000.0));
    let sender = server.intent_sender();
    sender.send(PlayerIntent::Key { player: id, key: InputKey::Up, pressed: true });

    server.run_tick(tick(1, 1.0));
    let player = server.world.player(id).unwrap();
    assert!(player.keys.up);
    assert!(player.vel.speed() > 0.0, "thrust intent had no effect");
}

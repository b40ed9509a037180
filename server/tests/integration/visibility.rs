// skystrike/server/tests/integration/visibility.rs
//
// Interest-management behavior across whole server ticks: enter/leave
// symmetry, missile pre-seeding, pickup expiry reconciliation and spectator
// piggy-backing.

use skystrike_server_core::concurrent::spatial_index::{ColliderKind, SpatialShape};
use skystrike_server_core::core::config::{self, SimConfig};
use skystrike_server_core::core::constants::PICKUP_RADIUS;
use skystrike_server_core::core::ticker::Tick;
use skystrike_server_core::core::types::{
    Aabb, BroadcastReason, EntityId, PickupKind, PlayerId, ShipKind, Vec2,
};
use skystrike_server_core::entities::mob::Pickup;
use skystrike_server_core::server::instance::ArenaServer;
use skystrike_server_core::world::hitbox::HullKind;

fn setup_server() -> ArenaServer {
    let shared = config::shared(SimConfig::default());
    ArenaServer::new(shared).expect("server warmup must succeed")
}

fn tick(n: u64, frame_factor: f64) -> Tick {
    Tick { tick: n, frame_factor }
}

fn add_parked_player(server: &mut ArenaServer, name: &str, team: u8, pos: Vec2) -> PlayerId {
    let id = server.add_player(name, ShipKind::Raptor, team);
    server.place_player(id, pos);
    id
}

fn spawn_pickup(server: &mut ArenaServer, pos: Vec2, lifetime_frames: f64) -> EntityId {
    let id = server.world.allocate_id();
    let expires_at = server.world.sim_frames + lifetime_frames;
    server.world.insert_pickup(Pickup::new(id, PickupKind::Shield, pos, expires_at));
    server.spatial.insert(SpatialShape {
        entity: id,
        kind: ColliderKind::Pickup,
        hull: HullKind::Crate,
        pos,
        sin: 0.0,
        cos: 1.0,
        aabb: Aabb::around(pos, PICKUP_RADIUS, PICKUP_RADIUS),
        team: 0,
        owner: None,
        active: true,
    });
    id
}

#[test]
fn entity_entering_and_leaving_is_reported_exactly_once_each() {
    let mut server = setup_server();
    let viewer = add_parked_player(&mut server, "viewer", 1, Vec2::new(3000.0, 3000.0));
    let wanderer = add_parked_player(&mut server, "wanderer", 2, Vec2::new(-14000.0, -6000.0));

    // Far apart: neither viewport sees the other.
    server.run_tick(tick(1, 1.0));
    let set = server.broadcast_set(viewer).unwrap();
    assert!(!set.contains_key(&wanderer.entity()));

    // Entering: exactly one first-seen announcement.
    server.place_player(wanderer, Vec2::new(3100.0, 3000.0));
    server.run_tick(tick(2, 1.0));
    let set = server.broadcast_set(viewer).unwrap();
    assert_eq!(set.get(&wanderer.entity()), Some(&BroadcastReason::FirstSeen));

    // Still visible: an ongoing update, never a second first-seen.
    server.run_tick(tick(3, 1.0));
    let set = server.broadcast_set(viewer).unwrap();
    assert_eq!(set.get(&wanderer.entity()), Some(&BroadcastReason::Update));

    // Leaving: exactly one leave announcement, then silence.
    server.place_player(wanderer, Vec2::new(-14000.0, -6000.0));
    server.run_tick(tick(4, 1.0));
    let set = server.broadcast_set(viewer).unwrap();
    assert_eq!(set.get(&wanderer.entity()), Some(&BroadcastReason::LeftView));

    server.run_tick(tick(5, 1.0));
    let set = server.broadcast_set(viewer).unwrap();
    assert!(!set.contains_key(&wanderer.entity()), "leave must not repeat");
}

#[test]
fn fired_missile_is_preseeded_for_shooter_and_seen_by_observer() {
    let mut server = setup_server();
    let shooter = add_parked_player(&mut server, "shooter", 1, Vec2::new(3000.0, 3000.0));
    let observer = add_parked_player(&mut server, "observer", 2, Vec2::new(3200.0, 3000.0));

    // Let both learn about each other first.
    server.run_tick(tick(1, 1.0));

    server.world.player_mut(shooter).unwrap().keys.fire = true;
    server.run_tick(tick(2, 1.0));

    let missile_id = server
        .world
        .missiles
        .iter()
        .map(|(id, _)| id)
        .next()
        .expect("a missile should have been fired");

    let shooter_set = server.broadcast_set(shooter).unwrap();
    assert_eq!(
        shooter_set.get(&missile_id),
        Some(&BroadcastReason::FirstSeen),
        "shooter must be pre-seeded with its own missile"
    );
    let observer_set = server.broadcast_set(observer).unwrap();
    assert_eq!(
        observer_set.get(&missile_id),
        Some(&BroadcastReason::FirstSeen),
        "observer tracking the shooter must learn of the missile immediately"
    );
}

#[test]
fn expired_pickup_despawns_once_for_every_observer() {
    let mut server = setup_server();
    let viewer = add_parked_player(&mut server, "collector", 1, Vec2::new(3000.0, 3000.0));
    // Close enough to be visible, too far to be collected.
    let crate_id = spawn_pickup(&mut server, Vec2::new(3400.0, 3000.0), 2.0);

    server.run_tick(tick(1, 1.0));
    let set = server.broadcast_set(viewer).unwrap();
    assert_eq!(set.get(&crate_id), Some(&BroadcastReason::FirstSeen));

    // Lifetime elapses; the viewport scan observes the expiry and the batch
    // despawns it after the scan completes.
    server.run_tick(tick(2, 1.0));
    assert!(server.world.pickups.get(crate_id).is_none(), "expired crate must be removed");
    let set = server.broadcast_set(viewer).unwrap();
    assert_eq!(
        set.get(&crate_id),
        Some(&BroadcastReason::Despawned),
        "observer must be told the crate despawned"
    );

    server.run_tick(tick(3, 1.0));
    let set = server.broadcast_set(viewer).unwrap();
    assert!(!set.contains_key(&crate_id), "no residual announcements after despawn");
}

#[test]
fn spectator_receives_the_host_broadcast_set() {
    let mut server = setup_server();
    let host = add_parked_player(&mut server, "host", 1, Vec2::new(3000.0, 3000.0));
    let other = add_parked_player(&mut server, "other", 2, Vec2::new(3150.0, 3000.0));
    let spectator = add_parked_player(&mut server, "spec", 1, Vec2::new(-14000.0, -6000.0));

    server.spectate(spectator, Some(host));
    server.run_tick(tick(1, 1.0));

    let host_set = server.broadcast_set(host).unwrap().clone();
    let spectator_set = server.broadcast_set(spectator).unwrap().clone();
    assert_eq!(host_set, spectator_set);
    assert!(spectator_set.contains_key(&other.entity()));
}

#[test]
fn horizon_intent_is_clamped_to_the_server_maximum() {
    use skystrike_server_core::core::types::PlayerIntent;

    let shared = config::shared(SimConfig::default());
    let mut server = ArenaServer::new(shared.clone()).unwrap();
    let id = server.add_player("wide", ShipKind::Wasp, 1);
    let sender = server.intent_sender();

    sender.send(PlayerIntent::Horizon { player: id, width: 1_000_000.0, height: 1_000_000.0 });
    server.run_tick(tick(1, 1.0));

    let cfg = shared.load();
    let half = server.viewports.viewport(id).unwrap().half;
    assert!(half.x <= cfg.max_viewport_x);
    assert!(half.y <= cfg.max_viewport_y);
}

#[test]
fn removed_player_is_announced_as_despawned_to_observers() {
    let mut server = setup_server();
    let viewer = add_parked_player(&mut server, "viewer", 1, Vec2::new(3000.0, 3000.0));
    let leaver = add_parked_player(&mut server, "leaver", 2, Vec2::new(3100.0, 3000.0));

    server.run_tick(tick(1, 1.0));
    assert!(server.broadcast_set(viewer).unwrap().contains_key(&leaver.entity()));

    // Removal between ticks; the next tick's set carries the despawn.
    server.run_tick(tick(2, 1.0));
    server.remove_player(leaver);
    let set = server.broadcast_set(viewer).unwrap();
    assert_eq!(set.get(&leaver.entity()), Some(&BroadcastReason::Despawned));
}

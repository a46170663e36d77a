//! End-to-end world scenarios exercised through the public API.

use std::sync::Arc;
use std::time::Duration;

use glam::DVec2;
use mitos_core::accounts::MemoryAccountStore;
use mitos_core::config_service::{CONFIG_CHANNEL, ConfigService};
use mitos_core::player::Player;
use mitos_core::snapshot_repo::SnapshotRepository;
use mitos_core::world::manager::WorldManager;
use mitos_core::world::events::WorldEvent;
use mitos_core::world::{WorldConfig, WorldState};
use mitos_protocol::GameplayConfig;
use mitos_utils::locks::SyncMutex;
use mitos_utils::pubsub::Hub;

const DT: f64 = 1.0 / 30.0;
const PI: f64 = std::f64::consts::PI;

fn world(width: f64, height: f64) -> WorldState {
    let defaults = GameplayConfig {
        width,
        height,
        food_count: 0,
        ..GameplayConfig::default()
    };
    WorldState::new(WorldConfig::from_defaults("scenario", &defaults))
}

/// Joins a player, parks their cell at `position` with `radius`, and points
/// their steering at the cell so ticks do not move it.
fn join_at(state: &mut WorldState, name: &str, position: DVec2, radius: f64) -> String {
    let id = state.add_player(Player::new(name, "tok")).player_id;
    state.place_cell(&id, position, radius);
    state.set_target(&id, position);
    id
}

#[test]
fn absorption_chain_collapses_to_the_largest_owner() {
    let mut state = world(500.0, 500.0);
    let big = join_at(&mut state, "big", DVec2::new(100.0, 100.0), 60.0);
    let mid = join_at(&mut state, "mid", DVec2::new(100.0, 100.0), 40.0);
    let small = join_at(&mut state, "small", DVec2::new(100.0, 100.0), 20.0);

    state.tick(DT);

    assert!(state.cell(&mid).is_none());
    assert!(state.cell(&small).is_none());
    let survivor = state.cell(&big).expect("largest owner survives");

    let expected = PI * 60.0 * 60.0 + 0.8 * PI * 40.0 * 40.0 + 0.8 * PI * 20.0 * 20.0;
    assert!(
        (survivor.area() - expected).abs() / expected < 1e-6,
        "area {} expected {expected}",
        survivor.area()
    );
}

#[test]
fn a_two_percent_size_advantage_absorbs() {
    let mut state = world(500.0, 500.0);
    let larger = join_at(&mut state, "larger", DVec2::new(200.0, 200.0), 52.0);
    let smaller = join_at(&mut state, "smaller", DVec2::new(200.0, 200.0), 50.0);

    state.tick(DT);

    assert!(state.cell(&smaller).is_none());
    let survivor = state.cell(&larger).expect("larger survives");
    assert!(survivor.radius > 52.0);
}

#[test]
fn food_consumption_grows_the_cell_and_replenishes() {
    let mut state = world(500.0, 500.0);
    state.config.food_count = 10;
    let id = join_at(&mut state, "eater", DVec2::new(100.0, 100.0), 25.0);
    let pellet = state.spawn_food(DVec2::new(100.0, 100.0), 5.0);

    state.tick(DT);

    assert!(state.cells().all(|c| c.id == id));
    let cell = state.cell(&id).expect("cell exists");
    assert!((cell.radius - 25.5).abs() < 1e-9);
    let player = state.player(&id).expect("player exists");
    assert_eq!(player.score, 5.0);
    assert_eq!(player.food_eaten, 1);
    assert_eq!(state.food_count(), 10);
    // The eaten pellet is really gone, not just overwritten.
    assert!(
        state
            .snapshot()
            .foods
            .iter()
            .all(|f| f.id != pellet)
    );
}

#[test]
fn split_respects_cooldown_and_halves_the_parent() {
    let mut state = world(500.0, 500.0);
    let id = join_at(&mut state, "splitter", DVec2::new(250.0, 250.0), 60.0);

    state.split_player(&id);
    assert_eq!(state.cells_of(&id).len(), 2);

    // t = 1.5 s: cooldown still active.
    for _ in 0..45 {
        state.tick(DT);
    }
    state.split_player(&id);
    assert_eq!(state.cells_of(&id).len(), 2);

    // t = 2.5 s: cooldown expired.
    for _ in 0..30 {
        state.tick(DT);
    }
    let area_before: f64 = state
        .cells_of(&id)
        .iter()
        .map(|cid| state.cell(cid).expect("cell").area())
        .fold(f64::NEG_INFINITY, f64::max);
    state.split_player(&id);

    assert_eq!(state.cells_of(&id).len(), 3);
    let expected_radius = (area_before / 2.0 / PI).sqrt();
    let halves: Vec<f64> = state
        .cells_of(&id)
        .iter()
        .filter_map(|cid| state.cell(cid))
        .map(|c| c.radius)
        .filter(|r| (r - expected_radius).abs() < 1e-9)
        .collect();
    assert!(halves.len() >= 2, "parent and child share the halved radius");
}

#[test]
fn elimination_event_names_winner_and_loser() {
    let mut state = world(500.0, 500.0);
    let winner = join_at(&mut state, "goliath", DVec2::new(300.0, 300.0), 60.0);
    let loser = join_at(&mut state, "david", DVec2::new(300.0, 300.0), 20.0);

    state.tick(DT);

    let events = state.take_events();
    assert_eq!(events.len(), 1);
    let WorldEvent::PlayerEliminated {
        winner_id,
        loser_id,
        loser_name,
        ..
    } = &events[0];
    assert_eq!(winner_id, &winner);
    assert_eq!(loser_id, &loser);
    assert_eq!(loser_name, "david");

    assert_eq!(state.player(&winner).expect("winner").cells_eaten, 1);
    assert!(state.player(&loser).is_none());
    assert!(state.cells_of(&loser).is_empty());
}

#[tokio::test]
async fn config_updates_propagate_to_every_world_and_broadcast_once() {
    let repo = Arc::new(
        SnapshotRepository::new(std::env::temp_dir().join("mitos-scenario-config"))
            .expect("temp dir"),
    );
    let manager = WorldManager::new(repo, GameplayConfig::default());
    let first = manager.create_world("first");
    let second = manager.create_world("second");

    let store = Arc::new(MemoryAccountStore::new(GameplayConfig::default()));
    let hub = Arc::new(Hub::new(16));
    let broadcasts: Arc<SyncMutex<Vec<GameplayConfig>>> = Arc::new(SyncMutex::new(Vec::new()));
    let sink = Arc::clone(&broadcasts);
    let service = ConfigService::new(
        store,
        Arc::clone(&manager),
        Arc::clone(&hub),
        Arc::new(move |config: &GameplayConfig| sink.lock().push(config.clone())),
    );
    service.start().await.expect("initial load");

    let update = GameplayConfig {
        width: 2000.0,
        height: 2000.0,
        tick_rate: 60.0,
        food_count: 50,
        snapshot_interval: 5.0,
        updated_at: Some("2024-06-01T00:00:00".to_owned()),
    };
    hub.publish(CONFIG_CHANNEL, update.clone());

    // Wait for the service to apply, then for each runner to emit a snapshot
    // reflecting the new configuration.
    for world_id in [&first.id, &second.id] {
        let mut sub = manager.subscribe(world_id).expect("world exists");
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let snapshot = tokio::time::timeout_at(deadline, sub.recv())
                .await
                .expect("snapshot before deadline")
                .expect("world alive");
            if snapshot.config.width == 2000.0 {
                assert_eq!(snapshot.config.tick_rate, 60.0);
                assert_eq!(snapshot.config.food_count, 50);
                assert_eq!(snapshot.config.snapshot_interval, 5.0);
                assert_eq!(snapshot.foods.len(), 50);
                break;
            }
        }
    }

    let seen = broadcasts.lock().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0], update);

    manager.shutdown();
}

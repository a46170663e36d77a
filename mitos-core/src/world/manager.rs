//! The world directory.
//!
//! Creates and lists worlds, routes player commands to the right world,
//! hands out subscriptions, propagates configuration changes, and supervises
//! runners. The directory itself sits behind one mutex; per-world state is
//! only ever touched under that world's own lock.

use std::sync::Arc;

use glam::DVec2;
use mitos_protocol::{GameplayConfig, GameplayConfigUpdate};
use mitos_utils::ids;
use mitos_utils::locks::{SyncMutex, SyncRwLock};
use rustc_hash::FxHashMap;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::runner::{EventListener, World, WorldSubscription};
use super::{Cell, WorldConfig, WorldState};
use crate::player::Player;
use crate::snapshot_repo::SnapshotRepository;

/// One row of [`WorldManager::list_worlds`].
#[derive(Debug, Clone, Serialize)]
pub struct WorldSummary {
    /// World id.
    pub id: String,
    /// World name.
    pub name: String,
    /// Live player count.
    pub players: usize,
}

/// Directory of live worlds.
pub struct WorldManager {
    worlds: SyncMutex<FxHashMap<String, Arc<World>>>,
    defaults: SyncMutex<GameplayConfig>,
    listeners: Arc<SyncRwLock<Vec<EventListener>>>,
    snapshot_repo: Arc<SnapshotRepository>,
    shutdown: CancellationToken,
}

impl WorldManager {
    /// Creates an empty directory whose new worlds start from `defaults`.
    #[must_use]
    pub fn new(snapshot_repo: Arc<SnapshotRepository>, defaults: GameplayConfig) -> Arc<Self> {
        Arc::new(Self {
            worlds: SyncMutex::new(FxHashMap::default()),
            defaults: SyncMutex::new(defaults),
            listeners: Arc::new(SyncRwLock::new(Vec::new())),
            snapshot_repo,
            shutdown: CancellationToken::new(),
        })
    }

    /// Lists all live worlds.
    #[must_use]
    pub fn list_worlds(&self) -> Vec<WorldSummary> {
        let mut summaries: Vec<WorldSummary> = self
            .worlds
            .lock()
            .values()
            .map(|world| WorldSummary {
                id: world.id().to_owned(),
                name: world.state.lock().config.name.clone(),
                players: world.state.lock().player_count(),
            })
            .collect();
        summaries.sort_unstable_by(|a, b| a.id.cmp(&b.id));
        summaries
    }

    /// Creates a world from the current defaults and starts its runner.
    ///
    /// Must be called from within a tokio runtime. The runner is supervised:
    /// if it panics, the world is considered corrupt and removed from the
    /// directory, which closes every attached subscription.
    pub fn create_world(self: &Arc<Self>, name: &str) -> WorldSummary {
        let id = ids::new_id();
        let config = WorldConfig::from_defaults(name, &self.defaults.lock().clone());
        let mut state = WorldState::new(config);
        state.populate_food();

        let world = World::new(id.clone(), state, self.shutdown.child_token());
        self.worlds.lock().insert(id.clone(), Arc::clone(&world));

        let runner = tokio::spawn(Arc::clone(&world).run(
            Arc::clone(&self.snapshot_repo),
            Arc::clone(&self.listeners),
        ));

        let manager = Arc::downgrade(self);
        let world_id = id.clone();
        tokio::spawn(async move {
            if let Err(error) = runner.await
                && error.is_panic()
            {
                log::error!("runner for world {world_id} crashed; removing world");
                if let Some(manager) = manager.upgrade() {
                    manager.remove_world(&world_id);
                }
            }
        });

        WorldSummary {
            id,
            name: name.to_owned(),
            players: 0,
        }
    }

    /// Removes a world, stopping its runner and detaching all subscribers.
    pub fn remove_world(&self, world_id: &str) {
        if let Some(world) = self.worlds.lock().remove(world_id) {
            world.cancel();
        }
    }

    /// Stops every runner. Used at process shutdown.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.worlds.lock().clear();
    }

    fn world(&self, world_id: &str) -> Option<Arc<World>> {
        self.worlds.lock().get(world_id).cloned()
    }

    /// Spawns `player` into a world. Returns the initial cell, or `None` when
    /// the world does not exist.
    pub fn add_player(&self, world_id: &str, player: Player) -> Option<Cell> {
        let world = self.world(world_id)?;
        let cell = world.state.lock().add_player(player);
        Some(cell)
    }

    /// Removes a player, returning their record (with final counters) if the
    /// world still knew them.
    pub fn remove_player(&self, world_id: &str, player_id: &str) -> Option<Player> {
        let world = self.world(world_id)?;
        let player = world.state.lock().remove_player(player_id);
        player
    }

    /// Updates a player's steering target. Unknown worlds and players are
    /// silently dropped.
    pub fn set_target(&self, world_id: &str, player_id: &str, target: [f64; 2]) {
        if let Some(world) = self.world(world_id) {
            world
                .state
                .lock()
                .set_target(player_id, DVec2::from_array(target));
        }
    }

    /// Attempts a split. Unknown worlds and players are silently dropped.
    pub fn split_player(&self, world_id: &str, player_id: &str) {
        if let Some(world) = self.world(world_id) {
            world.state.lock().split_player(player_id);
        }
    }

    /// Subscribes to a world's snapshot stream, or `None` when the world does
    /// not exist.
    #[must_use]
    pub fn subscribe(&self, world_id: &str) -> Option<WorldSubscription> {
        Some(self.world(world_id)?.subscribe())
    }

    /// Registers a listener for domain events from every world.
    pub fn register_event_listener(&self, listener: EventListener) {
        self.listeners.write().push(listener);
    }

    /// Merges `update` into the defaults and applies it to every running
    /// world, repopulating or truncating food to match.
    ///
    /// Each world takes the change under its state lock, so a tick observes
    /// either the old or the new configuration in full.
    pub fn update_config(&self, update: &GameplayConfigUpdate) {
        {
            let mut defaults = self.defaults.lock();
            update.apply_to(&mut defaults);
        }
        let worlds: Vec<Arc<World>> = self.worlds.lock().values().cloned().collect();
        for world in worlds {
            world.state.lock().apply_config(update);
        }
    }

    /// The defaults new worlds are created from.
    #[must_use]
    pub fn current_defaults(&self) -> GameplayConfig {
        self.defaults.lock().clone()
    }
}

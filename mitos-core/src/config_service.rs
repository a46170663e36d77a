//! Live configuration propagation.
//!
//! On start the service loads the gameplay configuration from the account
//! store and pushes it into the world manager. It then follows the config
//! channel: each published payload is applied to the manager (defaults plus
//! every running world) and handed to the broadcast callback, which the
//! gateway uses to send a `config_update` frame to every connected session.
//! Payloads are applied strictly in arrival order, and each broadcast carries
//! exactly the value that was just applied.

use std::sync::Arc;

use arc_swap::ArcSwap;
use mitos_protocol::{GameplayConfig, GameplayConfigUpdate};
use mitos_utils::pubsub::Hub;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::accounts::{AccountError, AccountStore};
use crate::world::manager::WorldManager;

/// Channel name for gameplay configuration changes.
pub const CONFIG_CHANNEL: &str = "config:gameplay";

/// Callback invoked after each applied configuration change.
pub type ConfigBroadcast = Arc<dyn Fn(&GameplayConfig) + Send + Sync>;

/// Applies configuration changes to the world manager and keeps the current
/// value available for the HTTP surface.
pub struct ConfigService {
    store: Arc<dyn AccountStore>,
    manager: Arc<WorldManager>,
    hub: Arc<Hub<GameplayConfig>>,
    broadcast: ConfigBroadcast,
    current: ArcSwap<GameplayConfig>,
    cancel: CancellationToken,
}

impl ConfigService {
    /// Creates the service. Nothing happens until [`start`](Self::start).
    #[must_use]
    pub fn new(
        store: Arc<dyn AccountStore>,
        manager: Arc<WorldManager>,
        hub: Arc<Hub<GameplayConfig>>,
        broadcast: ConfigBroadcast,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            manager,
            hub,
            broadcast,
            current: ArcSwap::from_pointee(GameplayConfig::default()),
            cancel: CancellationToken::new(),
        })
    }

    /// Loads the initial configuration, applies it, and starts following the
    /// config channel. A failed initial load is surfaced to the caller; the
    /// store has already retried internally.
    pub async fn start(self: &Arc<Self>) -> Result<(), AccountError> {
        let initial = self.store.load_gameplay_config().await?;
        self.apply(&initial);

        // Subscribe before returning so a payload published right after
        // start() cannot slip past the follower.
        let rx = self.hub.subscribe(CONFIG_CHANNEL);
        let service = Arc::clone(self);
        tokio::spawn(async move {
            service.follow_channel(rx).await;
        });
        Ok(())
    }

    /// Stops the channel-following task.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// The configuration currently in effect.
    #[must_use]
    pub fn snapshot(&self) -> GameplayConfig {
        GameplayConfig::clone(&self.current.load())
    }

    fn apply(&self, config: &GameplayConfig) {
        self.manager
            .update_config(&GameplayConfigUpdate::from_full(config));
        self.current.store(Arc::new(config.clone()));
    }

    async fn follow_channel(&self, mut rx: broadcast::Receiver<GameplayConfig>) {
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                payload = rx.recv() => match payload {
                    Ok(config) => {
                        self.apply(&config);
                        (self.broadcast)(&config);
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        log::warn!("config listener lagged, skipped {missed} updates");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    }
}

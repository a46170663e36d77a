//! Progress statistics.
//!
//! Sessions report progress deltas here; the service serializes them into the
//! account store and publishes the user's new stats together with the
//! aggregate totals on the stats channel for dashboard consumers. One mutex
//! orders the writes so published totals are sequentially consistent with the
//! increments that produced them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, broadcast};

use crate::accounts::{AccountStore, StatsDelta, StatsTotals, UserStats};
use mitos_utils::pubsub::Hub;

/// Channel name for statistics updates.
pub const STATS_CHANNEL: &str = "stats:updates";

/// One statistics update as published on the stats channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsBroadcast {
    /// The user whose progress changed.
    pub username: String,
    /// The user's new counters, absent when the user is inactive or unknown.
    pub stats: Option<UserStats>,
    /// Aggregate counters across all users after the write.
    pub totals: StatsTotals,
}

/// Serializes progress deltas into the account store and fans out updates.
pub struct StatsService {
    store: Arc<dyn AccountStore>,
    hub: Arc<Hub<StatsBroadcast>>,
    write_order: Mutex<()>,
}

impl StatsService {
    /// Creates the service publishing on `hub`.
    #[must_use]
    pub fn new(store: Arc<dyn AccountStore>, hub: Arc<Hub<StatsBroadcast>>) -> Arc<Self> {
        Arc::new(Self {
            store,
            hub,
            write_order: Mutex::new(()),
        })
    }

    /// Applies `delta` to `username`'s counters and publishes the result.
    ///
    /// All-zero deltas are no-ops. A store failure is logged and the delta is
    /// dropped; there is no retry queue here. Callers on a latency-sensitive
    /// path should spawn this rather than await it.
    pub async fn add_progress(&self, username: &str, delta: StatsDelta) {
        if delta.is_zero() {
            return;
        }
        let _order = self.write_order.lock().await;
        match self.store.increment_user_counters(username, delta).await {
            Ok((stats, totals)) => {
                self.hub.publish(
                    STATS_CHANNEL,
                    StatsBroadcast {
                        username: username.to_owned(),
                        stats,
                        totals,
                    },
                );
            }
            Err(error) => {
                log::warn!("dropping stats update for {username}: {error}");
            }
        }
    }

    /// Subscribes to the stats channel.
    pub fn subscribe(&self) -> broadcast::Receiver<StatsBroadcast> {
        self.hub.subscribe(STATS_CHANNEL)
    }
}

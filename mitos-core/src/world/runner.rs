//! The per-world runner task.
//!
//! One long-running task per world. It times ticks against the configured
//! tick rate, publishes the latest snapshot to subscribers with drop-oldest
//! semantics, persists a snapshot every snapshot interval, and dispatches
//! domain events to registered listeners. Nothing a subscriber, a listener or
//! the disk does can stall the next tick: fan-out replaces an unread
//! snapshot, listeners are synchronous and non-blocking by contract, and
//! persistence runs on a spawned task.

use std::sync::Arc;
use std::time::Duration;

use mitos_protocol::WorldSnapshot;
use mitos_utils::locks::{SyncMutex, SyncRwLock};
use tokio::sync::watch;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

use super::WorldState;
use super::events::WorldEvent;
use crate::snapshot_repo::SnapshotRepository;

/// A callback invoked for every domain event, with the world id first.
///
/// Listeners run on the runner task between ticks and must not block; hand
/// anything slow to a channel or a spawned task.
pub type EventListener = Arc<dyn Fn(&str, &WorldEvent) + Send + Sync>;

/// A live world: its state behind the per-world lock, plus the snapshot
/// fan-out machinery.
///
/// All state mutation happens either on the runner (ticks) or under the same
/// lock between ticks (manager commands), so a command issued before tick T
/// is visible at tick T.
pub struct World {
    id: String,
    pub(crate) state: SyncMutex<WorldState>,
    snapshot_tx: watch::Sender<Option<Arc<WorldSnapshot>>>,
    cancel: CancellationToken,
}

impl World {
    /// Wraps `state` into a runnable world.
    #[must_use]
    pub fn new(id: String, state: WorldState, cancel: CancellationToken) -> Arc<Self> {
        let (snapshot_tx, _) = watch::channel(None);
        Arc::new(Self {
            id,
            state: SyncMutex::new(state),
            snapshot_tx,
            cancel,
        })
    }

    /// The world id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Stops the runner after the current tick.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Attaches a subscriber.
    ///
    /// Every subscriber holds a capacity-one slot: publishing a new snapshot
    /// replaces an unread one, so a slow consumer only ever loses
    /// intermediate snapshots, never ordering, and never slows the runner.
    #[must_use]
    pub fn subscribe(&self) -> WorldSubscription {
        WorldSubscription {
            rx: self.snapshot_tx.subscribe(),
        }
    }

    /// Publishes `snapshot` to all subscribers, replacing any unread one.
    pub(crate) fn publish(&self, snapshot: Arc<WorldSnapshot>) {
        self.snapshot_tx.send_replace(Some(snapshot));
    }

    /// The runner loop. Runs until cancelled; the world is unusable after.
    #[tracing::instrument(level = "debug", skip_all, fields(world = %self.id))]
    pub(crate) async fn run(
        self: Arc<Self>,
        repo: Arc<SnapshotRepository>,
        listeners: Arc<SyncRwLock<Vec<EventListener>>>,
    ) {
        let mut last_tick = Instant::now();
        let mut last_snapshot = Instant::now();

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let started = Instant::now();
            let dt = started.duration_since(last_tick).as_secs_f64();
            last_tick = started;

            let (snapshot, events, tick_interval, snapshot_due) = {
                let mut state = self.state.lock();
                state.tick(dt);
                let events = state.take_events();
                let snapshot = Arc::new(state.snapshot());
                let tick_rate = state.config.tick_rate.max(1e-3);
                let snapshot_due = started.duration_since(last_snapshot).as_secs_f64()
                    >= state.config.snapshot_interval;
                (
                    snapshot,
                    events,
                    Duration::from_secs_f64(1.0 / tick_rate),
                    snapshot_due,
                )
            };

            self.publish(Arc::clone(&snapshot));

            if !events.is_empty() {
                let listeners = listeners.read().clone();
                for event in &events {
                    for listener in &listeners {
                        listener(&self.id, event);
                    }
                }
            }

            if snapshot_due {
                last_snapshot = started;
                let repo = Arc::clone(&repo);
                let world_id = self.id.clone();
                let snapshot = Arc::clone(&snapshot);
                tokio::spawn(async move {
                    if let Err(error) = repo.save_snapshot(&world_id, &snapshot).await {
                        log::warn!("failed to persist snapshot for world {world_id}: {error}");
                    }
                });
            }

            let elapsed = started.elapsed();
            if elapsed > tick_interval {
                tracing::warn!(world = %self.id, ?elapsed, ?tick_interval, "tick ran long");
            }

            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = sleep(tick_interval) => {}
            }
        }
    }
}

/// A subscriber's handle on one world's snapshot stream.
///
/// Dropping the subscription detaches it. [`recv`](Self::recv) returns `None`
/// once the world is gone.
pub struct WorldSubscription {
    rx: watch::Receiver<Option<Arc<WorldSnapshot>>>,
}

impl WorldSubscription {
    /// Waits for the next unseen snapshot.
    ///
    /// Snapshots arrive in monotonic simulation-time order; intermediate ones
    /// may be skipped if this subscriber lagged.
    pub async fn recv(&mut self) -> Option<Arc<WorldSnapshot>> {
        loop {
            self.rx.changed().await.ok()?;
            let latest = self.rx.borrow_and_update().clone();
            if let Some(snapshot) = latest {
                return Some(snapshot);
            }
        }
    }

    /// Detaches the subscription. Equivalent to dropping it.
    pub fn close(self) {}
}

//! In-process, multi-channel pub/sub hub.
//!
//! Used for the configuration and statistics channels. Each named channel is
//! backed by a bounded [`tokio::sync::broadcast`] ring: publishing never
//! blocks, every subscriber sees payloads in publication order, and a
//! subscriber that falls behind loses the oldest payloads rather than slowing
//! the publisher down.

use rustc_hash::FxHashMap;
use tokio::sync::broadcast;

use crate::locks::SyncMutex;

/// A thread-safe broadcaster keyed by channel name.
///
/// Channels are created lazily on first subscribe or publish and live for the
/// lifetime of the hub.
pub struct Hub<T> {
    channels: SyncMutex<FxHashMap<String, broadcast::Sender<T>>>,
    capacity: usize,
}

impl<T: Clone> Hub<T> {
    /// Creates a hub whose channels buffer up to `capacity` undelivered
    /// payloads per subscriber before the oldest is dropped.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: SyncMutex::new(FxHashMap::default()),
            capacity: capacity.max(1),
        }
    }

    /// Subscribes to `channel`, creating it if needed.
    ///
    /// The returned receiver yields payloads published after this call. A
    /// receiver that lags past the channel capacity observes
    /// [`broadcast::error::RecvError::Lagged`] once and then resumes with the
    /// oldest retained payload.
    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<T> {
        let mut channels = self.channels.lock();
        channels
            .entry(channel.to_owned())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Publishes `payload` to `channel` and returns how many subscribers were
    /// reachable at that moment. Publishing to a channel nobody listens on is
    /// not an error.
    pub fn publish(&self, channel: &str, payload: T) -> usize {
        let sender = {
            let mut channels = self.channels.lock();
            channels
                .entry(channel.to_owned())
                .or_insert_with(|| broadcast::channel(self.capacity).0)
                .clone()
        };
        sender.send(payload).unwrap_or(0)
    }
}

//! The connection hub.
//!
//! Tracks the outbound queue of every open game connection, keyed by world id
//! and player id. Senders never block: each connection drains its own
//! unbounded queue on its writer task. A connection whose queue is gone (the
//! session ended) is pruned on the next send that touches it rather than
//! surfacing an error to the caller.

use mitos_protocol::ServerMessage;
use mitos_utils::locks::SyncRwLock;
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;

/// One frame queued toward a client.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    /// A JSON message.
    Message(ServerMessage),
    /// Close the connection with this code and reason after flushing.
    Close {
        /// WebSocket close code.
        code: u16,
        /// Human-readable reason.
        reason: String,
    },
}

struct ConnectionEntry {
    username: String,
    sender: mpsc::UnboundedSender<OutboundFrame>,
}

/// world id → player id → outbound queue.
#[derive(Default)]
pub struct ConnectionHub {
    connections: SyncRwLock<FxHashMap<String, FxHashMap<String, ConnectionEntry>>>,
}

impl ConnectionHub {
    /// Creates an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection and returns the receiving end of its queue.
    ///
    /// Registering the same (world, player) twice replaces the old entry;
    /// the displaced queue closes, which ends the old writer.
    pub fn register(
        &self,
        world_id: &str,
        player_id: &str,
        username: &str,
    ) -> mpsc::UnboundedReceiver<OutboundFrame> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.connections
            .write()
            .entry(world_id.to_owned())
            .or_default()
            .insert(
                player_id.to_owned(),
                ConnectionEntry {
                    username: username.to_owned(),
                    sender,
                },
            );
        receiver
    }

    /// Removes a connection. Unknown pairs are ignored.
    pub fn unregister(&self, world_id: &str, player_id: &str) {
        let mut connections = self.connections.write();
        if let Some(players) = connections.get_mut(world_id) {
            players.remove(player_id);
            if players.is_empty() {
                connections.remove(world_id);
            }
        }
    }

    /// The account username a connection was registered under.
    #[must_use]
    pub fn username_of(&self, world_id: &str, player_id: &str) -> Option<String> {
        self.connections
            .read()
            .get(world_id)
            .and_then(|players| players.get(player_id))
            .map(|entry| entry.username.clone())
    }

    /// Queues a message toward one connection.
    pub fn send_to(&self, world_id: &str, player_id: &str, message: ServerMessage) {
        self.send_frame(world_id, player_id, OutboundFrame::Message(message));
    }

    /// Queues a close toward one connection.
    pub fn close(&self, world_id: &str, player_id: &str, code: u16, reason: &str) {
        self.send_frame(
            world_id,
            player_id,
            OutboundFrame::Close {
                code,
                reason: reason.to_owned(),
            },
        );
    }

    /// Queues a message toward every connection in one world.
    pub fn broadcast(&self, world_id: &str, message: &ServerMessage) {
        let targets: Vec<String> = self
            .connections
            .read()
            .get(world_id)
            .map(|players| players.keys().cloned().collect())
            .unwrap_or_default();
        for player_id in targets {
            self.send_frame(
                world_id,
                &player_id,
                OutboundFrame::Message(message.clone()),
            );
        }
    }

    /// Queues a message toward every connection in every world.
    pub fn broadcast_global(&self, message: &ServerMessage) {
        let targets: Vec<(String, String)> = self
            .connections
            .read()
            .iter()
            .flat_map(|(world_id, players)| {
                players
                    .keys()
                    .map(move |player_id| (world_id.clone(), player_id.clone()))
            })
            .collect();
        for (world_id, player_id) in targets {
            self.send_frame(
                &world_id,
                &player_id,
                OutboundFrame::Message(message.clone()),
            );
        }
    }

    fn send_frame(&self, world_id: &str, player_id: &str, frame: OutboundFrame) {
        let delivered = self
            .connections
            .read()
            .get(world_id)
            .and_then(|players| players.get(player_id))
            .is_some_and(|entry| entry.sender.send(frame).is_ok());
        if !delivered {
            // The receiver is gone; drop the stale registration instead of
            // propagating the failure.
            self.unregister(world_id, player_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(message: &str) -> ServerMessage {
        ServerMessage::Error {
            message: message.to_owned(),
        }
    }

    #[tokio::test]
    async fn send_to_reaches_the_registered_connection() {
        let hub = ConnectionHub::new();
        let mut rx = hub.register("w1", "p1", "alice");

        hub.send_to("w1", "p1", error("hello"));
        assert_eq!(rx.recv().await, Some(OutboundFrame::Message(error("hello"))));

        hub.close("w1", "p1", 4404, "Eliminated");
        assert_eq!(
            rx.recv().await,
            Some(OutboundFrame::Close {
                code: 4404,
                reason: "Eliminated".to_owned()
            })
        );
    }

    #[tokio::test]
    async fn dead_connections_are_pruned_on_send() {
        let hub = ConnectionHub::new();
        let rx = hub.register("w1", "p1", "alice");
        drop(rx);

        hub.send_to("w1", "p1", error("into the void"));
        assert!(hub.username_of("w1", "p1").is_none());
    }

    #[tokio::test]
    async fn broadcast_is_scoped_to_one_world() {
        let hub = ConnectionHub::new();
        let mut a = hub.register("w1", "p1", "alice");
        let mut b = hub.register("w1", "p2", "bob");
        let mut other = hub.register("w2", "p3", "carol");

        hub.broadcast("w1", &error("world one"));
        assert!(a.recv().await.is_some());
        assert!(b.recv().await.is_some());
        assert!(other.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_global_reaches_every_world() {
        let hub = ConnectionHub::new();
        let mut a = hub.register("w1", "p1", "alice");
        let mut b = hub.register("w2", "p2", "bob");

        hub.broadcast_global(&error("everyone"));
        assert!(a.recv().await.is_some());
        assert!(b.recv().await.is_some());
    }

    #[tokio::test]
    async fn unregister_forgets_the_connection() {
        let hub = ConnectionHub::new();
        let _rx = hub.register("w1", "p1", "alice");
        assert_eq!(hub.username_of("w1", "p1").as_deref(), Some("alice"));

        hub.unregister("w1", "p1");
        assert!(hub.username_of("w1", "p1").is_none());
    }
}

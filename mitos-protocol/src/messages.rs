//! The JSON message envelope for the game channel.

use serde::{Deserialize, Serialize};

use crate::config::GameplayConfig;
use crate::snapshot::{CellView, PlayerView, WorldSnapshot};

/// Frames sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once after a successful join.
    Joined {
        /// The joining player's public record.
        player: PlayerView,
        /// The player's initial cell.
        cell: CellView,
        /// The gameplay configuration in effect at join time.
        config: GameplayConfig,
    },
    /// One full world snapshot, sent every tick (subject to drop-oldest).
    World {
        /// The snapshot.
        state: WorldSnapshot,
    },
    /// The gameplay configuration changed.
    ConfigUpdate {
        /// The configuration that is now in effect.
        config: GameplayConfig,
    },
    /// This player's last cell was absorbed. The connection is closed with
    /// code 4404 right after this frame.
    Eliminated {
        /// Display name of the absorbing player.
        by: String,
        /// Id of the world the elimination happened in.
        world: String,
    },
    /// A request-level failure (for example an unknown world id on join).
    Error {
        /// Human-readable description.
        message: String,
    },
}

/// Frames accepted from clients.
///
/// Anything that fails to parse into this enum — missing `type`, wrong target
/// arity, non-numeric coordinates — is ignored and the connection stays open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Steer all of the player's cells toward a point.
    SetTarget {
        /// Desired target, `[x, y]`. Clamped to world bounds server-side.
        target: [f64; 2],
    },
    /// Split the player's largest cell.
    Split,
}

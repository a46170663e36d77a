//! Wire protocol for the Mitos game channel.
//!
//! Every frame on the game WebSocket is a JSON object with a `type` field.
//! This crate defines the full envelope in both directions, the snapshot
//! DTOs embedded in `world` frames, and the gameplay configuration payload
//! shared with the account store and the config channel.

pub mod config;
pub mod messages;
pub mod snapshot;

pub use config::{GameplayConfig, GameplayConfigUpdate};
pub use messages::{ClientMessage, ServerMessage};
pub use snapshot::{CellView, FoodView, PlayerView, WorldConfigView, WorldSnapshot};

/// WebSocket close codes used by the game channel.
pub mod close_code {
    /// Normal closure.
    pub const NORMAL: u16 = 1000;
    /// The presented session token is missing, unknown or expired.
    pub const INVALID_TOKEN: u16 = 4401;
    /// The player's last cell was absorbed by an opponent.
    pub const ELIMINATED: u16 = 4404;
}

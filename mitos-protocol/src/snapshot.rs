//! Snapshot DTOs.
//!
//! A snapshot is the full observable state of one world at the end of a tick.
//! Every subscriber receives the same snapshot; there is no per-viewer
//! filtering.

use glam::DVec2;
use serde::{Deserialize, Serialize};

/// The world configuration as embedded in snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldConfigView {
    /// Human-readable world name.
    pub name: String,
    /// World width in world units.
    pub width: f64,
    /// World height in world units.
    pub height: f64,
    /// Simulation ticks per second.
    pub tick_rate: f64,
    /// Number of food pellets kept alive.
    pub food_count: u32,
    /// Seconds between snapshot writes.
    pub snapshot_interval: f64,
}

/// A player's public record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    /// Stable player id.
    pub id: String,
    /// Display name chosen at join time.
    pub name: String,
    /// RGB color derived deterministically from the id.
    pub color: [u8; 3],
    /// Cumulative score.
    pub score: f64,
}

/// One cell as seen by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellView {
    /// Cell id. A solo player's cell reuses the player id.
    pub id: String,
    /// Owning player id.
    pub player_id: String,
    /// Centre position, `[x, y]` on the wire.
    pub position: DVec2,
    /// Disc radius.
    pub radius: f64,
}

/// One food pellet as seen by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodView {
    /// Pellet id.
    pub id: String,
    /// Centre position, `[x, y]` on the wire.
    pub position: DVec2,
    /// Score awarded on consumption.
    pub value: f64,
}

/// Full world snapshot, produced once per tick.
///
/// `tick_time` is the world's simulation clock in seconds. It increases
/// monotonically across the snapshots any single subscriber receives, even
/// when intermediate snapshots are dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Configuration in effect during the tick that produced this snapshot.
    pub config: WorldConfigView,
    /// All live players.
    pub players: Vec<PlayerView>,
    /// All live cells.
    pub cells: Vec<CellView>,
    /// All live food pellets.
    pub foods: Vec<FoodView>,
    /// Simulation time at the end of the tick, in seconds.
    pub tick_time: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_serialize_as_two_element_arrays() {
        let cell = CellView {
            id: "c1".to_owned(),
            player_id: "p1".to_owned(),
            position: DVec2::new(12.5, 99.0),
            radius: 25.0,
        };
        let json = serde_json::to_value(&cell).unwrap();
        assert_eq!(json["position"], serde_json::json!([12.5, 99.0]));
    }

    #[test]
    fn snapshot_round_trips() {
        let snapshot = WorldSnapshot {
            config: WorldConfigView {
                name: "arena".to_owned(),
                width: 500.0,
                height: 500.0,
                tick_rate: 30.0,
                food_count: 10,
                snapshot_interval: 10.0,
            },
            players: vec![PlayerView {
                id: "p1".to_owned(),
                name: "alice".to_owned(),
                color: [1, 2, 3],
                score: 15.0,
            }],
            cells: vec![],
            foods: vec![FoodView {
                id: "f1".to_owned(),
                position: DVec2::new(1.0, 2.0),
                value: 5.0,
            }],
            tick_time: 3.25,
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: WorldSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }
}

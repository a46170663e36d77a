//! Gameplay configuration payloads.

use serde::{Deserialize, Serialize};

/// The full gameplay configuration as stored by the account store and carried
/// on the config channel.
///
/// `updated_at` is an ISO-8601 timestamp set by whoever last wrote the row;
/// the runtime treats it as opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameplayConfig {
    /// World width in world units.
    pub width: f64,
    /// World height in world units.
    pub height: f64,
    /// Simulation ticks per second.
    pub tick_rate: f64,
    /// Number of food pellets kept alive per world.
    pub food_count: u32,
    /// Seconds between snapshot writes to disk.
    pub snapshot_interval: f64,
    /// When the configuration was last changed, if known.
    pub updated_at: Option<String>,
}

impl Default for GameplayConfig {
    fn default() -> Self {
        Self {
            width: 1000.0,
            height: 1000.0,
            tick_rate: 30.0,
            food_count: 200,
            snapshot_interval: 10.0,
            updated_at: None,
        }
    }
}

/// A partial configuration change: only the present fields are applied.
///
/// The admin surface PATCHes individual fields, so everything downstream of
/// the config channel has to merge rather than replace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameplayConfigUpdate {
    /// New world width, if changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    /// New world height, if changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    /// New tick rate, if changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tick_rate: Option<f64>,
    /// New food count, if changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub food_count: Option<u32>,
    /// New snapshot interval, if changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_interval: Option<f64>,
}

impl GameplayConfigUpdate {
    /// Lifts a full configuration into an update that sets every field.
    #[must_use]
    pub fn from_full(config: &GameplayConfig) -> Self {
        Self {
            width: Some(config.width),
            height: Some(config.height),
            tick_rate: Some(config.tick_rate),
            food_count: Some(config.food_count),
            snapshot_interval: Some(config.snapshot_interval),
        }
    }

    /// Applies the present fields onto `config`.
    pub fn apply_to(&self, config: &mut GameplayConfig) {
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if let Some(tick_rate) = self.tick_rate {
            config.tick_rate = tick_rate;
        }
        if let Some(food_count) = self.food_count {
            config.food_count = food_count;
        }
        if let Some(snapshot_interval) = self.snapshot_interval {
            config.snapshot_interval = snapshot_interval;
        }
    }
}

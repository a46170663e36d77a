//! Server settings.
//!
//! Loaded from an optional JSON5 file (`MITOS_CONFIG`, falling back to
//! `./server.json5`), then overridden by environment variables. Everything
//! has a default so a bare `mitos` starts a usable development server.

use std::path::Path;

use serde::Deserialize;

/// A user seeded into the in-memory account store at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct UserSeed {
    /// Login name.
    pub username: String,
    /// Password, stored as given. Development use only; production
    /// deployments back the account store with the relational service.
    pub password: String,
}

/// Process-level configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Address the HTTP/WebSocket listener binds to.
    pub bind: String,
    /// Directory for world snapshot files.
    pub snapshot_dir: String,
    /// Default tick rate handed to the world manager.
    pub tick_rate: f64,
    /// Users created in the in-memory account store.
    pub users: Vec<UserSeed>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_owned(),
            snapshot_dir: "data/snapshots".to_owned(),
            tick_rate: 30.0,
            users: Vec::new(),
        }
    }
}

impl Settings {
    /// Loads settings from the config file (if any) and the environment.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("MITOS_CONFIG").unwrap_or_else(|_| "server.json5".to_owned());
        let mut settings = if Path::new(&path).exists() {
            let raw = std::fs::read_to_string(&path)?;
            Self::parse(&raw)?
        } else {
            Self::default()
        };

        if let Ok(bind) = std::env::var("MITOS_BIND") {
            settings.bind = bind;
        }
        if let Ok(dir) = std::env::var("SNAPSHOT_DIR") {
            settings.snapshot_dir = dir;
        }
        if let Ok(rate) = std::env::var("MITOS_TICK_RATE")
            && let Ok(rate) = rate.parse::<f64>()
        {
            settings.tick_rate = rate;
        }

        Ok(settings)
    }

    fn parse(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_json5::from_str(raw)?)
    }
}

//! The Mitos world runtime.
//!
//! This crate owns the ground truth of the game: the per-world tick loop, the
//! steering physics, the cell/food/player data model with split and merge
//! semantics, snapshot fan-out, and the orchestration around them (world
//! directory, configuration propagation, statistics aggregation, snapshot
//! persistence). Everything network-facing lives in `mitos-gateway`.

pub mod accounts;
pub mod config_service;
pub mod player;
pub mod snapshot_repo;
pub mod stats;
pub mod world;

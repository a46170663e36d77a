//! The session layer: HTTP bootstrap, the game WebSocket, the token store
//! and the connection hub.
//!
//! The gateway owns everything between the network and the world runtime. It
//! authenticates credentials against the account store, issues session
//! tokens, runs the per-connection reader/writer loops, fans configuration
//! updates out to every connected session, and turns elimination events into
//! `eliminated` frames and 4404 closes.

pub mod error;
pub mod hub;
pub mod routes;
mod session;
pub mod token;

use std::sync::Arc;

use mitos_core::accounts::{AccountStore, StatsDelta};
use mitos_core::config_service::{ConfigBroadcast, ConfigService};
use mitos_core::stats::StatsService;
use mitos_core::world::events::WorldEvent;
use mitos_core::world::manager::WorldManager;
use mitos_protocol::{GameplayConfig, ServerMessage, close_code};

use hub::ConnectionHub;
use token::TokenStore;

pub use routes::router;

/// Everything the HTTP handlers and sessions share.
pub struct GatewayContext {
    /// The world directory.
    pub manager: Arc<WorldManager>,
    /// Session tokens.
    pub tokens: Arc<TokenStore>,
    /// Open game connections.
    pub hub: Arc<ConnectionHub>,
    /// Live gameplay configuration.
    pub config: Arc<ConfigService>,
    /// Progress reporting.
    pub stats: Arc<StatsService>,
    /// Credential checks.
    pub accounts: Arc<dyn AccountStore>,
}

/// Builds the config-service broadcast callback: every applied configuration
/// change becomes a `config_update` frame on every open connection.
#[must_use]
pub fn config_broadcaster(hub: Arc<ConnectionHub>) -> ConfigBroadcast {
    Arc::new(move |config: &GameplayConfig| {
        hub.broadcast_global(&ServerMessage::ConfigUpdate {
            config: config.clone(),
        });
    })
}

/// Registers the gateway's world-event listener: eliminations are pushed to
/// the affected connection as an `eliminated` frame followed by a 4404
/// close, and the eliminated player's final counters are flushed to the
/// stats service.
pub fn install_world_listener(ctx: &Arc<GatewayContext>) {
    let hub = Arc::clone(&ctx.hub);
    let stats = Arc::clone(&ctx.stats);
    ctx.manager
        .register_event_listener(Arc::new(move |world_id, event| {
            handle_world_event(&hub, &stats, world_id, event);
        }));
}

/// Listener body, kept free of the registration plumbing so it can be tested
/// against hand-built events. Must not block: it runs on the world runner
/// between ticks.
fn handle_world_event(
    hub: &Arc<ConnectionHub>,
    stats: &Arc<StatsService>,
    world_id: &str,
    event: &WorldEvent,
) {
    let WorldEvent::PlayerEliminated {
        winner_name,
        loser_id,
        loser_food_eaten,
        loser_cells_eaten,
        ..
    } = event;

    // The loser is already gone from the world, so their session's normal
    // disconnect path has nothing to flush; do it from here.
    if let Some(username) = hub.username_of(world_id, loser_id) {
        let delta = StatsDelta {
            food_eaten: *loser_food_eaten,
            cells_eaten: *loser_cells_eaten,
            ..StatsDelta::default()
        };
        if !delta.is_zero() {
            let stats = Arc::clone(stats);
            tokio::spawn(async move {
                stats.add_progress(&username, delta).await;
            });
        }
    }

    hub.send_to(
        world_id,
        loser_id,
        ServerMessage::Eliminated {
            by: winner_name.clone(),
            world: world_id.to_owned(),
        },
    );
    hub.close(world_id, loser_id, close_code::ELIMINATED, "Eliminated");
}

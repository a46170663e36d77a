//! The Mitos server binary: wiring and lifecycle.

mod settings;

use std::sync::Arc;

use mitos_core::accounts::{AccountStore, MemoryAccountStore};
use mitos_core::config_service::ConfigService;
use mitos_core::snapshot_repo::SnapshotRepository;
use mitos_core::stats::StatsService;
use mitos_core::world::manager::WorldManager;
use mitos_gateway::hub::ConnectionHub;
use mitos_gateway::token::TokenStore;
use mitos_gateway::{GatewayContext, config_broadcaster, install_world_listener};
use mitos_protocol::GameplayConfig;
use mitos_utils::pubsub::Hub;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use settings::Settings;

fn init_logging() {
    // `log` records from the library crates flow through the tracing-log
    // bridge enabled on the subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let settings = Settings::load()?;

    let defaults = GameplayConfig {
        tick_rate: settings.tick_rate,
        ..GameplayConfig::default()
    };

    let accounts = Arc::new(MemoryAccountStore::new(defaults.clone()));
    for user in &settings.users {
        accounts.add_user(&user.username, &user.password);
    }
    if settings.users.is_empty() {
        log::warn!("no users configured; logins will fail until users are seeded");
    }

    let snapshot_repo = Arc::new(SnapshotRepository::new(&settings.snapshot_dir)?);
    let manager = WorldManager::new(snapshot_repo, defaults);

    let hub = Arc::new(ConnectionHub::new());
    let stats = StatsService::new(
        Arc::clone(&accounts) as Arc<dyn AccountStore>,
        Arc::new(Hub::new(64)),
    );
    let config = ConfigService::new(
        Arc::clone(&accounts) as Arc<dyn AccountStore>,
        Arc::clone(&manager),
        Arc::new(Hub::new(16)),
        config_broadcaster(Arc::clone(&hub)),
    );
    config.start().await?;

    let ctx = Arc::new(GatewayContext {
        manager: Arc::clone(&manager),
        tokens: Arc::new(TokenStore::new()),
        hub,
        config: Arc::clone(&config),
        stats,
        accounts,
    });
    install_world_listener(&ctx);

    let router = mitos_gateway::router(ctx);
    let listener = tokio::net::TcpListener::bind(&settings.bind).await?;
    log::info!("listening on {}", settings.bind);

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("shutdown requested");
                shutdown.cancel();
            }
        });
    }

    axum::serve(listener, router)
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move { shutdown.cancelled().await }
        })
        .await?;

    config.stop();
    manager.shutdown();
    log::info!("bye");
    Ok(())
}

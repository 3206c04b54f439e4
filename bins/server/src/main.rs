//! Tally API Server
//!
//! Main entry point for the Tally ledger service.

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tally_api::{AppState, create_router};
use tally_db::connect_with;
use tally_db::migration::{Migrator, MigratorTrait};
use tally_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tally=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let db = connect_with(&config.database).await?;
    info!("Connected to database");

    Migrator::up(&db, None).await?;
    info!("Migrations applied");

    info!(
        undo_enabled = config.settings.undo.enabled,
        undo_delete = config.settings.undo.delete,
        undo_timeout = ?config.settings.undo.timeout,
        "Ledger settings loaded"
    );
    let state = AppState::new(db, config.settings);
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

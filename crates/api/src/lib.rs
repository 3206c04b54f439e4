//! HTTP API layer with Axum routes.
//!
//! This crate provides:
//! - REST API routes for users, articles, transactions and settings
//! - Mapping of domain errors to JSON error responses

pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use sea_orm::DatabaseConnection;
use tally_core::ledger::TransactionEngine;
use tally_db::LedgerRepository;
use tally_shared::LedgerSettings;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: Arc<DatabaseConnection>,
    /// Transaction engine over the database ledger store.
    pub engine: Arc<TransactionEngine<LedgerRepository>>,
    /// Ledger settings in effect.
    pub settings: Arc<LedgerSettings>,
}

impl AppState {
    /// Builds the state, wiring the engine to `db` and `settings`.
    #[must_use]
    pub fn new(db: DatabaseConnection, settings: LedgerSettings) -> Self {
        let settings = Arc::new(settings);
        let engine = TransactionEngine::new(LedgerRepository::new(db.clone()), settings.clone());
        Self {
            db: Arc::new(db),
            engine: Arc::new(engine),
            settings,
        }
    }
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

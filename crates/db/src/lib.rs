//! Database layer with `SeaORM` entities and repositories.
//!
//! This crate provides:
//! - `SeaORM` entity definitions
//! - The `SeaORM` implementation of the ledger store
//! - Repositories for users and articles
//! - Database migrations

pub mod convert;
pub mod entities;
pub mod error;
pub mod migration;
pub mod repositories;
pub mod scope;

pub use repositories::{ArticleRepository, LedgerRepository, UserRepository};
pub use scope::SeaOrmScope;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use tally_shared::config::DatabaseConfig;

/// Establishes a pooled connection using the configured pool bounds.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect_with(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .sqlx_logging(false);
    Database::connect(options).await
}

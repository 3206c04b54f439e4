//! API route definitions.

use axum::Router;

use crate::AppState;

pub mod articles;
pub mod health;
pub mod settings;
pub mod transactions;
pub mod users;

/// Creates the API router with all routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(settings::routes())
        .merge(users::routes())
        .merge(articles::routes())
        .merge(transactions::routes())
}

/// Formats a timestamp the way every response renders it.
pub(crate) fn format_timestamp(timestamp: chrono::DateTime<chrono::Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
}

//! Read-only view of the ledger settings.

use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use serde_json::json;

use crate::AppState;

/// Creates the settings routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/settings", get(get_settings))
}

/// GET `/settings` - Boundaries, undo policy and stale period in effect.
async fn get_settings(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "settings": state.settings.as_ref() }))
}

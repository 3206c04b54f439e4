//! User registration and listing routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tally_core::ledger::User;
use tally_db::repositories::{CreateUserInput, UpdateUserInput, UserRepository};
use tally_shared::AppError;
use tally_shared::types::UserId;
use tracing::info;

use super::format_timestamp;
use crate::{AppState, error::ApiError};

/// Maximum length of a user name.
const MAX_NAME_LENGTH: usize = 64;

/// Creates the user routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/user", get(list_users).post(create_user))
        .route("/user/{user_id}", get(get_user).post(update_user))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for listing users.
#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    /// Only users with (`true`) or without (`false`) activity within the stale period.
    pub active: Option<bool>,
    /// Include disabled users.
    #[serde(default)]
    pub disabled: bool,
}

/// Request body for registering a user.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    /// Unique display name.
    pub name: String,
    /// Optional contact email.
    pub email: Option<String>,
}

/// Request body for updating a user. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    /// New display name.
    pub name: Option<String>,
    /// New contact email, blank to clear it.
    pub email: Option<String>,
    /// Disable or re-enable the account.
    pub is_disabled: Option<bool>,
}

/// Response for a user.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    /// User ID.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Contact email.
    pub email: Option<String>,
    /// Current balance.
    pub balance: i64,
    /// Had balance activity within the stale period.
    pub is_active: bool,
    /// Account is disabled.
    pub is_disabled: bool,
    /// Registration time.
    pub created: String,
    /// Last balance activity.
    pub updated: Option<String>,
}

impl UserResponse {
    /// Builds the response, deriving activity from `stale_period`.
    pub fn new(user: User, stale_period: Duration) -> Self {
        let is_active = user.is_active_since(Utc::now() - stale_period);
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            balance: user.balance,
            is_active,
            is_disabled: user.disabled,
            created: format_timestamp(user.created),
            updated: user.updated.map(format_timestamp),
        }
    }
}

pub(crate) fn stale_period(state: &AppState) -> Duration {
    Duration::from_std(state.settings.stale_period()).unwrap_or_else(|_| Duration::days(10))
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET `/user` - List users ordered by name.
async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = UserRepository::new((*state.db).clone());
    let users = repo.list(query.disabled).await?;

    let stale_period = stale_period(&state);
    let users: Vec<UserResponse> = users
        .into_iter()
        .map(|user| UserResponse::new(user, stale_period))
        .filter(|user| query.active.is_none_or(|active| user.is_active == active))
        .collect();

    Ok(Json(json!({ "users": users })))
}

/// POST `/user` - Register a user.
async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = validate_name(&payload.name)?;

    let repo = UserRepository::new((*state.db).clone());
    let user = repo
        .create(CreateUserInput {
            name: name.to_string(),
            email: payload.email.filter(|email| !email.trim().is_empty()),
        })
        .await?;

    info!(user_id = %user.id, name = %user.name, "User registered");
    let user = UserResponse::new(user, stale_period(&state));
    Ok((StatusCode::CREATED, Json(json!({ "user": user }))))
}

fn validate_name(name: &str) -> Result<&str, AppError> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LENGTH {
        return Err(AppError::Validation(format!(
            "Name must be between 1 and {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(name)
}

/// GET `/user/{user_id}` - Get a single user.
async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = UserRepository::new((*state.db).clone());
    let user = repo
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User '{user_id}' not found")))?;

    let user = UserResponse::new(user, stale_period(&state));
    Ok(Json(json!({ "user": user })))
}

/// POST `/user/{user_id}` - Rename, change email, or enable/disable a user.
async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = payload
        .name
        .as_deref()
        .map(validate_name)
        .transpose()?
        .map(str::to_string);

    let repo = UserRepository::new((*state.db).clone());
    let user = repo
        .update(
            user_id,
            UpdateUserInput {
                name,
                email: payload.email,
                disabled: payload.is_disabled,
            },
        )
        .await?;

    info!(user_id = %user_id, disabled = user.disabled, "User updated");
    let user = UserResponse::new(user, stale_period(&state));
    Ok(Json(json!({ "user": user })))
}

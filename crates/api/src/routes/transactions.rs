//! Transaction routes.
//!
//! Deposits, purchases and transfers are all created through
//! `POST /user/{user_id}/transaction`; the fields present decide which.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tally_core::ledger::{Transaction, TransactionRequest};
use tally_shared::types::{ArticleId, PageRequest, TransactionId, UserId};
use tracing::info;

use super::articles::ArticleResponse;
use super::format_timestamp;
use super::users::{UserResponse, stale_period};
use crate::{AppState, error::ApiError};

/// Creates the transaction routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/user/{user_id}/transaction",
            get(list_transactions).post(create_transaction),
        )
        .route(
            "/user/{user_id}/transaction/{transaction_id}",
            get(get_transaction).delete(revert_transaction),
        )
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for creating a transaction.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    /// Amount for deposits and transfers.
    #[serde(default)]
    pub amount: i64,
    /// Optional free text.
    pub comment: Option<String>,
    /// Purchased quantity.
    pub quantity: Option<i64>,
    /// Article to buy.
    pub article_id: Option<ArticleId>,
    /// User to send money to.
    pub recipient_id: Option<UserId>,
}

/// Response for a transaction.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    /// Transaction ID.
    pub id: TransactionId,
    /// Owning user.
    pub user: UserResponse,
    /// Purchased article.
    pub article: Option<ArticleResponse>,
    /// Purchased quantity.
    pub quantity: Option<i64>,
    /// Free text.
    pub comment: Option<String>,
    /// Balance delta.
    pub amount: i64,
    /// Recipient side of a transfer.
    pub recipient_transaction_id: Option<TransactionId>,
    /// Sender side of a transfer.
    pub sender_transaction_id: Option<TransactionId>,
    /// Whether the transaction was reverted.
    pub is_deleted: bool,
    /// Whether the transaction can still be reverted.
    pub is_deletable: bool,
    /// Creation time.
    pub created: String,
}

impl TransactionResponse {
    fn new(transaction: Transaction, stale_period: Duration) -> Self {
        Self {
            id: transaction.id,
            user: UserResponse::new(transaction.user, stale_period),
            article: transaction.article.map(ArticleResponse::from),
            quantity: transaction.quantity,
            comment: transaction.comment,
            amount: transaction.amount,
            recipient_transaction_id: transaction.recipient_transaction,
            sender_transaction_id: transaction.sender_transaction,
            is_deleted: transaction.is_deleted,
            is_deletable: transaction.is_deletable,
            created: format_timestamp(transaction.created),
        }
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET `/user/{user_id}/transaction` - List a user's transactions, newest first.
async fn list_transactions(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Query(page): Query<PageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let page = PageRequest::new(page.page, page.per_page);
    let response = state
        .engine
        .page_transactions_for_user(user_id, page)
        .await?;

    let stale_period = stale_period(&state);
    let transactions: Vec<TransactionResponse> = response
        .data
        .into_iter()
        .map(|transaction| TransactionResponse::new(transaction, stale_period))
        .collect();

    Ok(Json(json!({
        "transactions": transactions,
        "meta": response.meta
    })))
}

/// POST `/user/{user_id}/transaction` - Deposit, purchase or transfer.
async fn create_transaction(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Json(payload): Json<CreateTransactionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let request = TransactionRequest {
        user_id,
        amount: payload.amount,
        comment: payload.comment.filter(|comment| !comment.is_empty()),
        quantity: payload.quantity,
        article_id: payload.article_id,
        recipient_id: payload.recipient_id,
    };

    let transaction = state.engine.process_transaction(request).await?;

    info!(user_id = %user_id, transaction_id = %transaction.id, "Transaction created");
    let transaction = TransactionResponse::new(transaction, stale_period(&state));
    Ok((
        StatusCode::CREATED,
        Json(json!({ "transaction": transaction })),
    ))
}

/// GET `/user/{user_id}/transaction/{transaction_id}` - Get a single transaction.
async fn get_transaction(
    State(state): State<AppState>,
    Path((user_id, transaction_id)): Path<(UserId, TransactionId)>,
) -> Result<impl IntoResponse, ApiError> {
    let transaction = state
        .engine
        .get_user_transaction(user_id, transaction_id)
        .await?;

    let transaction = TransactionResponse::new(transaction, stale_period(&state));
    Ok(Json(json!({ "transaction": transaction })))
}

/// DELETE `/user/{user_id}/transaction/{transaction_id}` - Revert a transaction.
async fn revert_transaction(
    State(state): State<AppState>,
    Path((user_id, transaction_id)): Path<(UserId, TransactionId)>,
) -> Result<impl IntoResponse, ApiError> {
    let transaction = state
        .engine
        .revert_user_transaction(user_id, transaction_id)
        .await?;

    info!(user_id = %user_id, transaction_id = %transaction_id, "Transaction reverted");
    let transaction = TransactionResponse::new(transaction, stale_period(&state));
    Ok(Json(json!({ "transaction": transaction })))
}

//! Article catalog routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tally_core::ledger::Article;
use tally_db::repositories::{ArticleInput, ArticleRepository};
use tally_shared::AppError;
use tally_shared::types::ArticleId;
use tracing::info;

use super::format_timestamp;
use crate::{AppState, error::ApiError};

/// Creates the article routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/article", get(list_articles).post(create_article))
        .route(
            "/article/{article_id}",
            get(get_article).post(update_article).delete(deactivate_article),
        )
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for listing articles.
#[derive(Debug, Default, Deserialize)]
pub struct ListArticlesQuery {
    /// Include inactive articles.
    #[serde(default)]
    pub inactive: bool,
}

/// Request body for creating or updating an article.
#[derive(Debug, Deserialize)]
pub struct ArticleRequest {
    /// Display name.
    pub name: String,
    /// Optional barcode.
    pub barcode: Option<String>,
    /// Unit price.
    pub amount: i64,
}

impl ArticleRequest {
    fn into_input(self) -> Result<ArticleInput, AppError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("Article name is required".to_string()));
        }
        Ok(ArticleInput {
            name,
            barcode: self
                .barcode
                .map(|barcode| barcode.trim().to_string())
                .filter(|barcode| !barcode.is_empty()),
            amount: self.amount,
        })
    }
}

/// Response for an article.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleResponse {
    /// Article ID.
    pub id: ArticleId,
    /// Previous version of this article.
    pub precursor_id: Option<ArticleId>,
    /// Display name.
    pub name: String,
    /// Barcode.
    pub barcode: Option<String>,
    /// Unit price.
    pub amount: i64,
    /// Whether the article can be purchased.
    pub is_active: bool,
    /// Number of purchases.
    pub usage_count: i64,
    /// Creation time.
    pub created: String,
}

impl From<Article> for ArticleResponse {
    fn from(article: Article) -> Self {
        Self {
            id: article.id,
            precursor_id: article.precursor,
            name: article.name,
            barcode: article.barcode,
            amount: article.amount,
            is_active: article.is_active,
            usage_count: article.usage_count,
            created: format_timestamp(article.created),
        }
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET `/article` - List articles ordered by name.
async fn list_articles(
    State(state): State<AppState>,
    Query(query): Query<ListArticlesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = ArticleRepository::new((*state.db).clone());
    let articles: Vec<ArticleResponse> = repo
        .list(query.inactive)
        .await?
        .into_iter()
        .map(ArticleResponse::from)
        .collect();

    Ok(Json(json!({ "articles": articles })))
}

/// POST `/article` - Create an article.
async fn create_article(
    State(state): State<AppState>,
    Json(payload): Json<ArticleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = ArticleRepository::new((*state.db).clone());
    let article = repo.create(payload.into_input()?).await?;

    info!(article_id = %article.id, amount = article.amount, "Article created");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "article": ArticleResponse::from(article) })),
    ))
}

/// GET `/article/{article_id}` - Get a single article.
async fn get_article(
    State(state): State<AppState>,
    Path(article_id): Path<ArticleId>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = ArticleRepository::new((*state.db).clone());
    let article = repo
        .find_by_id(article_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Article '{article_id}' not found")))?;

    Ok(Json(json!({ "article": ArticleResponse::from(article) })))
}

/// POST `/article/{article_id}` - Replace an article with a new version.
async fn update_article(
    State(state): State<AppState>,
    Path(article_id): Path<ArticleId>,
    Json(payload): Json<ArticleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = ArticleRepository::new((*state.db).clone());
    let article = repo.update(article_id, payload.into_input()?).await?;

    info!(precursor_id = %article_id, article_id = %article.id, "Article updated");
    Ok(Json(json!({ "article": ArticleResponse::from(article) })))
}

/// DELETE `/article/{article_id}` - Deactivate an article.
async fn deactivate_article(
    State(state): State<AppState>,
    Path(article_id): Path<ArticleId>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = ArticleRepository::new((*state.db).clone());
    let article = repo.deactivate(article_id).await?;

    info!(article_id = %article_id, "Article deactivated");
    Ok(Json(json!({ "article": ArticleResponse::from(article) })))
}

//! Mapping of domain errors to HTTP responses.
//!
//! Every error body has the shape `{ "error": CODE, "message": text }`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tally_core::ledger::LedgerError;
use tally_db::repositories::{ArticleError, UserError};
use tally_shared::AppError;
use tracing::error;

/// Error returned by API handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Transaction engine failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Any other application failure.
    #[error(transparent)]
    App(#[from] AppError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        let code = match self {
            Self::Ledger(err) => err.http_status_code(),
            Self::App(err) => err.status_code(),
        };
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Ledger(err) => err.error_code(),
            Self::App(err) => err.error_code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!(error = %self, "Request failed");
            "An error occurred".to_string()
        } else {
            self.to_string()
        };

        (
            status,
            Json(json!({
                "error": self.code(),
                "message": message
            })),
        )
            .into_response()
    }
}

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        let app = match &err {
            UserError::DuplicateName(_) => AppError::Conflict(err.to_string()),
            UserError::NotFound(_) => AppError::NotFound(err.to_string()),
            UserError::Database(db) => AppError::Database(db.to_string()),
        };
        Self::App(app)
    }
}

impl From<ArticleError> for ApiError {
    fn from(err: ArticleError) -> Self {
        let app = match &err {
            ArticleError::DuplicateBarcode(_) => AppError::Conflict(err.to_string()),
            ArticleError::NotFound(_) => AppError::NotFound(err.to_string()),
            ArticleError::Inactive(_) => AppError::BusinessRule(err.to_string()),
            ArticleError::Database(db) => AppError::Database(db.to_string()),
        };
        Self::App(app)
    }
}

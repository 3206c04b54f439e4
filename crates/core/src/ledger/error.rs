//! Ledger error types.
//!
//! Every failure aborts the enclosing atomic scope. The engine never retries;
//! [`LedgerError::is_retryable`] tells the caller which failures may succeed on a
//! second attempt.

use tally_shared::types::{ArticleId, TransactionId, UserId};
use thiserror::Error;

/// Which side of a boundary was crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    /// The value is above the configured upper limit.
    Upper,
    /// The value is below the configured lower limit.
    Lower,
}

impl Limit {
    fn phrase(self) -> &'static str {
        match self {
            Self::Upper => "exceeds upper",
            Self::Lower => "is below lower",
        }
    }
}

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// The request combines fields no operation accepts.
    #[error("{0}")]
    InvalidOperation(String),

    /// Comment exceeds the maximum length.
    #[error("Comment is too long: {0} characters (max 255)")]
    CommentTooLong(usize),

    /// An amount or balance left the representable range.
    #[error("Amount is out of range")]
    AmountOverflow,

    // ========== Lookup Errors ==========
    /// User not found.
    #[error("User '{0}' not found")]
    UserNotFound(UserId),

    /// Article not found.
    #[error("Article '{0}' not found")]
    ArticleNotFound(ArticleId),

    /// Transaction not found.
    #[error("Transaction '{0}' not found")]
    TransactionNotFound(TransactionId),

    // ========== Business Rule Errors ==========
    /// Purchase against a deactivated article.
    #[error("Article '{0}' is inactive")]
    ArticleInactive(ArticleId),

    /// A single transaction amount is outside the payment boundary.
    #[error("Transaction amount '{amount}' {} transaction boundary '{boundary}'", .limit.phrase())]
    TransactionBoundaryExceeded {
        /// The offending amount.
        amount: i64,
        /// The violated limit.
        boundary: i64,
        /// Which limit was violated.
        limit: Limit,
    },

    /// A resulting balance is outside the account boundary.
    #[error("Transaction amount '{amount}' leads to balance '{balance}' which {} account boundary '{boundary}'", .limit.phrase())]
    AccountBalanceBoundaryExceeded {
        /// The transaction amount that was applied.
        amount: i64,
        /// The resulting balance.
        balance: i64,
        /// The violated limit.
        boundary: i64,
        /// Which limit was violated.
        limit: Limit,
    },

    /// The transaction can no longer be reverted.
    #[error("Transaction '{0}' is not deletable")]
    NotDeletable(TransactionId),

    // ========== Storage Errors ==========
    /// A conflicting scope holds the rows, retry later.
    #[error("Concurrent modification detected, please retry")]
    ConcurrentModification,

    /// Opaque storage failure.
    #[error("Persistence failure: {0}")]
    Persistence(String),
}

impl LedgerError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidOperation(_) => "INVALID_OPERATION",
            Self::CommentTooLong(_) => "COMMENT_TOO_LONG",
            Self::AmountOverflow => "AMOUNT_OVERFLOW",
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::ArticleNotFound(_) => "ARTICLE_NOT_FOUND",
            Self::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            Self::ArticleInactive(_) => "ARTICLE_INACTIVE",
            Self::TransactionBoundaryExceeded { .. } => "TRANSACTION_BOUNDARY_EXCEEDED",
            Self::AccountBalanceBoundaryExceeded { .. } => "ACCOUNT_BALANCE_BOUNDARY_EXCEEDED",
            Self::NotDeletable(_) => "TRANSACTION_NOT_DELETABLE",
            Self::ConcurrentModification => "CONCURRENT_MODIFICATION",
            Self::Persistence(_) => "PERSISTENCE_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - validation errors
            Self::InvalidOperation(_) | Self::CommentTooLong(_) | Self::AmountOverflow => 400,

            // 404 Not Found
            Self::UserNotFound(_) | Self::ArticleNotFound(_) | Self::TransactionNotFound(_) => {
                404
            }

            // 409 Conflict - state and concurrency errors
            Self::NotDeletable(_) | Self::ConcurrentModification => 409,

            // 422 Unprocessable Entity - business rules
            Self::ArticleInactive(_)
            | Self::TransactionBoundaryExceeded { .. }
            | Self::AccountBalanceBoundaryExceeded { .. } => 422,

            // 500 Internal Server Error
            Self::Persistence(_) => 500,
        }
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification)
    }
}

//! Ledger domain types.
//!
//! Amounts and balances are signed integers in the minor currency unit.
//! A negative transaction amount debits the owning user, a positive one credits it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_shared::types::{ArticleId, TransactionId, UserId};

use super::error::LedgerError;

/// Maximum comment length in characters.
pub const MAX_COMMENT_LENGTH: usize = 255;

/// A tally list member and their balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// The user ID.
    pub id: UserId,
    /// Unique display name.
    pub name: String,
    /// Optional contact email.
    pub email: Option<String>,
    /// Current balance.
    pub balance: i64,
    /// Whether the account is disabled.
    pub disabled: bool,
    /// Registration time.
    pub created: DateTime<Utc>,
    /// Time of the last balance-affecting mutation.
    pub updated: Option<DateTime<Utc>>,
}

impl User {
    /// Adds `amount` to the balance.
    ///
    /// # Errors
    ///
    /// Returns `AmountOverflow` if the balance would leave the `i64` range.
    pub fn add_balance(&mut self, amount: i64) -> Result<(), LedgerError> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(LedgerError::AmountOverflow)?;
        Ok(())
    }

    /// Returns true if the user had balance activity after `since`.
    #[must_use]
    pub fn is_active_since(&self, since: DateTime<Utc>) -> bool {
        self.updated.is_some_and(|updated| updated > since)
    }
}

/// A purchasable catalog item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// The article ID.
    pub id: ArticleId,
    /// Previous version of this article in the catalog, if any.
    pub precursor: Option<ArticleId>,
    /// Display name.
    pub name: String,
    /// Barcode, unique among active articles.
    pub barcode: Option<String>,
    /// Unit price.
    pub amount: i64,
    /// Only active articles may be purchased.
    pub is_active: bool,
    /// Creation time.
    pub created: DateTime<Utc>,
    /// Number of purchase calls that referenced this article.
    pub usage_count: i64,
}

impl Article {
    /// Records one purchase.
    pub fn increment_usage_count(&mut self) {
        self.usage_count += 1;
    }

    /// Takes back one purchase. Never drops below zero.
    pub fn decrement_usage_count(&mut self) {
        self.usage_count = (self.usage_count - 1).max(0);
    }
}

/// A stored balance change.
///
/// Transfer pairs reference each other by id only; resolve the counterpart
/// through the store when needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// The transaction ID.
    pub id: TransactionId,
    /// The owning user as of the operation that produced this value.
    pub user: User,
    /// The purchased article, if this is a purchase.
    pub article: Option<Article>,
    /// Purchased quantity, set together with `article`.
    pub quantity: Option<i64>,
    /// Optional free text.
    pub comment: Option<String>,
    /// The balance delta applied to `user`.
    pub amount: i64,
    /// Sender side of a transfer: the recipient's transaction.
    pub recipient_transaction: Option<TransactionId>,
    /// Recipient side of a transfer: the sender's transaction.
    pub sender_transaction: Option<TransactionId>,
    /// Whether the transaction has been reverted.
    pub is_deleted: bool,
    /// Computed on every read, never persisted.
    pub is_deletable: bool,
    /// Creation time.
    pub created: DateTime<Utc>,
}

impl Transaction {
    /// Returns the ids of the linked transfer counterpart(s).
    pub fn siblings(&self) -> impl Iterator<Item = TransactionId> {
        self.recipient_transaction
            .into_iter()
            .chain(self.sender_transaction)
    }
}

/// A transaction row to be inserted by the store.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    /// Owner snapshot, balance already applied.
    pub user: User,
    /// Purchased article snapshot.
    pub article: Option<Article>,
    /// Purchased quantity.
    pub quantity: Option<i64>,
    /// Optional free text.
    pub comment: Option<String>,
    /// The balance delta.
    pub amount: i64,
    /// Set on the sender side of a transfer.
    pub recipient_transaction: Option<TransactionId>,
    /// Creation time.
    pub created: DateTime<Utc>,
}

/// Classification of a [`TransactionRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    /// Plain deposit or withdrawal.
    Deposit,
    /// Purchase of a catalog article.
    Purchase {
        /// The article being bought.
        article_id: ArticleId,
    },
    /// Money sent to another user, optionally priced by an article.
    Transfer {
        /// The receiving user.
        recipient_id: UserId,
        /// Article whose price determines the amount.
        article_id: Option<ArticleId>,
    },
}

/// Input for [`TransactionEngine::process_transaction`](super::TransactionEngine::process_transaction).
///
/// Every field combination is representable; [`TransactionRequest::validate`]
/// rejects the illegal ones.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    /// The acting user (the sender for transfers).
    pub user_id: UserId,
    /// Caller-supplied amount. Ignored for purchases, must not be positive with
    /// an article or recipient.
    #[serde(default)]
    pub amount: i64,
    /// Optional free text.
    #[serde(default)]
    pub comment: Option<String>,
    /// Purchased quantity, defaults to 1.
    #[serde(default)]
    pub quantity: Option<i64>,
    /// Article to buy.
    #[serde(default)]
    pub article_id: Option<ArticleId>,
    /// User to send money to.
    #[serde(default)]
    pub recipient_id: Option<UserId>,
}

impl TransactionRequest {
    /// A deposit (positive) or withdrawal (negative).
    #[must_use]
    pub fn deposit(user_id: UserId, amount: i64) -> Self {
        Self {
            user_id,
            amount,
            ..Self::default()
        }
    }

    /// A purchase of `quantity` units of an article.
    #[must_use]
    pub fn purchase(user_id: UserId, article_id: ArticleId, quantity: Option<i64>) -> Self {
        Self {
            user_id,
            article_id: Some(article_id),
            quantity,
            ..Self::default()
        }
    }

    /// A transfer of `amount` (non-positive) from `user_id` to `recipient_id`.
    #[must_use]
    pub fn transfer(user_id: UserId, recipient_id: UserId, amount: i64) -> Self {
        Self {
            user_id,
            amount,
            recipient_id: Some(recipient_id),
            ..Self::default()
        }
    }

    /// Attaches a comment.
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Attaches an article to a transfer.
    #[must_use]
    pub fn with_article(mut self, article_id: ArticleId) -> Self {
        self.article_id = Some(article_id);
        self
    }

    /// Classifies the request by which optional fields are set.
    #[must_use]
    pub fn kind(&self) -> TransactionKind {
        match (self.recipient_id, self.article_id) {
            (Some(recipient_id), article_id) => TransactionKind::Transfer {
                recipient_id,
                article_id,
            },
            (None, Some(article_id)) => TransactionKind::Purchase { article_id },
            (None, None) => TransactionKind::Deposit,
        }
    }

    /// Rejects field combinations that no operation accepts.
    ///
    /// # Errors
    ///
    /// - `InvalidOperation` for a positive amount with an article or recipient,
    ///   a self-transfer, or a quantity below 1
    /// - `CommentTooLong` for comments over [`MAX_COMMENT_LENGTH`] characters
    pub fn validate(&self) -> Result<(), LedgerError> {
        if (self.article_id.is_some() || self.recipient_id.is_some()) && self.amount > 0 {
            return Err(LedgerError::InvalidOperation(
                "Amount can't be positive when sending money or buying an article".to_string(),
            ));
        }

        if self.recipient_id == Some(self.user_id) {
            return Err(LedgerError::InvalidOperation(
                "Sender and recipient must be different users".to_string(),
            ));
        }

        if self.article_id.is_some() && self.quantity.is_some_and(|q| q < 1) {
            return Err(LedgerError::InvalidOperation(
                "Quantity must be at least 1".to_string(),
            ));
        }

        if let Some(comment) = &self.comment {
            let length = comment.chars().count();
            if length > MAX_COMMENT_LENGTH {
                return Err(LedgerError::CommentTooLong(length));
            }
        }

        Ok(())
    }
}

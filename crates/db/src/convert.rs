//! Conversions between `SeaORM` models and ledger domain types.

use chrono::Utc;
use tally_core::ledger::{Article, Transaction, User};
use tally_shared::types::{ArticleId, TransactionId, UserId};

use crate::entities::{articles, transactions, users};

/// Maps a user row.
#[must_use]
pub fn user_from_model(model: users::Model) -> User {
    User {
        id: UserId::from_uuid(model.id),
        name: model.name,
        email: model.email,
        balance: model.balance,
        disabled: model.disabled,
        created: model.created.with_timezone(&Utc),
        updated: model.updated.map(|updated| updated.with_timezone(&Utc)),
    }
}

/// Maps an article row.
#[must_use]
pub fn article_from_model(model: articles::Model) -> Article {
    Article {
        id: ArticleId::from_uuid(model.id),
        precursor: model.precursor_id.map(ArticleId::from_uuid),
        name: model.name,
        barcode: model.barcode,
        amount: model.amount,
        is_active: model.is_active,
        created: model.created.with_timezone(&Utc),
        usage_count: model.usage_count,
    }
}

/// Maps a transaction row together with its resolved owner and article.
#[must_use]
pub fn transaction_from_model(
    model: transactions::Model,
    user: User,
    article: Option<Article>,
) -> Transaction {
    Transaction {
        id: TransactionId::from_uuid(model.id),
        user,
        article,
        quantity: model.quantity,
        comment: model.comment,
        amount: model.amount,
        recipient_transaction: model.recipient_transaction_id.map(TransactionId::from_uuid),
        sender_transaction: model.sender_transaction_id.map(TransactionId::from_uuid),
        is_deleted: model.deleted,
        is_deletable: false,
        created: model.created.with_timezone(&Utc),
    }
}

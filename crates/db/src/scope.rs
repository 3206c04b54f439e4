//! Atomic ledger scope over a database transaction.
//!
//! Every read and write of one engine operation goes through the wrapped
//! [`DatabaseTransaction`]. On PostgreSQL the `lock_*` reads take row locks
//! with `SELECT ... FOR UPDATE` that are held until commit or rollback.

use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait,
    QueryFilter, Set,
};
use tally_core::ledger::{Article, LedgerError, LedgerScope, NewTransaction, Transaction, User};
use tally_shared::types::{ArticleId, TransactionId, UserId};

use crate::convert::{article_from_model, user_from_model};
use crate::entities::{articles, transactions, users};
use crate::error::map_db_err;
use crate::repositories::ledger::{find_transaction, for_update};

/// A [`LedgerScope`] backed by a `SeaORM` transaction.
pub struct SeaOrmScope {
    txn: DatabaseTransaction,
}

impl SeaOrmScope {
    /// Wraps an open database transaction.
    #[must_use]
    pub fn new(txn: DatabaseTransaction) -> Self {
        Self { txn }
    }

    /// Returns the underlying transaction.
    #[must_use]
    pub fn transaction(&self) -> &DatabaseTransaction {
        &self.txn
    }

    fn backend(&self) -> sea_orm::DbBackend {
        self.txn.get_database_backend()
    }
}

#[async_trait]
impl LedgerScope for SeaOrmScope {
    async fn lock_user(&mut self, id: UserId) -> Result<Option<User>, LedgerError> {
        let user = for_update(users::Entity::find_by_id(id.into_inner()), self.backend())
            .one(&self.txn)
            .await
            .map_err(map_db_err)?;
        Ok(user.map(user_from_model))
    }

    async fn update_user(&mut self, user: &User) -> Result<(), LedgerError> {
        let result = users::Entity::update_many()
            .col_expr(users::Column::Balance, Expr::value(user.balance))
            .col_expr(
                users::Column::Updated,
                Expr::value(user.updated.map(|updated| updated.fixed_offset())),
            )
            .filter(users::Column::Id.eq(user.id.into_inner()))
            .exec(&self.txn)
            .await
            .map_err(map_db_err)?;

        if result.rows_affected == 0 {
            return Err(LedgerError::UserNotFound(user.id));
        }
        Ok(())
    }

    async fn lock_article(&mut self, id: ArticleId) -> Result<Option<Article>, LedgerError> {
        let article = for_update(articles::Entity::find_by_id(id.into_inner()), self.backend())
            .one(&self.txn)
            .await
            .map_err(map_db_err)?;
        Ok(article.map(article_from_model))
    }

    async fn update_article(&mut self, article: &Article) -> Result<(), LedgerError> {
        let result = articles::Entity::update_many()
            .col_expr(articles::Column::UsageCount, Expr::value(article.usage_count))
            .filter(articles::Column::Id.eq(article.id.into_inner()))
            .exec(&self.txn)
            .await
            .map_err(map_db_err)?;

        if result.rows_affected == 0 {
            return Err(LedgerError::ArticleNotFound(article.id));
        }
        Ok(())
    }

    async fn insert_transaction(
        &mut self,
        transaction: NewTransaction,
    ) -> Result<Transaction, LedgerError> {
        let id = TransactionId::new();
        let row = transactions::ActiveModel {
            id: Set(id.into_inner()),
            user_id: Set(transaction.user.id.into_inner()),
            article_id: Set(transaction
                .article
                .as_ref()
                .map(|article| article.id.into_inner())),
            recipient_transaction_id: Set(transaction
                .recipient_transaction
                .map(TransactionId::into_inner)),
            sender_transaction_id: Set(None),
            quantity: Set(transaction.quantity),
            comment: Set(transaction.comment.clone()),
            amount: Set(transaction.amount),
            deleted: Set(false),
            created: Set(transaction.created.fixed_offset()),
        };
        row.insert(&self.txn).await.map_err(map_db_err)?;

        Ok(Transaction {
            id,
            user: transaction.user,
            article: transaction.article,
            quantity: transaction.quantity,
            comment: transaction.comment,
            amount: transaction.amount,
            recipient_transaction: transaction.recipient_transaction,
            sender_transaction: None,
            is_deleted: false,
            is_deletable: false,
            created: transaction.created,
        })
    }

    async fn find_transaction(
        &mut self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, LedgerError> {
        find_transaction(&self.txn, id, false).await
    }

    async fn lock_transaction(
        &mut self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, LedgerError> {
        find_transaction(&self.txn, id, true).await
    }

    async fn link_sender_transaction(
        &mut self,
        recipient: TransactionId,
        sender: TransactionId,
    ) -> Result<(), LedgerError> {
        self.update_transaction(
            recipient,
            transactions::Column::SenderTransactionId,
            Expr::value(Some(sender.into_inner())),
        )
        .await
    }

    async fn mark_deleted(&mut self, id: TransactionId) -> Result<(), LedgerError> {
        self.update_transaction(id, transactions::Column::Deleted, Expr::value(true))
            .await
    }

    async fn delete_transaction(&mut self, id: TransactionId) -> Result<(), LedgerError> {
        let result = transactions::Entity::delete_by_id(id.into_inner())
            .exec(&self.txn)
            .await
            .map_err(map_db_err)?;

        if result.rows_affected == 0 {
            return Err(LedgerError::TransactionNotFound(id));
        }
        Ok(())
    }

    async fn commit(self) -> Result<(), LedgerError> {
        self.txn.commit().await.map_err(map_db_err)
    }

    async fn rollback(self) -> Result<(), LedgerError> {
        self.txn.rollback().await.map_err(map_db_err)
    }
}

impl SeaOrmScope {
    async fn update_transaction(
        &self,
        id: TransactionId,
        column: transactions::Column,
        value: sea_orm::sea_query::SimpleExpr,
    ) -> Result<(), LedgerError> {
        let result = transactions::Entity::update_many()
            .col_expr(column, value)
            .filter(transactions::Column::Id.eq(id.into_inner()))
            .exec(&self.txn)
            .await
            .map_err(map_db_err)?;

        if result.rows_affected == 0 {
            return Err(LedgerError::TransactionNotFound(id));
        }
        Ok(())
    }
}

//! `SeaORM` implementation of the ledger store.

use std::collections::HashMap;

use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, TransactionTrait,
};
use tally_core::ledger::{LedgerError, LedgerStore, Transaction, User};
use tally_shared::types::{TransactionId, UserId};
use uuid::Uuid;

use crate::convert::{article_from_model, transaction_from_model, user_from_model};
use crate::entities::{articles, transactions, users};
use crate::error::map_db_err;
use crate::scope::SeaOrmScope;

/// Ledger store over a `SeaORM` connection pool.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    db: DatabaseConnection,
}

impl LedgerRepository {
    /// Creates a new ledger repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LedgerStore for LedgerRepository {
    type Scope = SeaOrmScope;

    async fn begin(&self) -> Result<Self::Scope, LedgerError> {
        let txn = self.db.begin().await.map_err(map_db_err)?;
        Ok(SeaOrmScope::new(txn))
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, LedgerError> {
        let user = users::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(user.map(user_from_model))
    }

    async fn find_user_transactions(
        &self,
        user_id: UserId,
        offset: u64,
        limit: Option<u64>,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let Some(user) = users::Entity::find_by_id(user_id.into_inner())
            .one(&self.db)
            .await
            .map_err(map_db_err)?
        else {
            return Ok(Vec::new());
        };
        let user = user_from_model(user);

        let rows = transactions::Entity::find()
            .filter(transactions::Column::UserId.eq(user_id.into_inner()))
            .order_by_desc(transactions::Column::Created)
            .order_by_desc(transactions::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(map_db_err)?;

        let article_ids: Vec<Uuid> = rows.iter().filter_map(|row| row.article_id).collect();
        let articles: HashMap<Uuid, articles::Model> = if article_ids.is_empty() {
            HashMap::new()
        } else {
            articles::Entity::find()
                .filter(articles::Column::Id.is_in(article_ids))
                .all(&self.db)
                .await
                .map_err(map_db_err)?
                .into_iter()
                .map(|article| (article.id, article))
                .collect()
        };

        Ok(rows
            .into_iter()
            .map(|row| {
                let article = row
                    .article_id
                    .and_then(|id| articles.get(&id).cloned())
                    .map(article_from_model);
                transaction_from_model(row, user.clone(), article)
            })
            .collect())
    }

    async fn count_user_transactions(&self, user_id: UserId) -> Result<u64, LedgerError> {
        transactions::Entity::find()
            .filter(transactions::Column::UserId.eq(user_id.into_inner()))
            .count(&self.db)
            .await
            .map_err(map_db_err)
    }

    async fn find_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, LedgerError> {
        find_transaction(&self.db, id, false).await
    }
}

/// Adds `FOR UPDATE` on backends with row locks. SQLite serialises writers
/// at the database level instead.
pub(crate) fn for_update<E: EntityTrait>(query: Select<E>, backend: DbBackend) -> Select<E> {
    if backend == DbBackend::Postgres {
        query.lock_exclusive()
    } else {
        query
    }
}

/// Loads a transaction with its owner and article resolved.
pub(crate) async fn find_transaction<C: ConnectionTrait>(
    conn: &C,
    id: TransactionId,
    lock: bool,
) -> Result<Option<Transaction>, LedgerError> {
    let mut query = transactions::Entity::find_by_id(id.into_inner());
    if lock {
        query = for_update(query, conn.get_database_backend());
    }
    let Some(row) = query.one(conn).await.map_err(map_db_err)? else {
        return Ok(None);
    };

    let user = users::Entity::find_by_id(row.user_id)
        .one(conn)
        .await
        .map_err(map_db_err)?
        .ok_or(LedgerError::UserNotFound(UserId::from_uuid(row.user_id)))?;

    let article = match row.article_id {
        Some(article_id) => articles::Entity::find_by_id(article_id)
            .one(conn)
            .await
            .map_err(map_db_err)?
            .map(article_from_model),
        None => None,
    };

    Ok(Some(transaction_from_model(
        row,
        user_from_model(user),
        article,
    )))
}

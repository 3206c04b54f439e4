//! In-memory [`LedgerStore`] for tests and embedding.
//!
//! A scope holds the store-wide mutex for its whole lifetime and works on a
//! private copy of the state, which replaces the shared state on commit.
//! Scopes are therefore fully serialised.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tally_shared::types::{ArticleId, TransactionId, UserId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::error::LedgerError;
use super::store::{LedgerScope, LedgerStore};
use super::types::{Article, NewTransaction, Transaction, User};

/// Stored transaction row. User and article are resolved on read.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TransactionRow {
    id: TransactionId,
    user_id: UserId,
    article_id: Option<ArticleId>,
    quantity: Option<i64>,
    comment: Option<String>,
    amount: i64,
    recipient_transaction: Option<TransactionId>,
    sender_transaction: Option<TransactionId>,
    is_deleted: bool,
    created: chrono::DateTime<chrono::Utc>,
}

/// Complete contents of a [`MemoryLedgerStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryState {
    users: HashMap<UserId, User>,
    articles: HashMap<ArticleId, Article>,
    transactions: HashMap<TransactionId, TransactionRow>,
}

impl MemoryState {
    /// Returns a user by id.
    pub fn user(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    /// Returns an article by id.
    pub fn article(&self, id: ArticleId) -> Option<&Article> {
        self.articles.get(&id)
    }

    /// Returns the number of stored transaction rows.
    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    fn resolve(&self, row: &TransactionRow) -> Result<Transaction, LedgerError> {
        let user = self
            .users
            .get(&row.user_id)
            .cloned()
            .ok_or(LedgerError::UserNotFound(row.user_id))?;
        let article = match row.article_id {
            Some(id) => Some(
                self.articles
                    .get(&id)
                    .cloned()
                    .ok_or(LedgerError::ArticleNotFound(id))?,
            ),
            None => None,
        };

        Ok(Transaction {
            id: row.id,
            user,
            article,
            quantity: row.quantity,
            comment: row.comment.clone(),
            amount: row.amount,
            recipient_transaction: row.recipient_transaction,
            sender_transaction: row.sender_transaction,
            is_deleted: row.is_deleted,
            is_deletable: false,
            created: row.created,
        })
    }

    fn find_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, LedgerError> {
        self.transactions
            .get(&id)
            .map(|row| self.resolve(row))
            .transpose()
    }

    fn row_mut(&mut self, id: TransactionId) -> Result<&mut TransactionRow, LedgerError> {
        self.transactions
            .get_mut(&id)
            .ok_or(LedgerError::TransactionNotFound(id))
    }
}

/// Ledger store backed by a single mutex-guarded [`MemoryState`].
#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryLedgerStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a user.
    pub async fn insert_user(&self, user: User) {
        self.state.lock().await.users.insert(user.id, user);
    }

    /// Seeds an article.
    pub async fn insert_article(&self, article: Article) {
        self.state.lock().await.articles.insert(article.id, article);
    }

    /// Returns a copy of the committed state.
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    type Scope = MemoryScope;

    async fn begin(&self) -> Result<Self::Scope, LedgerError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(MemoryScope { guard, working })
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, LedgerError> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn find_user_transactions(
        &self,
        user_id: UserId,
        offset: u64,
        limit: Option<u64>,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let state = self.state.lock().await;
        let mut rows: Vec<&TransactionRow> = state
            .transactions
            .values()
            .filter(|row| row.user_id == user_id)
            .collect();
        rows.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| b.id.cmp(&a.id)));

        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let limit = limit.map_or(usize::MAX, |limit| {
            usize::try_from(limit).unwrap_or(usize::MAX)
        });
        rows.into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| state.resolve(row))
            .collect()
    }

    async fn count_user_transactions(&self, user_id: UserId) -> Result<u64, LedgerError> {
        let state = self.state.lock().await;
        let count = state
            .transactions
            .values()
            .filter(|row| row.user_id == user_id)
            .count();
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    async fn find_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, LedgerError> {
        self.state.lock().await.find_transaction(id)
    }
}

/// Atomic scope of a [`MemoryLedgerStore`].
#[derive(Debug)]
pub struct MemoryScope {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl LedgerScope for MemoryScope {
    async fn lock_user(&mut self, id: UserId) -> Result<Option<User>, LedgerError> {
        Ok(self.working.users.get(&id).cloned())
    }

    async fn update_user(&mut self, user: &User) -> Result<(), LedgerError> {
        let stored = self
            .working
            .users
            .get_mut(&user.id)
            .ok_or(LedgerError::UserNotFound(user.id))?;
        stored.balance = user.balance;
        stored.updated = user.updated;
        Ok(())
    }

    async fn lock_article(&mut self, id: ArticleId) -> Result<Option<Article>, LedgerError> {
        Ok(self.working.articles.get(&id).cloned())
    }

    async fn update_article(&mut self, article: &Article) -> Result<(), LedgerError> {
        let stored = self
            .working
            .articles
            .get_mut(&article.id)
            .ok_or(LedgerError::ArticleNotFound(article.id))?;
        stored.usage_count = article.usage_count;
        Ok(())
    }

    async fn insert_transaction(
        &mut self,
        transaction: NewTransaction,
    ) -> Result<Transaction, LedgerError> {
        let row = TransactionRow {
            id: TransactionId::new(),
            user_id: transaction.user.id,
            article_id: transaction.article.as_ref().map(|article| article.id),
            quantity: transaction.quantity,
            comment: transaction.comment.clone(),
            amount: transaction.amount,
            recipient_transaction: transaction.recipient_transaction,
            sender_transaction: None,
            is_deleted: false,
            created: transaction.created,
        };
        self.working.transactions.insert(row.id, row.clone());

        Ok(Transaction {
            id: row.id,
            user: transaction.user,
            article: transaction.article,
            quantity: row.quantity,
            comment: row.comment,
            amount: row.amount,
            recipient_transaction: row.recipient_transaction,
            sender_transaction: None,
            is_deleted: false,
            is_deletable: false,
            created: row.created,
        })
    }

    async fn find_transaction(
        &mut self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, LedgerError> {
        self.working.find_transaction(id)
    }

    async fn lock_transaction(
        &mut self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, LedgerError> {
        self.working.find_transaction(id)
    }

    async fn link_sender_transaction(
        &mut self,
        recipient: TransactionId,
        sender: TransactionId,
    ) -> Result<(), LedgerError> {
        self.working.row_mut(recipient)?.sender_transaction = Some(sender);
        Ok(())
    }

    async fn mark_deleted(&mut self, id: TransactionId) -> Result<(), LedgerError> {
        self.working.row_mut(id)?.is_deleted = true;
        Ok(())
    }

    async fn delete_transaction(&mut self, id: TransactionId) -> Result<(), LedgerError> {
        self.working
            .transactions
            .remove(&id)
            .ok_or(LedgerError::TransactionNotFound(id))?;
        for row in self.working.transactions.values_mut() {
            if row.recipient_transaction == Some(id) {
                row.recipient_transaction = None;
            }
            if row.sender_transaction == Some(id) {
                row.sender_transaction = None;
            }
        }
        Ok(())
    }

    async fn commit(mut self) -> Result<(), LedgerError> {
        *self.guard = self.working;
        Ok(())
    }

    async fn rollback(self) -> Result<(), LedgerError> {
        Ok(())
    }
}

//! Storage contract the transaction engine runs against.
//!
//! A [`LedgerStore`] hands out [`LedgerScope`]s. Every read and write issued
//! through a scope becomes visible on [`LedgerScope::commit`] or not at all.
//! Dropping a scope without committing discards its writes.
//!
//! `lock_*` reads must keep the returned rows from being modified by any other
//! scope until this one ends, so that a read-compute-write of a balance inside
//! one scope cannot lose an update.

use async_trait::async_trait;
use tally_shared::types::{ArticleId, TransactionId, UserId};

use super::error::LedgerError;
use super::types::{Article, NewTransaction, Transaction, User};

/// Read access outside of a scope and the factory for atomic scopes.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// The atomic scope type.
    type Scope: LedgerScope;

    /// Opens a new atomic scope.
    async fn begin(&self) -> Result<Self::Scope, LedgerError>;

    /// Finds a user by id.
    async fn find_user(&self, id: UserId) -> Result<Option<User>, LedgerError>;

    /// Lists a user's transactions, newest first.
    ///
    /// `limit` of `None` returns every row after `offset`.
    async fn find_user_transactions(
        &self,
        user_id: UserId,
        offset: u64,
        limit: Option<u64>,
    ) -> Result<Vec<Transaction>, LedgerError>;

    /// Counts a user's transactions, deleted ones included.
    async fn count_user_transactions(&self, user_id: UserId) -> Result<u64, LedgerError>;

    /// Finds a transaction by id with its user and article resolved.
    async fn find_transaction(&self, id: TransactionId)
    -> Result<Option<Transaction>, LedgerError>;
}

/// Scoped handle for one atomic unit of work.
#[async_trait]
pub trait LedgerScope: Send {
    /// Reads and locks a user.
    async fn lock_user(&mut self, id: UserId) -> Result<Option<User>, LedgerError>;

    /// Writes back a user's balance and `updated` timestamp.
    async fn update_user(&mut self, user: &User) -> Result<(), LedgerError>;

    /// Reads and locks an article.
    async fn lock_article(&mut self, id: ArticleId) -> Result<Option<Article>, LedgerError>;

    /// Writes back an article's usage count.
    async fn update_article(&mut self, article: &Article) -> Result<(), LedgerError>;

    /// Stores a new transaction and returns it with its assigned id.
    async fn insert_transaction(
        &mut self,
        transaction: NewTransaction,
    ) -> Result<Transaction, LedgerError>;

    /// Reads a transaction without locking it.
    async fn find_transaction(
        &mut self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, LedgerError>;

    /// Reads and locks a transaction.
    async fn lock_transaction(
        &mut self,
        id: TransactionId,
    ) -> Result<Option<Transaction>, LedgerError>;

    /// Sets the recipient transaction's back-reference to its sender.
    async fn link_sender_transaction(
        &mut self,
        recipient: TransactionId,
        sender: TransactionId,
    ) -> Result<(), LedgerError>;

    /// Flags a transaction as deleted.
    async fn mark_deleted(&mut self, id: TransactionId) -> Result<(), LedgerError>;

    /// Removes a transaction row.
    async fn delete_transaction(&mut self, id: TransactionId) -> Result<(), LedgerError>;

    /// Makes every write of this scope visible.
    async fn commit(self) -> Result<(), LedgerError>;

    /// Discards every write of this scope.
    async fn rollback(self) -> Result<(), LedgerError>;
}

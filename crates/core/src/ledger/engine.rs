//! Transaction engine.
//!
//! Runs deposits, purchases, transfers and reversals as single atomic units
//! against a [`LedgerStore`]. Any error rolls the whole scope back.
//!
//! Lock order inside a scope is transactions, then users in ascending id
//! order, then articles.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tally_shared::settings::{SettingsSource, keys};
use tally_shared::types::{ArticleId, PageRequest, PageResponse, TransactionId, UserId};
use tracing::{debug, error, info, instrument};

use super::deletability::is_deletable;
use super::error::LedgerError;
use super::policy::BalancePolicy;
use super::store::{LedgerScope, LedgerStore};
use super::types::{
    Article, NewTransaction, Transaction, TransactionKind, TransactionRequest, User,
};

/// Amount, article and quantity a request resolves to.
struct Priced {
    amount: i64,
    article: Option<Article>,
    quantity: Option<i64>,
}

/// Orchestrates balance-affecting operations.
pub struct TransactionEngine<S: LedgerStore> {
    store: S,
    settings: Arc<dyn SettingsSource>,
    policy: BalancePolicy,
}

impl<S: LedgerStore> TransactionEngine<S> {
    /// Creates an engine over `store` reading limits and undo settings from `settings`.
    pub fn new(store: S, settings: Arc<dyn SettingsSource>) -> Self {
        let policy = BalancePolicy::new(Arc::clone(&settings));
        Self {
            store,
            settings,
            policy,
        }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Applies a deposit, purchase or transfer.
    ///
    /// For transfers the sender's transaction is returned, carrying the link to
    /// the recipient's.
    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn process_transaction(
        &self,
        request: TransactionRequest,
    ) -> Result<Transaction, LedgerError> {
        request.validate()?;
        let kind = request.kind();
        let now = Utc::now();

        let mut scope = self.store.begin().await?;
        let result = match kind {
            TransactionKind::Deposit | TransactionKind::Purchase { .. } => {
                self.apply_single(&mut scope, &request, now).await
            }
            TransactionKind::Transfer { recipient_id, .. } => {
                self.apply_transfer(&mut scope, &request, recipient_id, now)
                    .await
            }
        };
        let transaction = Self::finish(scope, result).await?;

        info!(
            transaction_id = %transaction.id,
            amount = transaction.amount,
            kind = ?kind,
            "Transaction processed"
        );
        Ok(self.annotate(transaction, Utc::now()))
    }

    /// Lists all of a user's transactions, newest first.
    pub async fn get_transactions_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Transaction>, LedgerError> {
        self.require_user(user_id).await?;
        let transactions = self
            .store
            .find_user_transactions(user_id, 0, None)
            .await?;

        let now = Utc::now();
        Ok(transactions
            .into_iter()
            .map(|transaction| self.annotate(transaction, now))
            .collect())
    }

    /// Lists one page of a user's transactions, newest first.
    pub async fn page_transactions_for_user(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<PageResponse<Transaction>, LedgerError> {
        self.require_user(user_id).await?;
        let total = self.store.count_user_transactions(user_id).await?;
        let transactions = self
            .store
            .find_user_transactions(user_id, page.offset(), Some(page.limit()))
            .await?;

        let now = Utc::now();
        let data = transactions
            .into_iter()
            .map(|transaction| self.annotate(transaction, now))
            .collect();
        Ok(PageResponse::new(data, page.page, page.per_page, total))
    }

    /// Returns a single transaction owned by `user_id`.
    pub async fn get_user_transaction(
        &self,
        user_id: UserId,
        transaction_id: TransactionId,
    ) -> Result<Transaction, LedgerError> {
        self.require_user(user_id).await?;
        let transaction = self
            .store
            .find_transaction(transaction_id)
            .await?
            .filter(|transaction| transaction.user.id == user_id)
            .ok_or(LedgerError::TransactionNotFound(transaction_id))?;
        Ok(self.annotate(transaction, Utc::now()))
    }

    /// Reverts a transaction, and its transfer counterpart if it has one.
    #[instrument(skip(self))]
    pub async fn revert_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Transaction, LedgerError> {
        self.revert(None, transaction_id).await
    }

    /// Reverts a transaction after checking it belongs to `user_id`.
    #[instrument(skip(self))]
    pub async fn revert_user_transaction(
        &self,
        user_id: UserId,
        transaction_id: TransactionId,
    ) -> Result<Transaction, LedgerError> {
        self.revert(Some(user_id), transaction_id).await
    }

    async fn revert(
        &self,
        owner: Option<UserId>,
        transaction_id: TransactionId,
    ) -> Result<Transaction, LedgerError> {
        let now = Utc::now();
        let mut scope = self.store.begin().await?;
        let result = self
            .apply_reversal(&mut scope, owner, transaction_id, now)
            .await;
        let transaction = Self::finish(scope, result).await?;

        info!(
            transaction_id = %transaction.id,
            amount = transaction.amount,
            "Transaction reverted"
        );
        Ok(transaction)
    }

    async fn require_user(&self, user_id: UserId) -> Result<User, LedgerError> {
        self.store
            .find_user(user_id)
            .await?
            .ok_or(LedgerError::UserNotFound(user_id))
    }

    /// Commits on success, rolls back on failure.
    async fn finish<T>(scope: S::Scope, result: Result<T, LedgerError>) -> Result<T, LedgerError> {
        match result {
            Ok(value) => {
                scope.commit().await?;
                Ok(value)
            }
            Err(err) => {
                debug!(error = %err, "Rolling back ledger scope");
                if let Err(rollback_err) = scope.rollback().await {
                    error!(error = %rollback_err, "Failed to roll back ledger scope");
                }
                Err(err)
            }
        }
    }

    fn annotate(&self, mut transaction: Transaction, now: DateTime<Utc>) -> Transaction {
        transaction.is_deletable = self.is_deletable(&transaction, now);
        transaction
    }

    fn is_deletable(&self, transaction: &Transaction, now: DateTime<Utc>) -> bool {
        let enabled = self.settings.get_bool(keys::UNDO_ENABLED).unwrap_or(false);
        let timeout = self.settings.get_string(keys::UNDO_TIMEOUT);
        is_deletable(transaction, enabled, timeout.as_deref(), now)
    }

    /// Deposit, withdrawal or purchase.
    async fn apply_single(
        &self,
        scope: &mut S::Scope,
        request: &TransactionRequest,
        now: DateTime<Utc>,
    ) -> Result<Transaction, LedgerError> {
        let mut user = lock_user(scope, request.user_id).await?;
        let priced = price(scope, request).await?;

        self.policy.check_transaction_boundary(priced.amount)?;
        user.add_balance(priced.amount)?;
        self.policy.check_account_boundary(&user, priced.amount)?;
        user.updated = Some(now);

        let transaction = scope
            .insert_transaction(NewTransaction {
                user: user.clone(),
                article: priced.article,
                quantity: priced.quantity,
                comment: request.comment.clone(),
                amount: priced.amount,
                recipient_transaction: None,
                created: now,
            })
            .await?;
        scope.update_user(&user).await?;

        Ok(transaction)
    }

    /// Transfer from `request.user_id` to `recipient_id`.
    async fn apply_transfer(
        &self,
        scope: &mut S::Scope,
        request: &TransactionRequest,
        recipient_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Transaction, LedgerError> {
        let (mut sender, mut recipient) = if request.user_id < recipient_id {
            let sender = lock_user(scope, request.user_id).await?;
            (sender, lock_user(scope, recipient_id).await?)
        } else {
            let recipient = lock_user(scope, recipient_id).await?;
            (lock_user(scope, request.user_id).await?, recipient)
        };
        let priced = price(scope, request).await?;

        let recipient_amount = priced
            .amount
            .checked_neg()
            .ok_or(LedgerError::AmountOverflow)?;
        recipient.add_balance(recipient_amount)?;
        self.policy
            .check_account_boundary(&recipient, recipient_amount)?;
        recipient.updated = Some(now);

        let recipient_transaction = scope
            .insert_transaction(NewTransaction {
                user: recipient.clone(),
                article: priced.article.clone(),
                quantity: priced.quantity,
                comment: request.comment.clone(),
                amount: recipient_amount,
                recipient_transaction: None,
                created: now,
            })
            .await?;

        self.policy.check_transaction_boundary(priced.amount)?;
        sender.add_balance(priced.amount)?;
        self.policy.check_account_boundary(&sender, priced.amount)?;
        sender.updated = Some(now);

        let sender_transaction = scope
            .insert_transaction(NewTransaction {
                user: sender.clone(),
                article: priced.article,
                quantity: priced.quantity,
                comment: request.comment.clone(),
                amount: priced.amount,
                recipient_transaction: Some(recipient_transaction.id),
                created: now,
            })
            .await?;

        scope
            .link_sender_transaction(recipient_transaction.id, sender_transaction.id)
            .await?;
        scope.update_user(&sender).await?;
        scope.update_user(&recipient).await?;

        debug!(
            sender_transaction = %sender_transaction.id,
            recipient_transaction = %recipient_transaction.id,
            "Transfer pair linked"
        );
        Ok(sender_transaction)
    }

    async fn apply_reversal(
        &self,
        scope: &mut S::Scope,
        owner: Option<UserId>,
        transaction_id: TransactionId,
        now: DateTime<Utc>,
    ) -> Result<Transaction, LedgerError> {
        let requested = scope
            .find_transaction(transaction_id)
            .await?
            .filter(|transaction| owner.is_none_or(|owner| transaction.user.id == owner))
            .ok_or(LedgerError::TransactionNotFound(transaction_id))?;

        let mut ids: Vec<TransactionId> = std::iter::once(requested.id)
            .chain(requested.siblings())
            .collect();
        ids.sort_unstable();
        ids.dedup();

        let mut pair = Vec::with_capacity(ids.len());
        for id in ids {
            let transaction = scope
                .lock_transaction(id)
                .await?
                .ok_or(LedgerError::TransactionNotFound(id))?;
            pair.push(transaction);
        }

        let mut requested = pair
            .iter()
            .find(|transaction| transaction.id == transaction_id)
            .cloned()
            .ok_or(LedgerError::TransactionNotFound(transaction_id))?;
        if !self.is_deletable(&requested, now) {
            return Err(LedgerError::NotDeletable(transaction_id));
        }
        if let Some(sibling) = pair.iter().find(|transaction| transaction.is_deleted) {
            return Err(LedgerError::NotDeletable(sibling.id));
        }

        let mut owners: Vec<UserId> = pair.iter().map(|transaction| transaction.user.id).collect();
        owners.sort_unstable();
        owners.dedup();
        let mut users = Vec::with_capacity(owners.len());
        for id in owners {
            users.push(lock_user(scope, id).await?);
        }

        if let Some(article) = &requested.article {
            unuse_article(scope, article.id).await?;
        }

        let hard_delete = self.settings.get_bool(keys::UNDO_DELETE).unwrap_or(false);
        for transaction in &pair {
            let user = users
                .iter_mut()
                .find(|user| user.id == transaction.user.id)
                .ok_or(LedgerError::UserNotFound(transaction.user.id))?;

            let amount = transaction
                .amount
                .checked_neg()
                .ok_or(LedgerError::AmountOverflow)?;
            // The recipient side of a transfer was never bounded as a payment.
            if transaction.sender_transaction.is_none() {
                self.policy.check_transaction_boundary(transaction.amount)?;
            }
            user.add_balance(amount)?;
            self.policy.check_account_boundary(user, amount)?;
            user.updated = Some(now);

            if hard_delete {
                scope.delete_transaction(transaction.id).await?;
            } else {
                scope.mark_deleted(transaction.id).await?;
            }
        }

        for user in &users {
            scope.update_user(user).await?;
        }

        if let Some(owner) = users.into_iter().find(|user| user.id == requested.user.id) {
            requested.user = owner;
        }
        requested.is_deleted = true;
        requested.is_deletable = false;
        Ok(requested)
    }
}

impl<S: LedgerStore + std::fmt::Debug> std::fmt::Debug for TransactionEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionEngine")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

async fn lock_user<C: LedgerScope>(scope: &mut C, id: UserId) -> Result<User, LedgerError> {
    scope
        .lock_user(id)
        .await?
        .ok_or(LedgerError::UserNotFound(id))
}

/// Resolves the amount to apply. Purchases and article transfers take the
/// article price times quantity as a debit and count one usage.
async fn price<C: LedgerScope>(
    scope: &mut C,
    request: &TransactionRequest,
) -> Result<Priced, LedgerError> {
    let Some(article_id) = request.article_id else {
        return Ok(Priced {
            amount: request.amount,
            article: None,
            quantity: None,
        });
    };

    let mut article = scope
        .lock_article(article_id)
        .await?
        .ok_or(LedgerError::ArticleNotFound(article_id))?;
    if !article.is_active {
        return Err(LedgerError::ArticleInactive(article_id));
    }

    let quantity = request.quantity.unwrap_or(1);
    let amount = article
        .amount
        .checked_mul(quantity)
        .and_then(i64::checked_neg)
        .ok_or(LedgerError::AmountOverflow)?;

    article.increment_usage_count();
    scope.update_article(&article).await?;

    Ok(Priced {
        amount,
        article: Some(article),
        quantity: Some(quantity),
    })
}

async fn unuse_article<C: LedgerScope>(
    scope: &mut C,
    article_id: ArticleId,
) -> Result<(), LedgerError> {
    let mut article = scope
        .lock_article(article_id)
        .await?
        .ok_or(LedgerError::ArticleNotFound(article_id))?;
    article.decrement_usage_count();
    scope.update_article(&article).await
}

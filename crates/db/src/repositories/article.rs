//! Article repository for the purchasable catalog.
//!
//! Articles are never edited in place. An update stores a new version that
//! points at its precursor and deactivates the old one, so past purchases keep
//! referencing the price they were made at.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tally_core::ledger::Article;
use tally_shared::types::ArticleId;

use crate::convert::article_from_model;
use crate::entities::articles;

/// Error types for article operations.
#[derive(Debug, thiserror::Error)]
pub enum ArticleError {
    /// Another active article already uses this barcode.
    #[error("Barcode '{0}' is already in use")]
    DuplicateBarcode(String),

    /// Article not found.
    #[error("Article '{0}' not found")]
    NotFound(ArticleId),

    /// Article is inactive and cannot be changed.
    #[error("Article '{0}' is inactive")]
    Inactive(ArticleId),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Input for creating or updating an article.
#[derive(Debug, Clone)]
pub struct ArticleInput {
    /// Display name.
    pub name: String,
    /// Optional barcode.
    pub barcode: Option<String>,
    /// Unit price.
    pub amount: i64,
}

/// Article repository for catalog operations.
#[derive(Debug, Clone)]
pub struct ArticleRepository {
    db: DatabaseConnection,
}

impl ArticleRepository {
    /// Creates a new article repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Lists articles ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self, include_inactive: bool) -> Result<Vec<Article>, ArticleError> {
        let mut query = articles::Entity::find();
        if !include_inactive {
            query = query.filter(articles::Column::IsActive.eq(true));
        }

        let articles = query
            .order_by_asc(articles::Column::Name)
            .all(&self.db)
            .await?;
        Ok(articles.into_iter().map(article_from_model).collect())
    }

    /// Finds an article by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: ArticleId) -> Result<Option<Article>, ArticleError> {
        let article = articles::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await?;
        Ok(article.map(article_from_model))
    }

    /// Creates a new active article.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateBarcode` if an active article has the barcode, or a
    /// database error.
    pub async fn create(&self, input: ArticleInput) -> Result<Article, ArticleError> {
        let txn = self.db.begin().await?;
        ensure_barcode_free(&txn, input.barcode.as_deref(), None).await?;
        let article = insert_version(&txn, input, None, 0).await?;
        txn.commit().await?;
        Ok(article)
    }

    /// Replaces an active article with a new version.
    ///
    /// The new version keeps the usage count and records `id` as its precursor.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `Inactive` or `DuplicateBarcode`, or a database error.
    pub async fn update(&self, id: ArticleId, input: ArticleInput) -> Result<Article, ArticleError> {
        let txn = self.db.begin().await?;
        let current = articles::Entity::find_by_id(id.into_inner())
            .one(&txn)
            .await?
            .ok_or(ArticleError::NotFound(id))?;
        if !current.is_active {
            return Err(ArticleError::Inactive(id));
        }
        ensure_barcode_free(&txn, input.barcode.as_deref(), Some(current.id)).await?;

        let usage_count = current.usage_count;
        let mut old: articles::ActiveModel = current.into();
        old.is_active = Set(false);
        old.update(&txn).await?;

        let article = insert_version(&txn, input, Some(id), usage_count).await?;
        txn.commit().await?;
        Ok(article)
    }

    /// Deactivates an article so it can no longer be purchased.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the article does not exist, or a database error.
    pub async fn deactivate(&self, id: ArticleId) -> Result<Article, ArticleError> {
        let model = articles::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await?
            .ok_or(ArticleError::NotFound(id))?;

        let mut active: articles::ActiveModel = model.into();
        active.is_active = Set(false);
        let model = active.update(&self.db).await?;
        Ok(article_from_model(model))
    }
}

async fn ensure_barcode_free(
    txn: &DatabaseTransaction,
    barcode: Option<&str>,
    except: Option<uuid::Uuid>,
) -> Result<(), ArticleError> {
    let Some(barcode) = barcode else {
        return Ok(());
    };

    let mut query = articles::Entity::find()
        .filter(articles::Column::Barcode.eq(barcode))
        .filter(articles::Column::IsActive.eq(true));
    if let Some(except) = except {
        query = query.filter(articles::Column::Id.ne(except));
    }

    if query.count(txn).await? > 0 {
        return Err(ArticleError::DuplicateBarcode(barcode.to_string()));
    }
    Ok(())
}

async fn insert_version(
    txn: &DatabaseTransaction,
    input: ArticleInput,
    precursor: Option<ArticleId>,
    usage_count: i64,
) -> Result<Article, ArticleError> {
    let article = articles::ActiveModel {
        id: Set(ArticleId::new().into_inner()),
        precursor_id: Set(precursor.map(ArticleId::into_inner)),
        name: Set(input.name.trim().to_string()),
        barcode: Set(input.barcode),
        amount: Set(input.amount),
        is_active: Set(true),
        usage_count: Set(usage_count),
        created: Set(Utc::now().fixed_offset()),
    };

    let model = article.insert(txn).await?;
    Ok(article_from_model(model))
}

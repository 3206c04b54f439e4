//! User repository for registration and listing.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use tally_core::ledger::User;
use tally_shared::types::UserId;

use crate::convert::user_from_model;
use crate::entities::users;

/// Error types for user operations.
#[derive(Debug, thiserror::Error)]
pub enum UserError {
    /// A user with this name already exists.
    #[error("User '{0}' already exists")]
    DuplicateName(String),

    /// User not found.
    #[error("User '{0}' not found")]
    NotFound(UserId),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Input for registering a user.
#[derive(Debug, Clone)]
pub struct CreateUserInput {
    /// Unique display name.
    pub name: String,
    /// Optional contact email.
    pub email: Option<String>,
}

/// Partial update of a user.
#[derive(Debug, Clone, Default)]
pub struct UpdateUserInput {
    /// New display name.
    pub name: Option<String>,
    /// New contact email.
    pub email: Option<String>,
    /// Disable or re-enable the account.
    pub disabled: Option<bool>,
}

/// User repository for CRUD operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    db: DatabaseConnection,
}

impl UserRepository {
    /// Creates a new user repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Lists all users ordered by name, optionally including disabled ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self, include_disabled: bool) -> Result<Vec<User>, UserError> {
        let mut query = users::Entity::find();
        if !include_disabled {
            query = query.filter(users::Column::Disabled.eq(false));
        }

        let users = query
            .order_by_asc(users::Column::Name)
            .all(&self.db)
            .await?;
        Ok(users.into_iter().map(user_from_model).collect())
    }

    /// Finds a user by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: UserId) -> Result<Option<User>, UserError> {
        let user = users::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await?;
        Ok(user.map(user_from_model))
    }

    /// Checks if a name is already registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn name_exists(&self, name: &str) -> Result<bool, UserError> {
        let count = users::Entity::find()
            .filter(users::Column::Name.eq(name))
            .count(&self.db)
            .await?;

        Ok(count > 0)
    }

    /// Registers a new user with a zero balance.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateName` if the name is taken, or a database error.
    pub async fn create(&self, input: CreateUserInput) -> Result<User, UserError> {
        let name = input.name.trim().to_string();
        if self.name_exists(&name).await? {
            return Err(UserError::DuplicateName(name));
        }

        let user = users::ActiveModel {
            id: Set(UserId::new().into_inner()),
            name: Set(name),
            email: Set(input.email),
            balance: Set(0),
            disabled: Set(false),
            created: Set(Utc::now().fixed_offset()),
            updated: Set(None),
        };

        let model = user.insert(&self.db).await?;
        Ok(user_from_model(model))
    }

    /// Applies a partial update. Absent fields keep their value, a blank
    /// email clears it.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `DuplicateName` if another user has the new name,
    /// or a database error.
    pub async fn update(&self, id: UserId, input: UpdateUserInput) -> Result<User, UserError> {
        let model = users::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await?
            .ok_or(UserError::NotFound(id))?;

        let mut active: users::ActiveModel = model.clone().into();
        if let Some(name) = input.name.map(|name| name.trim().to_string())
            && name != model.name
        {
            let taken = users::Entity::find()
                .filter(users::Column::Name.eq(name.as_str()))
                .filter(users::Column::Id.ne(model.id))
                .count(&self.db)
                .await?
                > 0;
            if taken {
                return Err(UserError::DuplicateName(name));
            }
            active.name = Set(name);
        }
        if let Some(email) = input.email {
            let email = email.trim();
            active.email = Set((!email.is_empty()).then(|| email.to_string()));
        }
        if let Some(disabled) = input.disabled {
            active.disabled = Set(disabled);
        }

        if !active.is_changed() {
            return Ok(user_from_model(model));
        }

        let model = active.update(&self.db).await?;
        Ok(user_from_model(model))
    }
}

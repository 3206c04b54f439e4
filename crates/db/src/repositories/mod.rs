//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the application.

pub mod article;
pub mod ledger;
pub mod user;

pub use article::{ArticleError, ArticleInput, ArticleRepository};
pub use ledger::LedgerRepository;
pub use user::{CreateUserInput, UpdateUserInput, UserError, UserRepository};

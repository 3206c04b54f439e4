//! `SeaORM` entity definitions.

pub mod articles;
pub mod transactions;
pub mod users;

//! Tally list ledger.
//!
//! This module implements the transaction processing core:
//! - Domain types for users, articles, transactions and requests
//! - Balance policy for payment and account boundaries
//! - Deletability evaluation for reversals
//! - The storage contract and an in-memory implementation of it
//! - The transaction engine

pub mod deletability;
pub mod engine;
pub mod error;
pub mod memory;
pub mod policy;
pub mod store;
pub mod types;

#[cfg(test)]
mod engine_props;

pub use deletability::is_deletable;
pub use engine::TransactionEngine;
pub use error::{LedgerError, Limit};
pub use memory::{MemoryLedgerStore, MemoryScope, MemoryState};
pub use policy::BalancePolicy;
pub use store::{LedgerScope, LedgerStore};
pub use types::{
    Article, MAX_COMMENT_LENGTH, NewTransaction, Transaction, TransactionKind,
    TransactionRequest, User,
};

//! Transaction engine for Tally.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! Storage is reached only through the [`ledger::LedgerStore`] contract.
//!
//! # Modules
//!
//! - `ledger` - Balance policy, deletability, storage contract and the transaction engine

pub mod ledger;

//! Mapping of `SeaORM` errors into ledger errors.

use sea_orm::DbErr;
use tally_core::ledger::LedgerError;
use tracing::warn;

/// Message fragments of lock-contention and serialisation failures across
/// PostgreSQL and SQLite.
const CONTENTION_MARKERS: [&str; 4] = [
    "could not serialize",
    "deadlock detected",
    "database is locked",
    "lock timeout",
];

/// Converts a database error into a [`LedgerError`].
///
/// Contention surfaces as the retryable `ConcurrentModification`; everything
/// else is an opaque `Persistence` failure.
pub fn map_db_err(err: DbErr) -> LedgerError {
    let message = err.to_string();
    let lowered = message.to_lowercase();
    if CONTENTION_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
    {
        warn!(error = %message, "Ledger scope hit lock contention");
        return LedgerError::ConcurrentModification;
    }
    LedgerError::Persistence(message)
}

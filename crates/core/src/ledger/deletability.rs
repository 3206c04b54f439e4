//! Whether a transaction may still be reverted.

use chrono::{DateTime, Duration, Utc};
use tally_shared::settings::parse_duration;

use super::types::Transaction;

/// Returns true if `transaction` may be reverted at `now`.
///
/// All four must hold: the transaction is not deleted, undo is enabled, a timeout
/// is configured and parses, and `now` is strictly before `created + timeout`.
#[must_use]
pub fn is_deletable(
    transaction: &Transaction,
    undo_enabled: bool,
    undo_timeout: Option<&str>,
    now: DateTime<Utc>,
) -> bool {
    if transaction.is_deleted || !undo_enabled {
        return false;
    }

    let Some(timeout) = undo_timeout
        .and_then(parse_duration)
        .and_then(|timeout| Duration::from_std(timeout).ok())
    else {
        return false;
    };

    transaction
        .created
        .checked_add_signed(timeout)
        .is_some_and(|deadline| now < deadline)
}

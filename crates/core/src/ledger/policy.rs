//! Balance policy: amount and balance checks against configured boundaries.
//!
//! Limits are inclusive and optional. A limit that is not configured is not
//! enforced.

use std::sync::Arc;

use tally_shared::settings::{SettingsSource, keys};

use super::error::{LedgerError, Limit};
use super::types::User;

/// Checks amounts and balances against `payment.boundary.*` and
/// `account.boundary.*`.
#[derive(Clone)]
pub struct BalancePolicy {
    settings: Arc<dyn SettingsSource>,
}

impl BalancePolicy {
    /// Creates a policy reading limits from `settings` on every check.
    pub fn new(settings: Arc<dyn SettingsSource>) -> Self {
        Self { settings }
    }

    /// Validates a single transaction amount.
    pub fn check_transaction_boundary(&self, amount: i64) -> Result<(), LedgerError> {
        if let Some((boundary, limit)) = self.violation(
            amount,
            keys::PAYMENT_BOUNDARY_UPPER,
            keys::PAYMENT_BOUNDARY_LOWER,
        ) {
            return Err(LedgerError::TransactionBoundaryExceeded {
                amount,
                boundary,
                limit,
            });
        }
        Ok(())
    }

    /// Validates a user's balance after `amount` has been applied to it.
    pub fn check_account_boundary(&self, user: &User, amount: i64) -> Result<(), LedgerError> {
        if let Some((boundary, limit)) = self.violation(
            user.balance,
            keys::ACCOUNT_BOUNDARY_UPPER,
            keys::ACCOUNT_BOUNDARY_LOWER,
        ) {
            return Err(LedgerError::AccountBalanceBoundaryExceeded {
                amount,
                balance: user.balance,
                boundary,
                limit,
            });
        }
        Ok(())
    }

    fn violation(&self, value: i64, upper_key: &str, lower_key: &str) -> Option<(i64, Limit)> {
        if let Some(upper) = self.settings.get_int(upper_key)
            && value > upper
        {
            return Some((upper, Limit::Upper));
        }
        if let Some(lower) = self.settings.get_int(lower_key)
            && value < lower
        {
            return Some((lower, Limit::Lower));
        }
        None
    }
}

impl std::fmt::Debug for BalancePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BalancePolicy").finish_non_exhaustive()
    }
}

//! Ledger settings and the key lookup the transaction engine reads them through.
//!
//! The engine never reaches for global state. It is handed an `Arc<dyn SettingsSource>`
//! at construction and asks for values by dotted key, e.g. `payment.boundary.upper`.
//! Both the typed [`LedgerSettings`] (loaded as part of [`crate::AppConfig`]) and a raw
//! [`config::Config`] implement the lookup.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Dotted keys understood by [`SettingsSource`] implementations.
pub mod keys {
    /// Upper limit for a single transaction amount.
    pub const PAYMENT_BOUNDARY_UPPER: &str = "payment.boundary.upper";
    /// Lower limit for a single transaction amount.
    pub const PAYMENT_BOUNDARY_LOWER: &str = "payment.boundary.lower";
    /// Upper limit for a user's balance.
    pub const ACCOUNT_BOUNDARY_UPPER: &str = "account.boundary.upper";
    /// Lower limit for a user's balance.
    pub const ACCOUNT_BOUNDARY_LOWER: &str = "account.boundary.lower";
    /// Whether transactions may be reverted at all.
    pub const UNDO_ENABLED: &str = "undo.enabled";
    /// Hard-delete reverted transactions instead of flagging them.
    pub const UNDO_DELETE: &str = "undo.delete";
    /// How long after creation a transaction stays revertible.
    pub const UNDO_TIMEOUT: &str = "undo.timeout";
    /// Inactivity period after which a user counts as stale.
    pub const USER_STALE_PERIOD: &str = "user.stale_period";
}

/// Read-only settings lookup by dotted key.
pub trait SettingsSource: Send + Sync {
    /// Returns an integer setting, or `None` if absent or not an integer.
    fn get_int(&self, key: &str) -> Option<i64>;

    /// Returns a string setting, or `None` if absent.
    fn get_string(&self, key: &str) -> Option<String>;

    /// Returns a boolean setting, or `None` if absent or not a boolean.
    fn get_bool(&self, key: &str) -> Option<bool>;
}

/// Parses a human readable duration such as `"5m"`, `"5 minutes"` or `"10 days"`.
#[must_use]
pub fn parse_duration(value: &str) -> Option<Duration> {
    humantime::parse_duration(value.trim()).ok()
}

/// Inclusive numeric limits. An absent limit is not enforced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Boundary {
    /// Largest allowed value.
    #[serde(default)]
    pub upper: Option<i64>,
    /// Smallest allowed value.
    #[serde(default)]
    pub lower: Option<i64>,
}

/// Limits applied to a single transaction amount.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSettings {
    /// Transaction amount boundary.
    #[serde(default)]
    pub boundary: Boundary,
}

/// Limits applied to a user's resulting balance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSettings {
    /// Account balance boundary.
    #[serde(default)]
    pub boundary: Boundary,
}

/// Reversal settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoSettings {
    /// Whether transactions may be reverted.
    #[serde(default = "default_undo_enabled")]
    pub enabled: bool,
    /// Remove reverted rows instead of flagging them deleted.
    #[serde(default)]
    pub delete: bool,
    /// Reversal window, e.g. `"5 minutes"`.
    #[serde(default = "default_undo_timeout")]
    pub timeout: Option<String>,
}

fn default_undo_enabled() -> bool {
    true
}

#[allow(clippy::unnecessary_wraps)]
fn default_undo_timeout() -> Option<String> {
    Some("5 minutes".to_string())
}

impl Default for UndoSettings {
    fn default() -> Self {
        Self {
            enabled: default_undo_enabled(),
            delete: false,
            timeout: default_undo_timeout(),
        }
    }
}

/// User listing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    /// Inactivity period after which a user is reported as inactive.
    #[serde(default = "default_stale_period", alias = "stalePeriod")]
    pub stale_period: String,
}

fn default_stale_period() -> String {
    "10 days".to_string()
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            stale_period: default_stale_period(),
        }
    }
}

/// Typed ledger settings, the `settings` section of the application config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSettings {
    /// Transaction amount limits.
    #[serde(default)]
    pub payment: PaymentSettings,
    /// Account balance limits.
    #[serde(default)]
    pub account: AccountSettings,
    /// Reversal settings.
    #[serde(default)]
    pub undo: UndoSettings,
    /// User listing settings.
    #[serde(default)]
    pub user: UserSettings,
}

impl LedgerSettings {
    /// Returns the stale period, falling back to ten days if it does not parse.
    #[must_use]
    pub fn stale_period(&self) -> Duration {
        parse_duration(&self.user.stale_period).unwrap_or(Duration::from_secs(10 * 24 * 60 * 60))
    }
}

impl SettingsSource for LedgerSettings {
    fn get_int(&self, key: &str) -> Option<i64> {
        match key {
            keys::PAYMENT_BOUNDARY_UPPER => self.payment.boundary.upper,
            keys::PAYMENT_BOUNDARY_LOWER => self.payment.boundary.lower,
            keys::ACCOUNT_BOUNDARY_UPPER => self.account.boundary.upper,
            keys::ACCOUNT_BOUNDARY_LOWER => self.account.boundary.lower,
            _ => None,
        }
    }

    fn get_string(&self, key: &str) -> Option<String> {
        match key {
            keys::UNDO_TIMEOUT => self.undo.timeout.clone(),
            keys::USER_STALE_PERIOD => Some(self.user.stale_period.clone()),
            _ => None,
        }
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        match key {
            keys::UNDO_ENABLED => Some(self.undo.enabled),
            keys::UNDO_DELETE => Some(self.undo.delete),
            _ => None,
        }
    }
}

impl SettingsSource for config::Config {
    fn get_int(&self, key: &str) -> Option<i64> {
        self.get::<i64>(key).ok()
    }

    fn get_string(&self, key: &str) -> Option<String> {
        self.get::<String>(key).ok()
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        self.get::<bool>(key).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn bounded() -> LedgerSettings {
        LedgerSettings {
            payment: PaymentSettings {
                boundary: Boundary {
                    upper: Some(15_000),
                    lower: Some(-2_000),
                },
            },
            account: AccountSettings {
                boundary: Boundary {
                    upper: Some(200_000),
                    lower: None,
                },
            },
            ..LedgerSettings::default()
        }
    }

    #[rstest]
    #[case(keys::PAYMENT_BOUNDARY_UPPER, Some(15_000))]
    #[case(keys::PAYMENT_BOUNDARY_LOWER, Some(-2_000))]
    #[case(keys::ACCOUNT_BOUNDARY_UPPER, Some(200_000))]
    #[case(keys::ACCOUNT_BOUNDARY_LOWER, None)]
    #[case("payment.boundary", None)]
    fn test_typed_settings_int_lookup(#[case] key: &str, #[case] expected: Option<i64>) {
        assert_eq!(bounded().get_int(key), expected);
    }

    #[test]
    fn test_stale_period_accepts_camel_case_key() {
        let settings: LedgerSettings =
            serde_json::from_str(r#"{"user": {"stalePeriod": "2 days"}}"#).unwrap();
        assert_eq!(settings.user.stale_period, "2 days");
        assert_eq!(settings.stale_period(), Duration::from_secs(2 * 24 * 60 * 60));

        let settings: LedgerSettings =
            serde_json::from_str(r#"{"user": {"stale_period": "1h"}}"#).unwrap();
        assert_eq!(
            settings.get_string(keys::USER_STALE_PERIOD).as_deref(),
            Some("1h")
        );
    }

    #[test]
    fn test_typed_settings_defaults() {
        let settings = LedgerSettings::default();
        assert_eq!(settings.get_bool(keys::UNDO_ENABLED), Some(true));
        assert_eq!(settings.get_bool(keys::UNDO_DELETE), Some(false));
        assert_eq!(
            settings.get_string(keys::UNDO_TIMEOUT).as_deref(),
            Some("5 minutes")
        );
        assert_eq!(settings.get_int(keys::PAYMENT_BOUNDARY_UPPER), None);
    }

    #[test]
    fn test_config_source_lookup() {
        let config = config::Config::builder()
            .set_override(keys::ACCOUNT_BOUNDARY_LOWER, -500_i64)
            .unwrap()
            .set_override(keys::UNDO_ENABLED, false)
            .unwrap()
            .set_override(keys::UNDO_TIMEOUT, "2m")
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(
            SettingsSource::get_int(&config, keys::ACCOUNT_BOUNDARY_LOWER),
            Some(-500)
        );
        assert_eq!(SettingsSource::get_int(&config, keys::ACCOUNT_BOUNDARY_UPPER), None);
        assert_eq!(SettingsSource::get_bool(&config, keys::UNDO_ENABLED), Some(false));
        assert_eq!(
            SettingsSource::get_string(&config, keys::UNDO_TIMEOUT).as_deref(),
            Some("2m")
        );
    }

    #[rstest]
    #[case("5m", Some(300))]
    #[case("5 minutes", Some(300))]
    #[case("300s", Some(300))]
    #[case("1h 30m", Some(5_400))]
    #[case("soon", None)]
    #[case("", None)]
    fn test_parse_duration(#[case] input: &str, #[case] seconds: Option<u64>) {
        assert_eq!(parse_duration(input).map(|d| d.as_secs()), seconds);
    }

    #[test]
    fn test_stale_period_fallback() {
        let mut settings = LedgerSettings::default();
        assert_eq!(settings.stale_period().as_secs(), 10 * 24 * 60 * 60);

        settings.user.stale_period = "garbage".to_string();
        assert_eq!(settings.stale_period().as_secs(), 10 * 24 * 60 * 60);

        settings.user.stale_period = "1 day".to_string();
        assert_eq!(settings.stale_period().as_secs(), 24 * 60 * 60);
    }
}

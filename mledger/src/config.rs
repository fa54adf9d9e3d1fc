use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_TABLE_NAME: &str = "_migrations";
pub const DEFAULT_LOCK_TABLE_NAME: &str = "_migrations-lock";
pub const DEFAULT_LOCK_KEY: &str = "migrations";
pub const DEFAULT_LOCK_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Names and timings shared by every runner targeting the same migration set.
///
/// Built once from a list of [`LedgerOption`]s and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Table recording one item per migration id.
    pub table_name: String,
    /// Table holding the single lock item.
    pub lock_table_name: String,
    /// Key of the lock item.
    pub lock_key: String,
    /// Pause between two acquisition attempts while the lock is held elsewhere.
    #[serde(with = "duration_millis", rename = "lock_retry_interval_ms")]
    pub lock_retry_interval: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            lock_table_name: DEFAULT_LOCK_TABLE_NAME.to_string(),
            lock_key: DEFAULT_LOCK_KEY.to_string(),
            lock_retry_interval: DEFAULT_LOCK_RETRY_INTERVAL,
        }
    }
}

impl LedgerConfig {
    /// Starts from the defaults and applies `options` in order; a later option
    /// overrides an earlier one for the same field.
    pub fn from_options<I>(options: I) -> Self
    where
        I: IntoIterator<Item = LedgerOption>,
    {
        let mut config = Self::default();
        config.apply(options);
        config
    }

    /// Applies further options on top of an existing configuration.
    pub fn with_options<I>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = LedgerOption>,
    {
        self.apply(options);
        self
    }

    fn apply<I>(&mut self, options: I)
    where
        I: IntoIterator<Item = LedgerOption>,
    {
        for option in options {
            option.apply(self);
        }
    }
}

/// A single override applied while resolving a [`LedgerConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerOption {
    TableName(String),
    LockTableName(String),
    LockKey(String),
    LockRetryInterval(Duration),
}

impl LedgerOption {
    pub fn table_name(name: impl Into<String>) -> Self {
        Self::TableName(name.into())
    }

    pub fn lock_table_name(name: impl Into<String>) -> Self {
        Self::LockTableName(name.into())
    }

    pub fn lock_key(key: impl Into<String>) -> Self {
        Self::LockKey(key.into())
    }

    pub fn lock_retry_interval(interval: Duration) -> Self {
        Self::LockRetryInterval(interval)
    }

    fn apply(self, config: &mut LedgerConfig) {
        match self {
            Self::TableName(name) => config.table_name = name,
            Self::LockTableName(name) => config.lock_table_name = name,
            Self::LockKey(key) => config.lock_key = key,
            Self::LockRetryInterval(interval) => config.lock_retry_interval = interval,
        }
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_names() {
        let config = LedgerConfig::from_options([]);
        assert_eq!(config.table_name, "_migrations");
        assert_eq!(config.lock_table_name, "_migrations-lock");
        assert_eq!(config.lock_key, "migrations");
        assert_eq!(config.lock_retry_interval, Duration::from_secs(1));
    }

    #[test]
    fn later_options_win() {
        let config = LedgerConfig::from_options([
            LedgerOption::table_name("first"),
            LedgerOption::lock_key("deploy"),
            LedgerOption::table_name("second"),
        ]);
        assert_eq!(config.table_name, "second");
        assert_eq!(config.lock_key, "deploy");
        assert_eq!(config.lock_table_name, DEFAULT_LOCK_TABLE_NAME);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: LedgerConfig = toml::from_str(
            r#"
            lock_key = "billing"
            lock_retry_interval_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.table_name, DEFAULT_TABLE_NAME);
        assert_eq!(config.lock_key, "billing");
        assert_eq!(config.lock_retry_interval, Duration::from_millis(250));
    }
}

use anyhow::{Context, Result};
use mledger::{Ledger, LedgerConfig, LedgerOption, RedisStore};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = ".mledger.toml";

/// Configuration stored in .mledger.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MledgerConfig {
    #[serde(default)]
    pub redis: RedisSettings,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisSettings {
    #[serde(default = "default_redis_url")]
    pub url: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            namespace: default_namespace(),
        }
    }
}

fn default_redis_url() -> String {
    "${REDIS_URL}".to_string()
}

fn default_namespace() -> String {
    "mledger".to_string()
}

/// Overrides given on the command line; they win over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub redis_url: Option<String>,
    pub namespace: Option<String>,
    pub table: Option<String>,
    pub lock_table: Option<String>,
    pub lock_key: Option<String>,
}

impl Overrides {
    fn options(&self) -> Vec<LedgerOption> {
        let mut options = Vec::new();
        if let Some(table) = &self.table {
            options.push(LedgerOption::table_name(table));
        }
        if let Some(lock_table) = &self.lock_table {
            options.push(LedgerOption::lock_table_name(lock_table));
        }
        if let Some(lock_key) = &self.lock_key {
            options.push(LedgerOption::lock_key(lock_key));
        }
        options
    }
}

/// Resolved settings for one CLI invocation
pub struct RunContext {
    /// Config file that was loaded, if one was found
    pub config_path: Option<PathBuf>,
    pub config: MledgerConfig,
    pub overrides: Overrides,
}

impl RunContext {
    /// Load context from the current directory or its ancestors
    pub fn find(overrides: Overrides) -> Result<Self> {
        let current_dir = std::env::current_dir().context("Failed to get current directory")?;
        Self::find_from(&current_dir, overrides)
    }

    /// Load context starting from the given directory
    pub fn find_from(start: &Path, overrides: Overrides) -> Result<Self> {
        let config_path = Self::find_config_file(start);
        let config = match &config_path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?
            }
            None => MledgerConfig::default(),
        };

        Ok(Self {
            config_path,
            config,
            overrides,
        })
    }

    fn find_config_file(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();

        loop {
            let candidate = current.join(CONFIG_FILE_NAME);
            if candidate.is_file() {
                return Some(candidate);
            }

            if !current.pop() {
                return None;
            }
        }
    }

    /// Ledger configuration after applying command-line overrides
    pub fn ledger_config(&self) -> LedgerConfig {
        self.config.ledger.clone().with_options(self.overrides.options())
    }

    pub fn namespace(&self) -> &str {
        self.overrides
            .namespace
            .as_deref()
            .unwrap_or(&self.config.redis.namespace)
    }

    /// Get the Redis URL, expanding environment variables
    pub fn redis_url(&self) -> Result<String> {
        let url = self
            .overrides
            .redis_url
            .as_deref()
            .unwrap_or(&self.config.redis.url);

        if url.starts_with("${") && url.ends_with('}') {
            let var_name = &url[2..url.len() - 1];
            std::env::var(var_name).with_context(|| format!("Environment variable {var_name} not set"))
        } else {
            Ok(url.to_string())
        }
    }

    /// Connect to Redis and build the ledger
    pub async fn connect(&self) -> Result<Ledger<RedisStore>> {
        let url = self.redis_url()?;
        let store = RedisStore::connect(&url, self.namespace())
            .await
            .with_context(|| format!("Failed to connect to Redis at {url}"))?;
        Ok(Ledger::with_config(store, self.ledger_config()))
    }
}

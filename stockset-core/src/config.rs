//! Run configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) gives the stock
//! NASDAQ/NYSE/AMEX catalog, the Alpha Vantage endpoint, and `./data` as the
//! cache root.

use crate::data::catalog::DEFAULT_EXCHANGE_URL_TEMPLATE;
use crate::data::fetcher::MAX_BACKOFF_EXPONENT;
use crate::data::series::{DEFAULT_API_KEY_ENV, DEFAULT_PROVIDER_URL_TEMPLATE};
use crate::data::{
    DataError, Fetcher, HttpClient, ProviderEndpoint, ReqwestClient, RetryPolicy, SymbolCatalog,
    ThrottlePolicy, TimeSeriesStore,
};
use crate::domain::{Exchange, EXAMPLE_SIZE};
use crate::sampler::ExampleSampler;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("parse config TOML: {0}")]
    Parse(String),

    #[error("serialize config: {0}")]
    Serialize(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StocksetConfig {
    /// Root of the local cache.
    pub data_dir: PathBuf,
    /// Exchange priority list for the catalog merge.
    pub exchanges: Vec<Exchange>,
    /// Listing download URL with an `{exchange}` placeholder.
    pub exchange_url_template: String,
    pub http_timeout_secs: u64,
    pub example_size: usize,
    pub seed: Option<u64>,
    pub provider: ProviderConfig,
    pub retry: RetryConfig,
    pub throttle: ThrottleConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub url_template: String,
    pub api_key_env: String,
    /// Literal key; takes precedence over `api_key_env`.
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    pub first_exponent: u32,
    pub max_backoffs: u32,
    pub base_delay_ms: u64,
}

impl Default for StocksetConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            exchanges: Exchange::ALL.to_vec(),
            exchange_url_template: DEFAULT_EXCHANGE_URL_TEMPLATE.to_string(),
            http_timeout_secs: 60,
            example_size: EXAMPLE_SIZE,
            seed: None,
            provider: ProviderConfig::default(),
            retry: RetryConfig::default(),
            throttle: ThrottleConfig::default(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            url_template: DEFAULT_PROVIDER_URL_TEMPLATE.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            api_key: None,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 1000,
        }
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            first_exponent: 3,
            max_backoffs: 5,
            base_delay_ms: 1000,
        }
    }
}

impl StocksetConfig {
    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.exchanges.is_empty() {
            return Err(ConfigError::Invalid("at least one exchange is required".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        // The last retry sleep uses exponent max_attempts - 2.
        if self.retry.max_attempts > MAX_BACKOFF_EXPONENT + 2 {
            return Err(ConfigError::Invalid(format!(
                "retry.max_attempts must be at most {}",
                MAX_BACKOFF_EXPONENT + 2
            )));
        }
        if self.throttle.max_backoffs == 0 {
            return Err(ConfigError::Invalid("throttle.max_backoffs must be at least 1".into()));
        }
        let last_throttle_exponent = self
            .throttle
            .first_exponent
            .checked_add(self.throttle.max_backoffs - 1);
        if last_throttle_exponent.map_or(true, |e| e > MAX_BACKOFF_EXPONENT) {
            return Err(ConfigError::Invalid(format!(
                "throttle.first_exponent + throttle.max_backoffs must be at most {}",
                MAX_BACKOFF_EXPONENT + 1
            )));
        }
        if self.example_size == 0 {
            return Err(ConfigError::Invalid("example_size must be at least 1".into()));
        }
        if !self.provider.url_template.contains("{symbol}") {
            return Err(ConfigError::Invalid(
                "provider.url_template must contain {symbol}".into(),
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
        }
    }

    pub fn throttle_policy(&self) -> ThrottlePolicy {
        ThrottlePolicy {
            first_exponent: self.throttle.first_exponent,
            max_backoffs: self.throttle.max_backoffs,
            base_delay: Duration::from_millis(self.throttle.base_delay_ms),
        }
    }

    pub fn endpoint(&self) -> ProviderEndpoint {
        ProviderEndpoint {
            url_template: self.provider.url_template.clone(),
            api_key_env: self.provider.api_key_env.clone(),
            api_key: self.provider.api_key.clone(),
        }
    }

    pub fn sampler(&self) -> ExampleSampler {
        ExampleSampler::new(self.example_size, self.seed)
    }

    /// Fetcher over the real HTTP transport.
    pub fn fetcher(&self) -> Result<Fetcher, DataError> {
        let client = ReqwestClient::new(Duration::from_secs(self.http_timeout_secs))?;
        Ok(self.fetcher_with(Arc::new(client)))
    }

    /// Fetcher over a caller-supplied transport.
    pub fn fetcher_with(&self, client: Arc<dyn HttpClient>) -> Fetcher {
        Fetcher::new(client, self.retry_policy())
    }

    pub fn catalog(&self, fetcher: Fetcher) -> SymbolCatalog {
        SymbolCatalog::new(&self.data_dir, fetcher)
            .with_exchanges(self.exchanges.clone())
            .with_url_template(self.exchange_url_template.clone())
    }

    pub fn series_store(&self, fetcher: Fetcher) -> TimeSeriesStore {
        TimeSeriesStore::new(&self.data_dir, fetcher, self.endpoint())
            .with_throttle_policy(self.throttle_policy())
    }
}

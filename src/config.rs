use std::env;
use std::path::PathBuf;

use crate::provider::ProviderKind;
use crate::types::{LedgerError, Result};

pub const DEFAULT_ARTICLE_URL: &str = "https://www.schwab.com/learn/story/stock-market-update-open";
pub const DEFAULT_LEDGER_PATH: &str = "market_sentiment.csv";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Run-time settings, loaded once at startup from the process environment
/// (optionally seeded from a `.env` file) and threaded explicitly into
/// component constructors.
#[derive(Debug, Clone)]
pub struct Config {
    pub provider: ProviderKind,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub article_url: String,
    pub ledger_path: PathBuf,
    pub pushover_user_key: Option<String>,
    pub pushover_api_token: Option<String>,
    /// Verbosity directive for the tracing subscriber, e.g. "info" or
    /// "debug".
    pub log_level: String,
}

impl Config {
    /// Load from the process environment. The API key for the selected
    /// provider must be present; everything else has a default or is
    /// optional.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. `from_env` is this over
    /// `std::env`; tests supply a map instead.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let provider: ProviderKind = get("USE_MODEL")
            .unwrap_or_else(|| "openai".to_string())
            .parse()?;

        let config = Self {
            provider,
            openai_api_key: get("OPENAI_API_KEY"),
            anthropic_api_key: get("ANTHROPIC_API_KEY"),
            article_url: get("ARTICLE_URL").unwrap_or_else(|| DEFAULT_ARTICLE_URL.to_string()),
            ledger_path: get("LEDGER_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LEDGER_PATH)),
            pushover_user_key: get("PUSHOVER_USER_KEY"),
            pushover_api_token: get("PUSHOVER_API_TOKEN"),
            log_level: get("LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        };

        // Fail at startup, not mid-run, when the selected provider has no
        // credentials.
        config.api_key()?;

        Ok(config)
    }

    /// The API key for the selected provider.
    pub fn api_key(&self) -> Result<&str> {
        let (key, var) = match self.provider {
            ProviderKind::OpenAi => (&self.openai_api_key, "OPENAI_API_KEY"),
            ProviderKind::Anthropic => (&self.anthropic_api_key, "ANTHROPIC_API_KEY"),
        };
        key.as_deref()
            .ok_or_else(|| LedgerError::Config(format!("{} is not set", var)))
    }
}

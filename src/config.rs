//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (the gateway API key) are referenced by env-var name in the
//! config and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::engine::scheduler::SchedulerConfig;
use crate::strategy::eligibility::FilterConfig;
use crate::strategy::exit::ExitConfig;
use crate::types::SniperError;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub market: MarketConfig,
    pub trading: TradingConfig,
    #[serde(default)]
    pub filter: FilterSection,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    pub name: String,
    /// Principal the agent trades as.
    pub identity: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MarketConfig {
    pub gateway_url: String,
    pub canister_id: String,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TradingConfig {
    /// Base-token amount spent per buy, in e8s.
    pub commitment: u64,
    /// Reserve at which a position is sold, in e8s.
    pub reserve_sell_threshold: u64,
    #[serde(default = "default_premium_multiplier")]
    pub premium_multiplier: f64,
    pub buy_interval_ms: u64,
    pub sell_interval_ms: u64,
    pub max_age_after_buy_secs: u64,
    #[serde(default = "default_min_age_after_buy_secs")]
    pub min_age_after_buy_secs: u64,
    pub follower_grace_secs: u64,
    pub decay_steepness: f64,
    pub max_concurrent_buy_tasks: usize,
    #[serde(default = "default_max_sell_attempts")]
    pub max_sell_attempts: u32,
    /// Base tokens (e8s) deposited into the trading account at startup.
    #[serde(default)]
    pub deposit_on_start: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FilterSection {
    #[serde(default = "default_market_cap_baseline")]
    pub market_cap_baseline: f64,
    #[serde(default = "default_recency_window_secs")]
    pub recency_window_secs: u64,
    #[serde(default = "default_denylisted_creators")]
    pub denylisted_creators: Vec<String>,
    #[serde(default = "default_name_denylist")]
    pub name_denylist: Vec<String>,
    #[serde(default = "default_ticker_denylist")]
    pub ticker_denylist: Vec<String>,
    #[serde(default = "default_premium_keyword")]
    pub premium_keyword: String,
}

impl Default for FilterSection {
    fn default() -> Self {
        Self {
            market_cap_baseline: default_market_cap_baseline(),
            recency_window_secs: default_recency_window_secs(),
            denylisted_creators: default_denylisted_creators(),
            name_denylist: default_name_denylist(),
            ticker_denylist: default_ticker_denylist(),
            premium_keyword: default_premium_keyword(),
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_premium_multiplier() -> f64 {
    1.5
}

fn default_min_age_after_buy_secs() -> u64 {
    15 * 60
}

fn default_max_sell_attempts() -> u32 {
    1
}

/// Market cap every fresh listing starts at on the launch market.
fn default_market_cap_baseline() -> f64 {
    2109.2855470912427
}

fn default_recency_window_secs() -> u64 {
    3
}

fn default_denylisted_creators() -> Vec<String> {
    FilterConfig::default().denylisted_creators
}

fn default_name_denylist() -> Vec<String> {
    vec!["test".to_string()]
}

fn default_ticker_denylist() -> Vec<String> {
    vec!["test".to_string(), "sniper".to_string(), "bot".to_string()]
}

fn default_premium_keyword() -> String {
    "bob".to_string()
}

/// Upper bound for every age and grace setting: ten years.
const MAX_DURATION_SECS: u64 = 10 * 365 * 24 * 3600;

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Invalid config file: {path}"))
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), SniperError> {
        let t = &self.trading;
        if t.buy_interval_ms == 0 || t.sell_interval_ms == 0 {
            return Err(SniperError::Config("intervals must be non-zero".into()));
        }
        if t.max_concurrent_buy_tasks == 0 {
            return Err(SniperError::Config(
                "max_concurrent_buy_tasks must be at least 1".into(),
            ));
        }
        if !t.decay_steepness.is_finite() || t.decay_steepness < 0.0 {
            return Err(SniperError::Config(format!(
                "decay_steepness must be a non-negative number, got {}",
                t.decay_steepness
            )));
        }
        for (name, secs) in [
            ("max_age_after_buy_secs", t.max_age_after_buy_secs),
            ("min_age_after_buy_secs", t.min_age_after_buy_secs),
            ("follower_grace_secs", t.follower_grace_secs),
        ] {
            if secs > MAX_DURATION_SECS {
                return Err(SniperError::Config(format!(
                    "{name} must be at most {MAX_DURATION_SECS}, got {secs}"
                )));
            }
        }
        if t.min_age_after_buy_secs > t.max_age_after_buy_secs {
            return Err(SniperError::Config(format!(
                "min_age_after_buy_secs ({}) exceeds max_age_after_buy_secs ({})",
                t.min_age_after_buy_secs, t.max_age_after_buy_secs
            )));
        }
        if !t.premium_multiplier.is_finite() || t.premium_multiplier < 1.0 {
            return Err(SniperError::Config(format!(
                "premium_multiplier must be >= 1.0, got {}",
                t.premium_multiplier
            )));
        }
        if t.max_sell_attempts == 0 {
            return Err(SniperError::Config("max_sell_attempts must be at least 1".into()));
        }

        // An empty word is a substring of every name.
        let f = &self.filter;
        if f.name_denylist.iter().chain(&f.ticker_denylist).any(|w| w.is_empty()) {
            return Err(SniperError::Config("denylist entries must not be empty".into()));
        }
        if f.premium_keyword.is_empty() {
            return Err(SniperError::Config("premium_keyword must not be empty".into()));
        }
        Ok(())
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// Gateway API key, if one is configured.
    pub fn api_key(&self) -> Result<Option<SecretString>> {
        match self.market.api_key_env.as_deref() {
            Some(env) => Ok(Some(SecretString::new(Self::resolve_env(env)?))),
            None => Ok(None),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.market.request_timeout_secs)
    }

    pub fn filter_config(&self) -> FilterConfig {
        let f = &self.filter;
        FilterConfig {
            market_cap_baseline: f.market_cap_baseline,
            recency_window: Duration::from_secs(f.recency_window_secs),
            denylisted_creators: f.denylisted_creators.clone(),
            name_denylist: f.name_denylist.clone(),
            ticker_denylist: f.ticker_denylist.clone(),
            premium_keyword: f.premium_keyword.clone(),
        }
    }

    pub fn exit_config(&self) -> ExitConfig {
        let t = &self.trading;
        ExitConfig {
            reserve_sell_threshold: t.reserve_sell_threshold,
            premium_multiplier: t.premium_multiplier,
            max_age_after_buy: Duration::from_secs(t.max_age_after_buy_secs),
            min_age_after_buy: Duration::from_secs(t.min_age_after_buy_secs),
            follower_grace: Duration::from_secs(t.follower_grace_secs),
            decay_steepness: t.decay_steepness,
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        let t = &self.trading;
        SchedulerConfig {
            commitment: t.commitment,
            buy_interval: Duration::from_millis(t.buy_interval_ms),
            sell_interval: Duration::from_millis(t.sell_interval_ms),
            max_concurrent_buy_tasks: t.max_concurrent_buy_tasks,
            max_sell_attempts: t.max_sell_attempts,
        }
    }
}

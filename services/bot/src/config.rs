//! services/bot/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use lifeline_core::SchedulerConfig;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub telegram_token: String,
    pub telegram_api_base: String,
    /// Expected `X-Telegram-Bot-Api-Secret-Token`; unchecked when absent.
    pub webhook_secret: Option<String>,
    /// Natural-language input is disabled without a key.
    pub ai_api_key: Option<String>,
    pub ai_base_url: String,
    pub ai_model: String,
    pub scheduler_interval: Duration,
    pub scheduler_grace: Duration,
    pub reminder_cooldown: Duration,
    pub session_ttl: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let required = |key: &str| lookup(key).ok_or_else(|| ConfigError::MissingVar(key.to_string()));

        // --- Server and Database Settings ---
        let bind_address_str = var_or("BIND_ADDRESS", "0.0.0.0:3000");
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = required("DATABASE_URL")?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Telegram ---
        let telegram_token = required("TELEGRAM_TOKEN")?;
        let telegram_api_base = var_or("TELEGRAM_API_BASE", "https://api.telegram.org");
        let webhook_secret = lookup("WEBHOOK_SECRET").filter(|s| !s.is_empty());

        // --- Intent Parsing (optional) ---
        let ai_api_key = lookup("AI_API_KEY").filter(|s| !s.is_empty());
        let ai_base_url = var_or("AI_BASE_URL", "https://openrouter.ai/api/v1");
        let ai_model = var_or("AI_MODEL", "openai/gpt-4o-mini");

        // --- Scheduler and Sessions ---
        let secs = |key: &str, default: u64| -> Result<Duration, ConfigError> {
            match lookup(key) {
                None => Ok(Duration::from_secs(default)),
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|_| {
                        ConfigError::InvalidValue(
                            key.to_string(),
                            format!("'{}' is not a whole number of seconds", raw),
                        )
                    }),
            }
        };
        let scheduler_interval = secs("SCHEDULER_INTERVAL_SECS", 60)?;
        if scheduler_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "SCHEDULER_INTERVAL_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        let scheduler_grace = secs("SCHEDULER_GRACE_SECS", 2)?;
        let reminder_cooldown = secs("REMINDER_COOLDOWN_SECS", 60)?;
        let session_ttl = secs("SESSION_TTL_SECS", 600)?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            telegram_token,
            telegram_api_base,
            webhook_secret,
            ai_api_key,
            ai_base_url,
            ai_model,
            scheduler_interval,
            scheduler_grace,
            reminder_cooldown,
            session_ttl,
        })
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            check_interval: self.scheduler_interval,
            startup_grace: self.scheduler_grace,
            reminder_cooldown: self.reminder_cooldown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/lifeline"),
            ("TELEGRAM_TOKEN", "123:abc"),
        ]))
        .unwrap();
        assert_eq!(config.bind_address.to_string(), "0.0.0.0:3000");
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.ai_model, "openai/gpt-4o-mini");
        assert!(config.ai_api_key.is_none());
        assert_eq!(config.scheduler().check_interval, Duration::from_secs(60));
        assert_eq!(config.scheduler().startup_grace, Duration::from_secs(2));
        assert_eq!(config.session_ttl, Duration::from_secs(600));
    }

    #[test]
    fn missing_required_vars() {
        let err = Config::from_lookup(lookup(&[("TELEGRAM_TOKEN", "123:abc")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ref v) if v == "DATABASE_URL"));

        let err = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://x")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ref v) if v == "TELEGRAM_TOKEN"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let base = [
            ("DATABASE_URL", "postgres://x"),
            ("TELEGRAM_TOKEN", "123:abc"),
        ];
        for (key, value) in [
            ("SCHEDULER_INTERVAL_SECS", "soon"),
            ("SCHEDULER_INTERVAL_SECS", "0"),
            ("RUST_LOG", "chatty"),
            ("BIND_ADDRESS", "nowhere"),
        ] {
            let mut pairs = base.to_vec();
            pairs.push((key, value));
            let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue(ref k, _) if k == key), "{key}={value}");
        }
    }
}

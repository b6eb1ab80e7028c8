use std::{env, str::FromStr, time::Duration};

use thiserror::Error;

use crate::http::retry::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

// Environment variables, read after `.env` is loaded.
const BASE_URL_VAR: &str = "binance_base_url";
const TIMEOUT_VAR: &str = "binance_timeout_secs";
const MAX_RETRIES_VAR: &str = "binance_max_retries";
const REQUEST_INTERVAL_VAR: &str = "binance_request_interval_ms";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Environment variable '{0}' has invalid value {1:?}")]
    InvalidValue(&'static str, String),
}

/// Settings shared by every upstream call of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub base_url: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    // Fixed spacing between page requests. `None` derives it from the
    // exchange's published rate limits.
    pub request_interval: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
            request_interval: None,
        }
    }
}

impl Config {
    /// Reads the process environment on top of the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(url) = lookup(BASE_URL_VAR) {
            let url = url.trim().trim_end_matches('/').to_string();
            if reqwest::Url::parse(&url).is_err() {
                return Err(ConfigError::InvalidValue(BASE_URL_VAR, url));
            }
            config.base_url = url;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, TIMEOUT_VAR)? {
            if secs == 0 {
                return Err(ConfigError::InvalidValue(TIMEOUT_VAR, secs.to_string()));
            }
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = parse_var::<u32, _>(&lookup, MAX_RETRIES_VAR)? {
            config.retry.max_retries = retries;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, REQUEST_INTERVAL_VAR)? {
            config.request_interval = Some(Duration::from_millis(ms));
        }

        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(key, raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.base_url, "https://api.binance.com");
        assert_eq!(config.retry.max_retries, 0);
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("binance_base_url", "http://127.0.0.1:8080/"),
            ("binance_timeout_secs", "3"),
            ("binance_max_retries", "2"),
            ("binance_request_interval_ms", "250"),
        ]))
        .unwrap();

        assert_eq!(config.base_url, "http://127.0.0.1:8080");
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.request_interval, Some(Duration::from_millis(250)));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(
            Config::from_lookup(lookup(&[("binance_max_retries", "many")])),
            Err(ConfigError::InvalidValue("binance_max_retries", "many".into()))
        );
        assert!(Config::from_lookup(lookup(&[("binance_timeout_secs", "0")])).is_err());
        assert!(Config::from_lookup(lookup(&[("binance_base_url", "not a url")])).is_err());
    }
}

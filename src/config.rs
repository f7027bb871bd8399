use std::time::Duration;

use crate::errors::ConfigError;

/// Default provider endpoint; the location is appended as the `q` parameter.
pub const DEFAULT_API_URL: &str = "http://api.openweathermap.org/data/2.5/weather";
/// How long a cached record stays fresh unless overridden.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 10;
/// Upper bound on a single provider fetch unless overridden.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

/// Broker configuration, parsed from environment variables.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub base_url: String,
    pub user_agent: String,
    /// Freshness window shared by every cache entry.
    pub cache_ttl: Duration,
    pub fetch_timeout: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            user_agent: default_user_agent(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
        }
    }
}

impl BrokerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: std::env::var("WEATHER_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            user_agent: std::env::var("WEATHER_USER_AGENT")
                .unwrap_or_else(|_| default_user_agent()),
            cache_ttl: secs_from_env("WEATHER_CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS)?,
            fetch_timeout: secs_from_env(
                "WEATHER_FETCH_TIMEOUT_SECS",
                DEFAULT_FETCH_TIMEOUT_SECS,
            )?,
        })
    }
}

fn default_user_agent() -> String {
    format!("weather-broker/{}", env!("CARGO_PKG_VERSION"))
}

fn secs_from_env(var: &str, default: u64) -> Result<Duration, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::InvalidValue {
                var: var.to_string(),
                message: format!("'{}' is not a whole number of seconds: {}", raw, e),
            }),
        Err(_) => Ok(Duration::from_secs(default)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // All env manipulation lives in one test so parallel test threads never
    // observe each other's variables.
    #[test]
    fn test_from_env_defaults_and_overrides() {
        unsafe {
            std::env::remove_var("WEATHER_API_URL");
            std::env::remove_var("WEATHER_USER_AGENT");
            std::env::remove_var("WEATHER_CACHE_TTL_SECS");
            std::env::remove_var("WEATHER_FETCH_TIMEOUT_SECS");
        }

        let config = BrokerConfig::from_env().unwrap();
        assert_eq!(config.base_url, DEFAULT_API_URL);
        assert!(config.user_agent.starts_with("weather-broker/"));
        assert_eq!(config.cache_ttl, Duration::from_secs(10));
        assert_eq!(config.fetch_timeout, Duration::from_secs(10));

        unsafe {
            std::env::set_var("WEATHER_CACHE_TTL_SECS", "300");
            std::env::set_var("WEATHER_API_URL", "http://localhost:9999/weather");
        }
        let config = BrokerConfig::from_env().unwrap();
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.base_url, "http://localhost:9999/weather");

        unsafe {
            std::env::set_var("WEATHER_FETCH_TIMEOUT_SECS", "soon");
        }
        let err = BrokerConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("WEATHER_FETCH_TIMEOUT_SECS"));

        unsafe {
            std::env::remove_var("WEATHER_API_URL");
            std::env::remove_var("WEATHER_CACHE_TTL_SECS");
            std::env::remove_var("WEATHER_FETCH_TIMEOUT_SECS");
        }
    }

    #[test]
    fn test_default_matches_constants() {
        let config = BrokerConfig::default();
        assert_eq!(config.base_url, DEFAULT_API_URL);
        assert_eq!(
            config.fetch_timeout,
            Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS)
        );
    }
}

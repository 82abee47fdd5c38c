//! Application configuration loaded from environment variables.

use std::time::Duration;

use fulfillment::FulfillmentConfig;
use store::RetryPolicy;

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `json` for JSON log lines (default: pretty)
/// - `DATABASE_URL`: PostgreSQL for orders and inventory (default: in memory)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `5`)
/// - `STEP_TIMEOUT_MS`: deadline per remote step (default: `5000`)
/// - `RESERVE_MAX_RETRIES`: compare-and-swap retries (default: `3`)
/// - `RESERVE_RETRY_DELAY_MS`: first retry backoff (default: `10`)
/// - `KAFKA_BROKERS`: reward publisher brokers, `kafka` feature only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub step_timeout: Duration,
    pub reserve_max_retries: u32,
    pub reserve_retry_delay: Duration,
    pub kafka_brokers: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from `lookup`, falling back to defaults for
    /// missing or unparsable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.parse::<u64>().ok());

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match lookup("LOG_FORMAT").as_deref() {
                Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            database_max_connections: lookup("DATABASE_MAX_CONNECTIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.database_max_connections),
            step_timeout: parsed("STEP_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.step_timeout),
            reserve_max_retries: lookup("RESERVE_MAX_RETRIES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.reserve_max_retries),
            reserve_retry_delay: parsed("RESERVE_RETRY_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.reserve_retry_delay),
            kafka_brokers: lookup("KAFKA_BROKERS").filter(|b| !b.is_empty()),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn fulfillment(&self) -> FulfillmentConfig {
        FulfillmentConfig {
            step_timeout: self.step_timeout,
            ..FulfillmentConfig::default()
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_retries(self.reserve_max_retries, self.reserve_retry_delay)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            database_max_connections: 5,
            step_timeout: Duration::from_millis(5000),
            reserve_max_retries: 3,
            reserve_retry_delay: Duration::from_millis(10),
            kafka_brokers: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.database_url, None);
        assert_eq!(config.step_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_empty_lookup_matches_defaults() {
        assert_eq!(from_pairs(&[]), Config::default());
    }

    #[test]
    fn test_lookup_overrides() {
        let config = from_pairs(&[
            ("PORT", "8080"),
            ("LOG_FORMAT", "JSON"),
            ("DATABASE_URL", "postgres://localhost/orders"),
            ("DATABASE_MAX_CONNECTIONS", "20"),
            ("STEP_TIMEOUT_MS", "250"),
            ("RESERVE_MAX_RETRIES", "7"),
            ("RESERVE_RETRY_DELAY_MS", "3"),
        ]);

        assert_eq!(config.port, 8080);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/orders")
        );
        assert_eq!(config.database_max_connections, 20);
        assert_eq!(config.fulfillment().step_timeout, Duration::from_millis(250));

        let retry = config.retry_policy();
        assert_eq!(retry.max_retries, 7);
        assert_eq!(retry.initial_delay, Duration::from_millis(3));
    }

    #[test]
    fn test_unparsable_values_fall_back() {
        let config = from_pairs(&[
            ("PORT", "http"),
            ("STEP_TIMEOUT_MS", "-1"),
            ("DATABASE_URL", ""),
        ]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.step_timeout, Duration::from_secs(5));
        assert_eq!(config.database_url, None);
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }
}

//! Client configuration
//!
//! Defines the connection and buffering settings of a log shipping client.

use std::time::Duration;

/// Client configuration
///
/// Intervals and limits are configurable to allow tuning for different
/// deployment scenarios (chatty services vs. quiet batch jobs).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Identity reported in every batch
    pub client_name: String,

    /// Receiver base URL (e.g., "http://localhost:4080")
    pub collector_url: String,

    /// Timeout applied to every HTTP request
    pub request_timeout: Duration,

    /// How often buffered entries are shipped
    pub flush_interval: Duration,

    /// Number of buffered entries that forces an early flush
    pub max_buffered_entries: usize,

    /// Keep cookies set by the receiver and send them back on later requests
    pub cookie_store: bool,
}

impl ClientConfig {
    /// Creates a new configuration with defaults
    pub fn new(client_name: String, collector_url: String) -> Self {
        Self {
            client_name,
            collector_url,
            request_timeout: Duration::from_secs(10),
            flush_interval: Duration::from_secs(5),
            max_buffered_entries: 500,
            cookie_store: false,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - LUMBER_COLLECTOR_URL (required)
    /// - LUMBER_CLIENT_NAME (optional, default: random UUID)
    /// - LUMBER_REQUEST_TIMEOUT (optional, seconds, default: 10)
    /// - LUMBER_FLUSH_INTERVAL (optional, seconds, default: 5)
    /// - LUMBER_MAX_BUFFERED (optional, default: 500)
    /// - LUMBER_COOKIE_STORE (optional, true/false, default: false)
    pub fn from_env() -> anyhow::Result<Self> {
        let collector_url = std::env::var("LUMBER_COLLECTOR_URL")
            .map_err(|_| anyhow::anyhow!("LUMBER_COLLECTOR_URL environment variable not set"))?;

        let client_name = std::env::var("LUMBER_CLIENT_NAME")
            .unwrap_or_else(|_| uuid::Uuid::new_v4().to_string());

        let mut config = Self::new(client_name, collector_url);

        if let Some(timeout) = env_u64("LUMBER_REQUEST_TIMEOUT") {
            config.request_timeout = Duration::from_secs(timeout);
        }
        if let Some(interval) = env_u64("LUMBER_FLUSH_INTERVAL") {
            config.flush_interval = Duration::from_secs(interval);
        }
        if let Some(max) = env_u64("LUMBER_MAX_BUFFERED") {
            config.max_buffered_entries = max as usize;
        }
        if let Ok(value) = std::env::var("LUMBER_COOKIE_STORE") {
            config.cookie_store = parse_bool(&value)
                .ok_or_else(|| anyhow::anyhow!("LUMBER_COOKIE_STORE must be true or false"))?;
        }

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.client_name.is_empty() {
            anyhow::bail!("client_name cannot be empty");
        }

        if !self.collector_url.starts_with("http://") && !self.collector_url.starts_with("https://")
        {
            anyhow::bail!("collector_url must start with http:// or https://");
        }

        if self.request_timeout.is_zero() {
            anyhow::bail!("request_timeout must be greater than 0");
        }

        if self.flush_interval.is_zero() {
            anyhow::bail!("flush_interval must be greater than 0");
        }

        if self.max_buffered_entries == 0 {
            anyhow::bail!("max_buffered_entries must be greater than 0");
        }

        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(
            uuid::Uuid::new_v4().to_string(),
            "http://localhost:4080".to_string(),
        )
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|s| s.parse::<u64>().ok())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.flush_interval, Duration::from_secs(5));
        assert_eq!(config.max_buffered_entries, 500);
        assert!(!config.cookie_store);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = ClientConfig::default();

        config.client_name = String::new();
        assert!(config.validate().is_err());
        config.client_name = "web-01".to_string();

        config.collector_url = "localhost:4080".to_string();
        assert!(config.validate().is_err());
        config.collector_url = "https://logs.internal".to_string();
        assert!(config.validate().is_ok());

        config.flush_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool(" ON "), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("False"), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}

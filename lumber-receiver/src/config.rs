//! Receiver configuration
//!
//! Defines how the receiver binds and which batches it accepts.

use crate::service::forwarding::BatchLimits;

/// Receiver configuration
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Address the HTTP server listens on
    pub bind_addr: String,

    /// Prepended to every decoded logger name (empty leaves names untouched)
    pub logger_name_prefix: String,

    /// Maximum number of events in one batch
    pub max_batch_events: usize,

    /// Maximum length of a single message, in bytes
    pub max_message_length: usize,

    /// Maximum size of a request body, in bytes
    pub max_body_bytes: usize,
}

impl ReceiverConfig {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - RECEIVER_BIND_ADDR (default: 0.0.0.0:4080)
    /// - LOGGER_NAME_PREFIX (default: empty)
    /// - MAX_BATCH_EVENTS (default: 10000)
    /// - MAX_MESSAGE_LENGTH (default: 32768)
    /// - MAX_BODY_BYTES (default: 16 MiB)
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("RECEIVER_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(prefix) = std::env::var("LOGGER_NAME_PREFIX") {
            config.logger_name_prefix = prefix;
        }
        config.max_batch_events = env_usize("MAX_BATCH_EVENTS", config.max_batch_events)?;
        config.max_message_length = env_usize("MAX_MESSAGE_LENGTH", config.max_message_length)?;
        config.max_body_bytes = env_usize("MAX_BODY_BYTES", config.max_body_bytes)?;

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_addr.is_empty() {
            anyhow::bail!("bind_addr cannot be empty");
        }

        if self.max_batch_events == 0 {
            anyhow::bail!("max_batch_events must be greater than 0");
        }

        if self.max_message_length == 0 {
            anyhow::bail!("max_message_length must be greater than 0");
        }

        if self.max_body_bytes == 0 {
            anyhow::bail!("max_body_bytes must be greater than 0");
        }

        Ok(())
    }

    pub fn limits(&self) -> BatchLimits {
        BatchLimits {
            max_events: self.max_batch_events,
            max_message_length: self.max_message_length,
        }
    }
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:4080".to_string(),
            logger_name_prefix: String::new(),
            max_batch_events: 10_000,
            max_message_length: 32_768,
            max_body_bytes: 16 * 1024 * 1024,
        }
    }
}

fn env_usize(name: &str, default: usize) -> anyhow::Result<usize> {
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|e| anyhow::anyhow!("{} must be a positive integer: {}", name, e)),
        Err(_) => Ok(default),
    }
}

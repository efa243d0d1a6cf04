//! Configuration module
//!
//! Handles CLI configuration including the receiver URL and client identity.

use std::time::Duration;

use lumber_client::ClientConfig;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the receiver service
    pub collector_url: String,
    /// Client name written into every batch
    pub client_name: String,
    /// Timeout applied to each HTTP request
    pub request_timeout: Duration,
}

impl Config {
    /// Client settings for shipping batches
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(self.client_name.clone(), self.collector_url.clone());
        config.request_timeout = self.request_timeout;
        config
    }
}

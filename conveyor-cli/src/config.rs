//! Configuration module
//!
//! Handles CLI configuration: server URL, request timeout and how long
//! notifications stay up.

use std::time::Duration;

use conveyor_client::ConveyorClient;
use conveyor_core::notification::{NotificationConfig, NotificationScheduler};

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the pipeline server
    pub server_url: String,

    /// Per-request timeout
    pub timeout: Duration,

    /// How long a notification stays visible
    pub notification_duration: Duration,
}

impl Config {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            timeout: Duration::from_secs(30),
            notification_duration: Duration::from_millis(3500),
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server_url.trim().is_empty() {
            anyhow::bail!("server_url cannot be empty");
        }

        if !self.server_url.starts_with("http://") && !self.server_url.starts_with("https://") {
            anyhow::bail!("server_url must start with http:// or https://");
        }

        if self.timeout.is_zero() {
            anyhow::bail!("timeout must be greater than 0");
        }

        if self.notification_duration.is_zero() {
            anyhow::bail!("notification duration must be greater than 0");
        }

        Ok(())
    }

    /// HTTP client for the configured server
    pub fn client(&self) -> anyhow::Result<ConveyorClient> {
        Ok(ConveyorClient::with_timeout(&self.server_url, self.timeout)?)
    }

    pub fn notifications(&self) -> NotificationScheduler {
        NotificationScheduler::new(NotificationConfig {
            duration: self.notification_duration,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("http://localhost:8080")
    }
}

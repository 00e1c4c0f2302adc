//! Service configuration.
//!
//! Every field carries a serde default so a partially specified
//! configuration is valid; [`ExporterConfig::validate`] then enforces the
//! few hard requirements (a webhook secret, well-formed route paths).

use serde::{Deserialize, Serialize};

/// Top-level exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Route paths
    #[serde(default)]
    pub web: WebConfig,

    /// GitHub credentials and polling settings
    #[serde(default)]
    pub github: GitHubConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Graceful shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout_seconds: default_shutdown_timeout(),
        }
    }
}

/// Route path configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Path under which to expose metrics
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,

    /// Path that receives GitHub webhook deliveries
    #[serde(default = "default_webhook_path")]
    pub webhook_path: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            metrics_path: default_metrics_path(),
            webhook_path: default_webhook_path(),
        }
    }
}

/// GitHub credentials and REST polling configuration.
///
/// The webhook secret authenticates inbound deliveries; the API token is
/// only needed when the billing or runner pollers are enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// Shared secret the webhook deliveries are signed with
    #[serde(default)]
    pub webhook_secret: String,

    /// Token for the GitHub REST API (pollers only)
    #[serde(default)]
    pub api_token: String,

    /// Organization to poll billing and runners for
    #[serde(default)]
    pub org: String,

    /// User to poll billing for
    #[serde(default)]
    pub user: String,

    /// Enterprise whose runners are polled into a pseudo runner group
    #[serde(default)]
    pub enterprise: String,

    /// Billing poll interval in seconds
    #[serde(default = "default_billing_poll_seconds")]
    pub billing_poll_seconds: u64,

    /// Runner-pool poll interval in seconds
    #[serde(default = "default_runners_poll_seconds")]
    pub runners_poll_seconds: u64,

    /// Enable the billing poller
    #[serde(default)]
    pub billing_metrics_enabled: bool,

    /// Enable the runner-pool poller
    #[serde(default)]
    pub runners_metrics_enabled: bool,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            webhook_secret: String::new(),
            api_token: String::new(),
            org: String::new(),
            user: String::new(),
            enterprise: String::new(),
            billing_poll_seconds: default_billing_poll_seconds(),
            runners_poll_seconds: default_runners_poll_seconds(),
            billing_metrics_enabled: false,
            runners_metrics_enabled: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9101
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_webhook_path() -> String {
    "/webhook".to_string()
}

fn default_billing_poll_seconds() -> u64 {
    300
}

fn default_runners_poll_seconds() -> u64 {
    60
}

/// Error produced when the configuration is unusable.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("the GitHub webhook secret must be configured")]
    MissingWebhookSecret,

    #[error("route path '{path}' must start with '/'")]
    InvalidPath { path: String },

    #[error("poll interval for {poller} must be greater than zero")]
    InvalidPollInterval { poller: &'static str },
}

impl ExporterConfig {
    /// Check the hard requirements that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.github.webhook_secret.is_empty() {
            return Err(ConfigError::MissingWebhookSecret);
        }

        for path in [&self.web.metrics_path, &self.web.webhook_path] {
            if !path.starts_with('/') {
                return Err(ConfigError::InvalidPath { path: path.clone() });
            }
        }

        if self.github.billing_metrics_enabled && self.github.billing_poll_seconds == 0 {
            return Err(ConfigError::InvalidPollInterval { poller: "billing" });
        }
        if self.github.runners_metrics_enabled && self.github.runners_poll_seconds == 0 {
            return Err(ConfigError::InvalidPollInterval { poller: "runners" });
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

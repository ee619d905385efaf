//! # Broker Configuration
//!
//! Configuration for the dataspace job broker, loaded in layers:
//!
//! 1. Built-in defaults (suitable for the docker-compose development stack)
//! 2. An optional TOML file named by the `BROKER_CONFIG` environment variable
//! 3. `BROKER__`-prefixed environment variables with `__` as the section
//!    separator, e.g. `BROKER__CONNECTOR__MANAGEMENT_URL`
//!
//! Every upstream base URL, API key, and identifier is configurable; nothing
//! endpoint-related is hardcoded in the clients.
//!
//! ## Example
//!
//! ```toml
//! [server]
//! bind_address = "0.0.0.0:8000"
//! public_base_url = "http://dashboard_api:8000"
//!
//! [connector]
//! management_url = "http://dashboard_connector:29193"
//! asset_id = "dss-f1-service"
//!
//! [credentials]
//! mode = "streaming"
//! wait_timeout_seconds = 60
//! ```

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::{BrokerError, BrokerResult};

/// HTTP server and externally reachable address configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Socket address the axum server binds to
    pub bind_address: String,
    /// Base URL under which *this* service is reachable by the remote job
    /// system, used to construct completion callback URLs
    pub public_base_url: String,
    /// Human-readable service name, reported by the health endpoint
    pub service_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            public_base_url: "http://dashboard_api:8000".to_string(),
            service_name: "Dataspace Job Broker (DSS F1 Energy Optimization)".to_string(),
        }
    }
}

/// Connector management API configuration (negotiation + transfer)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectorConfig {
    /// Management API base URL of our own connector
    pub management_url: String,
    /// API key for the management API
    pub management_api_key: String,
    /// Protocol (DSP) URL of the counterparty connector
    pub counterparty_protocol_url: String,
    /// Connector id of the counterparty
    pub counterparty_id: String,
    /// Asset identifier negotiated for
    pub asset_id: String,
    /// Host identifier used to scope the credential event stream
    pub provider_host: String,
    /// Data destination type requested in the transfer process
    pub transfer_destination_type: String,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            management_url: "http://dashboard_connector:29193".to_string(),
            management_api_key: "dashboard-api-key".to_string(),
            counterparty_protocol_url: "http://dss_connector:19194".to_string(),
            counterparty_id: "dss-connector".to_string(),
            asset_id: "dss-f1-service".to_string(),
            provider_host: "dss_connector:19194".to_string(),
            transfer_destination_type: "HttpProxy".to_string(),
        }
    }
}

/// Consumer backend configuration (SSE credential channel)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConsumerBackendConfig {
    /// Base URL of the consumer backend exposing the pull stream
    pub base_url: String,
    /// Bearer token for the pull stream subscription
    pub api_key: String,
}

impl Default for ConsumerBackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://dashboard_backend:28000".to_string(),
            api_key: "dashboard-api-key".to_string(),
        }
    }
}

/// Downstream DSS job API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DssConfig {
    /// Mediated path: the provider connector's public API base URL
    pub public_api_url: String,
    /// Direct path: the DSS API base URL, used as degraded-mode fallback
    pub direct_api_url: String,
    /// Static API key for the direct path
    pub direct_api_key: String,
}

impl Default for DssConfig {
    fn default() -> Self {
        Self {
            public_api_url: "http://dss_connector:19291".to_string(),
            direct_api_url: "http://dss_mock_api:8000".to_string(),
            direct_api_key: "dss-backend-key".to_string(),
        }
    }
}

/// Bounded polling configuration shared by negotiation and transfer stages
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollingConfig {
    /// Seconds between status polls
    pub interval_seconds: u64,
    /// Maximum number of polls before the stage times out
    pub max_attempts: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 5,
            max_attempts: 10,
        }
    }
}

impl PollingConfig {
    /// Poll interval as a `Duration`
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

/// Credential acquisition strategy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialMode {
    /// Long-lived SSE subscription to the consumer backend
    Streaming,
    /// Deterministic placeholder credential after a fixed delay, for
    /// environments without a push channel
    Synthesized,
}

/// Credential receiver configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CredentialsConfig {
    /// Which receiver variant to use
    pub mode: CredentialMode,
    /// Seconds to wait for a credential before `CredentialTimeout`
    pub wait_timeout_seconds: u64,
    /// Delay before the synthesized variant produces its placeholder
    pub synthesized_delay_seconds: u64,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            mode: CredentialMode::Streaming,
            wait_timeout_seconds: 60,
            synthesized_delay_seconds: 2,
        }
    }
}

impl CredentialsConfig {
    /// Credential wait ceiling as a `Duration`
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_seconds)
    }
}

/// Top-level broker configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BrokerConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub connector: ConnectorConfig,
    #[serde(default)]
    pub consumer_backend: ConsumerBackendConfig,
    #[serde(default)]
    pub dss: DssConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

impl BrokerConfig {
    /// Load configuration from defaults, optional TOML file, and environment.
    ///
    /// The file path is taken from `BROKER_CONFIG` when set; a missing file
    /// named there is an error, while no `BROKER_CONFIG` at all just skips
    /// the file layer.
    pub fn load() -> BrokerResult<Self> {
        let mut builder = Config::builder();

        if let Ok(path) = std::env::var("BROKER_CONFIG") {
            builder = builder.add_source(File::with_name(&path));
        }

        let config = builder
            .add_source(
                Environment::with_prefix("BROKER")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .map_err(|e| BrokerError::config_error(format!("Failed to load config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| BrokerError::config_error(format!("Invalid configuration: {e}")))
    }

    /// Completion callback URL for a given user, rooted at our public base URL
    pub fn callback_url(&self, user_id: &str) -> String {
        format!(
            "{}/webhooks/dss-callback/{}",
            self.server.public_base_url.trim_end_matches('/'),
            user_id
        )
    }
}

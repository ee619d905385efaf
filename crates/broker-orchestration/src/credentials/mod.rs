//! # Credential Receivers
//!
//! Two interchangeable strategies for obtaining the transfer-scoped access
//! credential, behind one `start` / `get_credential` / `stop` contract and
//! selected by configuration. Enum dispatch, no trait objects.
//!
//! Receivers are built per workflow run and own their buffered credentials
//! for the lifetime of that run; `stop()` releases everything regardless of
//! whether a credential was ever received.

use reqwest::Client;
use std::time::Duration;

use broker_shared::config::{BrokerConfig, CredentialMode};
use broker_shared::models::CredentialEntry;
use broker_shared::BrokerResult;

pub mod streaming;
pub mod synthesized;

pub use streaming::StreamingCredentialReceiver;
pub use synthesized::SynthesizedCredentialReceiver;

/// A per-workflow-run credential acquisition strategy
#[derive(Debug)]
pub enum CredentialReceiver {
    Streaming(StreamingCredentialReceiver),
    Synthesized(SynthesizedCredentialReceiver),
}

impl CredentialReceiver {
    /// Build the configured variant for one workflow run
    pub fn from_config(http: Client, config: &BrokerConfig) -> Self {
        match config.credentials.mode {
            CredentialMode::Streaming => Self::Streaming(StreamingCredentialReceiver::new(
                http,
                &config.consumer_backend.base_url,
                config.consumer_backend.api_key.clone(),
                &config.connector.provider_host,
            )),
            CredentialMode::Synthesized => Self::Synthesized(SynthesizedCredentialReceiver::new(
                Duration::from_secs(config.credentials.synthesized_delay_seconds),
            )),
        }
    }

    /// Begin listening (streaming) or arm the synthesis clock
    pub fn start(&mut self) {
        match self {
            Self::Streaming(receiver) => receiver.start(),
            Self::Synthesized(receiver) => receiver.start(),
        }
    }

    /// Wait up to `timeout` for the credential keyed by `transfer_id`
    pub async fn get_credential(
        &self,
        transfer_id: &str,
        timeout: Duration,
    ) -> BrokerResult<CredentialEntry> {
        match self {
            Self::Streaming(receiver) => receiver.get_credential(transfer_id, timeout).await,
            Self::Synthesized(receiver) => receiver.get_credential(transfer_id, timeout).await,
        }
    }

    /// Release subscriptions and buffers; safe on every exit path
    pub async fn stop(&mut self) {
        match self {
            Self::Streaming(receiver) => receiver.stop().await,
            Self::Synthesized(receiver) => receiver.stop(),
        }
    }
}

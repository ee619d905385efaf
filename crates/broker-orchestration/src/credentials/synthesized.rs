//! Synthesized credential receiver.
//!
//! Placeholder variant for environments without a push channel: after a
//! fixed delay it fabricates a deterministic credential for the requested
//! transfer id, with the same wait/timeout contract as the streaming
//! receiver.

use dashmap::DashMap;
use serde_json::json;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use broker_shared::models::CredentialEntry;
use broker_shared::{BrokerError, BrokerResult};

/// Credential receiver that synthesizes a placeholder after a fixed delay
#[derive(Debug)]
pub struct SynthesizedCredentialReceiver {
    delay: Duration,
    started_at: Option<Instant>,
    store: DashMap<String, CredentialEntry>,
}

impl SynthesizedCredentialReceiver {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            started_at: None,
            store: DashMap::new(),
        }
    }

    /// Deterministic placeholder token for a transfer id
    pub fn placeholder_token(transfer_id: &str) -> String {
        format!("synthesized-token-{transfer_id}")
    }

    /// Arm the receiver; the synthesis delay is measured from this point
    pub fn start(&mut self) {
        self.started_at = Some(Instant::now());
        debug!(delay_ms = self.delay.as_millis() as u64, "Synthesized credential receiver armed");
    }

    /// Produce the placeholder credential once the delay has elapsed.
    ///
    /// Repeated calls for the same transfer id return the same stored entry.
    /// A delay longer than `timeout` yields `CredentialTimeout` after waiting
    /// out the full timeout, mirroring the streaming variant.
    pub async fn get_credential(
        &self,
        transfer_id: &str,
        timeout: Duration,
    ) -> BrokerResult<CredentialEntry> {
        if let Some(entry) = self.store.get(transfer_id) {
            return Ok(entry.clone());
        }

        let started_at = self.started_at.ok_or_else(|| {
            BrokerError::Internal("Credential receiver used before start()".to_string())
        })?;

        let remaining = self.delay.saturating_sub(started_at.elapsed());
        if remaining > timeout {
            tokio::time::sleep(timeout).await;
            return Err(BrokerError::CredentialTimeout {
                transfer_id: transfer_id.to_string(),
                timeout_seconds: timeout.as_secs(),
            });
        }
        tokio::time::sleep(remaining).await;

        let entry = self
            .store
            .entry(transfer_id.to_string())
            .or_insert_with(|| {
                info!(transfer_id = %transfer_id, "Synthesized placeholder credential");
                CredentialEntry::new(json!({
                    "transfer_process_id": transfer_id,
                    "authKey": Self::placeholder_token(transfer_id),
                }))
            })
            .clone();
        Ok(entry)
    }

    /// Release buffered credentials
    pub fn stop(&mut self) {
        self.store.clear();
        self.started_at = None;
    }
}

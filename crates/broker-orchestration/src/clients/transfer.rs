//! # Transfer Process Client
//!
//! Given an agreed contract, starts a transfer process and drives it to the
//! `STARTED` state, after which the provider will push the scoped credential.

use reqwest::Client;
use tracing::{debug, info, instrument};

use broker_shared::config::ConnectorConfig;
use broker_shared::models::{CreatedResource, TransferRequest, TransferStatus};
use broker_shared::{BrokerError, BrokerResult};

use super::polling::{PollError, PollingPolicy};

const MANAGEMENT_API_KEY_HEADER: &str = "X-Api-Key";
const STATE_STARTED: &str = "STARTED";
const STATE_TERMINATED: &str = "TERMINATED";

/// Client for the management API's transfer process endpoints
#[derive(Debug, Clone)]
pub struct TransferClient {
    http: Client,
    config: ConnectorConfig,
    policy: PollingPolicy,
}

impl TransferClient {
    pub fn new(http: Client, config: ConnectorConfig, policy: PollingPolicy) -> Self {
        Self {
            http,
            config,
            policy,
        }
    }

    /// Start a transfer for `asset_id` under `agreement_id`, returning the
    /// transfer process id once the provider reports it `STARTED`.
    ///
    /// Same polling discipline as negotiation: exhaustion raises
    /// `TransferTimeout`, hard errors raise `TransferFailed` immediately.
    #[instrument(skip(self), fields(agreement_id = agreement_id, asset_id = asset_id))]
    pub async fn initiate_transfer(
        &self,
        agreement_id: &str,
        asset_id: &str,
        provider_address: &str,
    ) -> BrokerResult<String> {
        let transfer_id = self
            .submit(agreement_id, asset_id, provider_address)
            .await?;
        info!(transfer_id = %transfer_id, "Transfer process submitted");

        let result = self
            .policy
            .run(|attempt| {
                let transfer_id = transfer_id.clone();
                async move {
                    let status = self.poll(&transfer_id).await?;
                    debug!(
                        transfer_id = %transfer_id,
                        attempt,
                        state = %status.state,
                        "Transfer state polled"
                    );
                    if status.state.eq_ignore_ascii_case(STATE_TERMINATED) {
                        return Err(BrokerError::TransferFailed(format!(
                            "Transfer {transfer_id} terminated by provider"
                        )));
                    }
                    if status.state.eq_ignore_ascii_case(STATE_STARTED) {
                        return Ok(Some(()));
                    }
                    Ok(None)
                }
            })
            .await;

        match result {
            Ok(()) => {
                info!(transfer_id = %transfer_id, "Transfer process started");
                Ok(transfer_id)
            }
            Err(PollError::Exhausted { attempts }) => Err(BrokerError::TransferTimeout {
                transfer_id,
                attempts,
            }),
            Err(PollError::Failed(e)) => Err(match e {
                failed @ BrokerError::TransferFailed(_) => failed,
                other => BrokerError::transfer_failed(other),
            }),
        }
    }

    async fn submit(
        &self,
        agreement_id: &str,
        asset_id: &str,
        provider_address: &str,
    ) -> BrokerResult<String> {
        let body = TransferRequest {
            contract_id: agreement_id.to_string(),
            asset_id: asset_id.to_string(),
            counter_party_address: provider_address.to_string(),
            transfer_type: self.config.transfer_destination_type.clone(),
        };

        let response = self
            .http
            .post(format!("{}/v2/transferprocesses", self.config.management_url))
            .header(MANAGEMENT_API_KEY_HEADER, &self.config.management_api_key)
            .json(&body)
            .send()
            .await
            .map_err(BrokerError::transfer_failed)?
            .error_for_status()
            .map_err(BrokerError::transfer_failed)?;

        let created: CreatedResource = response
            .json()
            .await
            .map_err(BrokerError::transfer_failed)?;
        Ok(created.id)
    }

    async fn poll(&self, transfer_id: &str) -> BrokerResult<TransferStatus> {
        let response = self
            .http
            .get(format!(
                "{}/v2/transferprocesses/{}",
                self.config.management_url, transfer_id
            ))
            .header(MANAGEMENT_API_KEY_HEADER, &self.config.management_api_key)
            .send()
            .await
            .map_err(BrokerError::transfer_failed)?
            .error_for_status()
            .map_err(BrokerError::transfer_failed)?;

        response.json().await.map_err(BrokerError::transfer_failed)
    }
}

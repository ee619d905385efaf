//! # Contract Negotiation Client
//!
//! Drives a contract negotiation against the connector management API to the
//! `FINALIZED` state, yielding the agreement id the transfer stage needs.

use reqwest::Client;
use tracing::{debug, info, instrument};

use broker_shared::config::ConnectorConfig;
use broker_shared::models::{ContractRequest, CreatedResource, NegotiationStatus};
use broker_shared::{BrokerError, BrokerResult};

use super::polling::{PollError, PollingPolicy};

const MANAGEMENT_API_KEY_HEADER: &str = "X-Api-Key";
const STATE_FINALIZED: &str = "FINALIZED";
const STATE_TERMINATED: &str = "TERMINATED";

/// Client for the management API's contract negotiation endpoints
#[derive(Debug, Clone)]
pub struct NegotiationClient {
    http: Client,
    config: ConnectorConfig,
    policy: PollingPolicy,
}

impl NegotiationClient {
    pub fn new(http: Client, config: ConnectorConfig, policy: PollingPolicy) -> Self {
        Self {
            http,
            config,
            policy,
        }
    }

    /// Negotiate a usage contract for `asset_id` with the provider at
    /// `provider_address`, returning the agreement id.
    ///
    /// Submits the negotiation, then polls its state under the bounded
    /// policy. Exhausting the ceiling raises `NegotiationTimeout`; any
    /// transport or protocol error raises `NegotiationFailed` immediately,
    /// retries are the caller's concern.
    #[instrument(skip(self), fields(asset_id = asset_id))]
    pub async fn negotiate(&self, asset_id: &str, provider_address: &str) -> BrokerResult<String> {
        let negotiation_id = self.submit(asset_id, provider_address).await?;
        info!(negotiation_id = %negotiation_id, "Contract negotiation submitted");

        let result = self
            .policy
            .run(|attempt| {
                let negotiation_id = negotiation_id.clone();
                async move {
                    let status = self.poll(&negotiation_id).await?;
                    debug!(
                        negotiation_id = %negotiation_id,
                        attempt,
                        state = %status.state,
                        "Negotiation state polled"
                    );
                    if status.state.eq_ignore_ascii_case(STATE_TERMINATED) {
                        return Err(BrokerError::NegotiationFailed(format!(
                            "Negotiation {negotiation_id} terminated by provider"
                        )));
                    }
                    if status.state.eq_ignore_ascii_case(STATE_FINALIZED) {
                        let agreement_id = status.contract_agreement_id.ok_or_else(|| {
                            BrokerError::invalid_response(
                                "negotiation",
                                "contractAgreementId",
                                "finalized negotiation carries no agreement id",
                            )
                        })?;
                        return Ok(Some(agreement_id));
                    }
                    Ok(None)
                }
            })
            .await;

        match result {
            Ok(agreement_id) => {
                info!(
                    negotiation_id = %negotiation_id,
                    agreement_id = %agreement_id,
                    "Contract negotiation finalized"
                );
                Ok(agreement_id)
            }
            Err(PollError::Exhausted { attempts }) => Err(BrokerError::NegotiationTimeout {
                negotiation_id,
                attempts,
            }),
            Err(PollError::Failed(e)) => Err(match e {
                failed @ BrokerError::NegotiationFailed(_) => failed,
                other => BrokerError::negotiation_failed(other),
            }),
        }
    }

    async fn submit(&self, asset_id: &str, provider_address: &str) -> BrokerResult<String> {
        let body = ContractRequest {
            counter_party_address: provider_address.to_string(),
            counter_party_id: self.config.counterparty_id.clone(),
            asset_id: asset_id.to_string(),
        };

        let response = self
            .http
            .post(format!(
                "{}/v2/contractnegotiations",
                self.config.management_url
            ))
            .header(MANAGEMENT_API_KEY_HEADER, &self.config.management_api_key)
            .json(&body)
            .send()
            .await
            .map_err(BrokerError::negotiation_failed)?
            .error_for_status()
            .map_err(BrokerError::negotiation_failed)?;

        let created: CreatedResource = response
            .json()
            .await
            .map_err(BrokerError::negotiation_failed)?;
        Ok(created.id)
    }

    async fn poll(&self, negotiation_id: &str) -> BrokerResult<NegotiationStatus> {
        let response = self
            .http
            .get(format!(
                "{}/v2/contractnegotiations/{}",
                self.config.management_url, negotiation_id
            ))
            .header(MANAGEMENT_API_KEY_HEADER, &self.config.management_api_key)
            .send()
            .await
            .map_err(BrokerError::negotiation_failed)?
            .error_for_status()
            .map_err(BrokerError::negotiation_failed)?;

        response.json().await.map_err(BrokerError::negotiation_failed)
    }
}

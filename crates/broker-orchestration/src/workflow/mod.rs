//! # Workflow Orchestrator
//!
//! Drives one admitted request end to end: contract negotiation, transfer
//! process, credential wait, and downstream job invocation, persisting each
//! status transition to the registry before the next stage starts.
//!
//! Each request runs as its own detached tokio task. Stage failures are
//! caught at the task boundary and recorded on the request; they never
//! escape the task or reach the original caller, who already holds an
//! asynchronous acknowledgment. The workflow's terminal state is
//! `JobRunning` — only a completion callback advances a request to
//! `Completed`.

use reqwest::Client;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};
use uuid::Uuid;

use broker_shared::models::{DssJobRequest, JobToolRequest, RequestStatus};
use broker_shared::{BrokerConfig, BrokerError, BrokerResult, RequestRegistry};

use crate::clients::{DssJobClient, NegotiationClient, PollingPolicy, TransferClient};
use crate::credentials::CredentialReceiver;

/// Composes the protocol clients into the per-request workflow
#[derive(Debug)]
pub struct Orchestrator {
    registry: Arc<RequestRegistry>,
    config: Arc<BrokerConfig>,
    http: Client,
    negotiation: NegotiationClient,
    transfer: TransferClient,
    dss: DssJobClient,
}

impl Orchestrator {
    pub fn new(registry: Arc<RequestRegistry>, config: Arc<BrokerConfig>) -> Self {
        let http = Client::new();
        let policy = PollingPolicy::from_config(&config.polling);
        let negotiation =
            NegotiationClient::new(http.clone(), config.connector.clone(), policy);
        let transfer = TransferClient::new(http.clone(), config.connector.clone(), policy);
        let dss = DssJobClient::new(http.clone(), config.dss.clone());

        Self {
            registry,
            config,
            http,
            negotiation,
            transfer,
            dss,
        }
    }

    pub fn registry(&self) -> &Arc<RequestRegistry> {
        &self.registry
    }

    /// Detach one background workflow task for an admitted request.
    ///
    /// Supervision contract: a failing workflow terminates only itself, with
    /// the failure captured into the request record.
    pub fn spawn_workflow(self: Arc<Self>, request_id: Uuid, request: JobToolRequest) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.run_workflow(request_id, &request).await {
                error!(
                    request_id = %request_id,
                    stage = e.stage(),
                    error = %e,
                    "Workflow failed"
                );
                self.registry.fail(&request_id, e.to_string());
            }
        })
    }

    /// Run the workflow with the credential subscription held as a scoped
    /// resource: opened before negotiation so early pushes are not missed,
    /// released on every exit path.
    #[instrument(skip(self, request), fields(request_id = %request_id, user_id = %request.user_id))]
    async fn run_workflow(&self, request_id: Uuid, request: &JobToolRequest) -> BrokerResult<()> {
        let mut receiver = CredentialReceiver::from_config(self.http.clone(), &self.config);
        receiver.start();

        let result = self.run_stages(request_id, request, &receiver).await;

        receiver.stop().await;
        result
    }

    async fn run_stages(
        &self,
        request_id: Uuid,
        request: &JobToolRequest,
        receiver: &CredentialReceiver,
    ) -> BrokerResult<()> {
        let asset_id = &self.config.connector.asset_id;
        let provider_address = &self.config.connector.counterparty_protocol_url;

        // Stage 1: contract negotiation
        self.registry.set_status(&request_id, RequestStatus::Negotiating);
        let agreement_id = self.negotiation.negotiate(asset_id, provider_address).await?;
        self.registry.update(&request_id, |record| {
            record.contract_agreement_id = Some(agreement_id.clone());
        });

        // Stage 2: transfer process
        self.registry
            .set_status(&request_id, RequestStatus::TransferInitiating);
        let transfer_id = self
            .transfer
            .initiate_transfer(&agreement_id, asset_id, provider_address)
            .await?;
        self.registry.update(&request_id, |record| {
            record.transfer_process_id = Some(transfer_id.clone());
        });

        // Stage 3: credential wait
        self.registry
            .set_status(&request_id, RequestStatus::AwaitingCredential);
        let credential = receiver
            .get_credential(&transfer_id, self.config.credentials.wait_timeout())
            .await?;
        let access_token = credential.access_token().ok_or_else(|| {
            BrokerError::invalid_response(
                "credential_wait",
                "authKey",
                "credential message carries no access token",
            )
        })?;
        info!(transfer_id = %transfer_id, "Received access token for transfer");

        // Stage 4: downstream job invocation
        self.registry.set_status(&request_id, RequestStatus::Invoking);
        let job = DssJobRequest {
            building_id: request.building_id.clone(),
            optimization_type: request.optimization_type.clone(),
            parameters: serde_json::json!({}),
        };
        let callback_url = request
            .callback_url
            .clone()
            .unwrap_or_else(|| self.config.callback_url(&request.user_id));
        let invocation = self.dss.invoke_job(access_token, &job, &callback_url).await?;

        self.registry.update(&request_id, |record| {
            record.dss_job_id = Some(invocation.job_id.clone());
        });
        self.registry.set_status(&request_id, RequestStatus::JobRunning);

        info!(
            request_id = %request_id,
            job_id = %invocation.job_id,
            via_fallback = invocation.via_fallback,
            "Workflow reached job_running, awaiting completion callback"
        );
        Ok(())
    }
}

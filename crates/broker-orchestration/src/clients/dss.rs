//! # DSS Job Client
//!
//! Invokes the downstream DSS F1 job API. The primary path goes through the
//! provider connector's public API using the negotiated bearer credential;
//! when that fails, a single explicit fallback call hits the DSS API
//! directly with a static key. The fallback is a logged, degraded-mode path
//! for when the mediated channel is unavailable.

use reqwest::Client;
use tracing::{info, instrument, warn};

use broker_shared::config::DssConfig;
use broker_shared::models::{DssJobRequest, DssJobResponse};
use broker_shared::{BrokerError, BrokerResult};

const DIRECT_API_KEY_HEADER: &str = "X-API-Key";

/// Outcome of a job invocation, recording which path produced the id
#[derive(Debug, Clone)]
pub struct JobInvocation {
    pub job_id: String,
    /// True when the mediated path failed and the direct path was used
    pub via_fallback: bool,
}

/// Client for the DSS job API (mediated and direct variants)
#[derive(Debug, Clone)]
pub struct DssJobClient {
    http: Client,
    config: DssConfig,
}

impl DssJobClient {
    pub fn new(http: Client, config: DssConfig) -> Self {
        Self { http, config }
    }

    /// Submit a job, preferring the mediated path.
    ///
    /// Fails with `InvocationFailed` only when both paths fail; the error
    /// carries the fallback's cause, with the mediated failure already
    /// logged at WARN.
    #[instrument(skip(self, access_token, job))]
    pub async fn invoke_job(
        &self,
        access_token: &str,
        job: &DssJobRequest,
        callback_url: &str,
    ) -> BrokerResult<JobInvocation> {
        match self.invoke_mediated(access_token, job, callback_url).await {
            Ok(job_id) => {
                info!(job_id = %job_id, "DSS job created via connector");
                Ok(JobInvocation {
                    job_id,
                    via_fallback: false,
                })
            }
            Err(mediated_err) => {
                warn!(
                    error = %mediated_err,
                    "Mediated DSS call failed, falling back to direct API (degraded mode)"
                );
                let job_id = self
                    .invoke_direct(job, callback_url)
                    .await
                    .map_err(|direct_err| {
                        BrokerError::InvocationFailed(format!(
                            "mediated: {mediated_err}; direct: {direct_err}"
                        ))
                    })?;
                info!(job_id = %job_id, "DSS job created via direct API (degraded mode)");
                Ok(JobInvocation {
                    job_id,
                    via_fallback: true,
                })
            }
        }
    }

    async fn invoke_mediated(
        &self,
        access_token: &str,
        job: &DssJobRequest,
        callback_url: &str,
    ) -> BrokerResult<String> {
        let response = self
            .http
            .post(format!("{}/api/f1/jobs", self.config.public_api_url))
            .bearer_auth(access_token)
            .query(&[("callback_url", callback_url)])
            .json(job)
            .send()
            .await?
            .error_for_status()?;

        let body: DssJobResponse = response.json().await?;
        Ok(body.job_id)
    }

    async fn invoke_direct(&self, job: &DssJobRequest, callback_url: &str) -> BrokerResult<String> {
        let response = self
            .http
            .post(format!("{}/f1/jobs", self.config.direct_api_url))
            .header(DIRECT_API_KEY_HEADER, &self.config.direct_api_key)
            .query(&[("callback_url", callback_url)])
            .json(job)
            .send()
            .await?
            .error_for_status()?;

        let body: DssJobResponse = response.json().await?;
        Ok(body.job_id)
    }
}

//! Wire payloads for the broker's inbound API and its upstream collaborators.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

fn default_building_id() -> String {
    "building_001".to_string()
}

fn default_optimization_type() -> String {
    "energy_efficiency".to_string()
}

/// Inbound body for `POST /f1/request-tool`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobToolRequest {
    #[serde(default = "default_building_id")]
    pub building_id: String,
    #[serde(default = "default_optimization_type")]
    pub optimization_type: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

/// Synchronous acknowledgment for `POST /f1/request-tool`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobToolResponse {
    pub request_id: Uuid,
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dss_job_id: Option<String>,
}

/// Inbound body for the completion webhook
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobCallback {
    pub job_id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// Body submitted to the DSS job API (mediated and direct paths)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DssJobRequest {
    pub building_id: String,
    pub optimization_type: String,
    #[serde(default)]
    pub parameters: Value,
}

/// Response from the DSS job API; extra fields are ignored
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DssJobResponse {
    pub job_id: String,
}

/// Contract negotiation submission to the management API
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractRequest {
    pub counter_party_address: String,
    pub counter_party_id: String,
    pub asset_id: String,
}

/// Transfer process submission to the management API
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub contract_id: String,
    pub asset_id: String,
    pub counter_party_address: String,
    pub transfer_type: String,
}

/// Identifier envelope returned when a management resource is created
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreatedResource {
    #[serde(rename = "@id")]
    pub id: String,
}

/// Poll response for a contract negotiation
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiationStatus {
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_agreement_id: Option<String>,
}

/// Poll response for a transfer process
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransferStatus {
    pub state: String,
}

/// One credential message as received from the event channel.
///
/// The payload is kept verbatim; the correlation key and the token are
/// extracted on demand so unknown fields survive round-trips.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CredentialEntry {
    pub payload: Value,
}

impl CredentialEntry {
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }

    /// Correlation key, when the message carries one
    pub fn transfer_process_id(&self) -> Option<&str> {
        self.payload.get("transfer_process_id").and_then(Value::as_str)
    }

    /// The bearer token, under either of its alternate field names
    pub fn access_token(&self) -> Option<&str> {
        self.payload
            .get("authKey")
            .or_else(|| self.payload.get("token"))
            .and_then(Value::as_str)
    }
}

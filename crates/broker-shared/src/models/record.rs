//! Request record — the registry's unit of state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::status::RequestStatus;

/// One admitted tool request and its workflow progress.
///
/// Records are created on admission and retained for the process lifetime.
/// Mutations happen only through `RequestRegistry::update`, which holds the
/// record exclusively for the duration of each change.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RequestRecord {
    pub request_id: Uuid,
    pub user_id: String,
    pub building_id: String,
    pub optimization_type: String,
    pub status: RequestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_agreement_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_process_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dss_job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl RequestRecord {
    /// Create a freshly admitted record in `Initiated` state
    pub fn new(
        user_id: impl Into<String>,
        building_id: impl Into<String>,
        optimization_type: impl Into<String>,
    ) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            user_id: user_id.into(),
            building_id: building_id.into(),
            optimization_type: optimization_type.into(),
            status: RequestStatus::Initiated,
            contract_agreement_id: None,
            transfer_process_id: None,
            dss_job_id: None,
            result: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Apply a status change, enforcing the monotonic state machine.
    ///
    /// Returns `true` when the transition was applied. Disallowed moves
    /// (backward, or out of a terminal state) leave the record untouched.
    pub fn transition_to(&mut self, next: RequestStatus) -> bool {
        if self.status.can_transition_to(next) {
            self.status = next;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_starts_initiated() {
        let record = RequestRecord::new("u1", "building_001", "energy_efficiency");
        assert_eq!(record.status, RequestStatus::Initiated);
        assert!(record.contract_agreement_id.is_none());
        assert!(record.dss_job_id.is_none());
        assert!(record.completed_at.is_none());
    }

    #[test]
    fn test_distinct_request_ids() {
        let a = RequestRecord::new("u1", "b", "t");
        let b = RequestRecord::new("u1", "b", "t");
        assert_ne!(a.request_id, b.request_id);
    }

    #[test]
    fn test_transition_forward_applies() {
        let mut record = RequestRecord::new("u1", "b", "t");
        assert!(record.transition_to(RequestStatus::Negotiating));
        assert_eq!(record.status, RequestStatus::Negotiating);
    }

    #[test]
    fn test_transition_backward_rejected() {
        let mut record = RequestRecord::new("u1", "b", "t");
        record.status = RequestStatus::Invoking;
        assert!(!record.transition_to(RequestStatus::Negotiating));
        assert_eq!(record.status, RequestStatus::Invoking);
    }

    #[test]
    fn test_completed_never_regresses() {
        let mut record = RequestRecord::new("u1", "b", "t");
        record.status = RequestStatus::Completed;
        assert!(!record.transition_to(RequestStatus::Failed));
        assert_eq!(record.status, RequestStatus::Completed);
    }

    #[test]
    fn test_serialization_omits_empty_fields() {
        let record = RequestRecord::new("u1", "b", "t");
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("error").is_none());
        assert!(json.get("dss_job_id").is_none());
        assert_eq!(json["status"], "initiated");
    }
}

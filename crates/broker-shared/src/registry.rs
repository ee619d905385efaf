//! # Request Registry
//!
//! Process-lifetime store of request records and the single owner of their
//! mutations. Workflow tasks and the callback path both write here; each
//! record is held exclusively for the duration of one `update` call, so
//! concurrent writers to the same record serialize and never lose fields.
//!
//! Records are never deleted. Listing preserves creation order.

use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{RequestRecord, RequestStatus};

/// Concurrent, insertion-ordered store of request records
#[derive(Debug, Default)]
pub struct RequestRegistry {
    records: DashMap<Uuid, RequestRecord>,
    /// Creation order for `list`; the map itself is unordered
    order: Mutex<Vec<Uuid>>,
}

impl RequestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a new request and return its generated id
    pub fn create(
        &self,
        user_id: impl Into<String>,
        building_id: impl Into<String>,
        optimization_type: impl Into<String>,
    ) -> Uuid {
        let record = RequestRecord::new(user_id, building_id, optimization_type);
        let request_id = record.request_id;

        self.records.insert(request_id, record);
        self.order
            .lock()
            .expect("request order lock poisoned")
            .push(request_id);

        debug!(request_id = %request_id, "Admitted request");
        request_id
    }

    /// Fetch a snapshot of one record
    pub fn get(&self, request_id: &Uuid) -> Option<RequestRecord> {
        self.records.get(request_id).map(|r| r.clone())
    }

    /// Snapshot all records in creation order
    pub fn list(&self) -> Vec<RequestRecord> {
        let order = self.order.lock().expect("request order lock poisoned");
        order
            .iter()
            .filter_map(|id| self.records.get(id).map(|r| r.clone()))
            .collect()
    }

    /// Apply a mutation to one record, atomically with respect to other
    /// updates on the same record.
    ///
    /// Returns `false` when the record does not exist. The mutator runs under
    /// the record's exclusive lock; keep it short and non-blocking.
    pub fn update<F>(&self, request_id: &Uuid, mutator: F) -> bool
    where
        F: FnOnce(&mut RequestRecord),
    {
        match self.records.get_mut(request_id) {
            Some(mut record) => {
                mutator(&mut record);
                true
            }
            None => {
                warn!(request_id = %request_id, "Update for unknown request ignored");
                false
            }
        }
    }

    /// Advance a record's status, enforcing the monotonic state machine.
    ///
    /// Disallowed transitions (backward, or out of a terminal state) are
    /// logged and ignored; this is what keeps a late workflow write from
    /// regressing a record the callback path already completed.
    pub fn set_status(&self, request_id: &Uuid, status: RequestStatus) -> bool {
        let mut applied = false;
        self.update(request_id, |record| {
            applied = record.transition_to(status);
            if !applied {
                warn!(
                    request_id = %record.request_id,
                    current = %record.status,
                    rejected = %status,
                    "Ignoring non-monotonic status transition"
                );
            }
        });
        applied
    }

    /// Mark a record failed with the captured error message
    pub fn fail(&self, request_id: &Uuid, error: impl Into<String>) {
        let error = error.into();
        self.update(request_id, |record| {
            if record.transition_to(RequestStatus::Failed) {
                record.error = Some(error.clone());
            }
        });
    }

    /// Correlate a completion notification to its pending request.
    ///
    /// Scans records for the first `(user_id, dss_job_id)` match, marks it
    /// completed with the result and a completion timestamp, and returns its
    /// id. A repeat notification for an already-completed record matches
    /// without re-stamping `completed_at`. No match returns `None`.
    pub fn complete_job(&self, user_id: &str, job_id: &str, result: Option<Value>) -> Option<Uuid> {
        let order = {
            let guard = self.order.lock().expect("request order lock poisoned");
            guard.clone()
        };

        for request_id in order {
            let mut matched = false;
            self.update(&request_id, |record| {
                if record.user_id != user_id || record.dss_job_id.as_deref() != Some(job_id) {
                    return;
                }
                matched = true;
                if record.status == RequestStatus::Completed {
                    debug!(
                        request_id = %record.request_id,
                        job_id = job_id,
                        "Duplicate completion notification for completed request"
                    );
                    return;
                }
                if record.transition_to(RequestStatus::Completed) {
                    record.result = result.clone();
                    record.completed_at = Some(Utc::now());
                    info!(
                        request_id = %record.request_id,
                        job_id = job_id,
                        "Request completed via job callback"
                    );
                }
            });
            if matched {
                return Some(request_id);
            }
        }

        None
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

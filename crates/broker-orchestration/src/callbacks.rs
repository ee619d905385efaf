//! # Callback Correlation
//!
//! Matches inbound job-completion notifications to their pending request
//! and finalizes its record. Notifications arrive at-least-once; the
//! registry's completion path keeps repeats idempotent, and unmatched
//! notifications (stale, duplicate, or unknown job) are logged and dropped.

use std::sync::Arc;
use tracing::{info, warn};

use broker_shared::models::JobCallback;
use broker_shared::RequestRegistry;

/// Correlates completion notifications to registry records
#[derive(Debug, Clone)]
pub struct CallbackCorrelator {
    registry: Arc<RequestRegistry>,
}

impl CallbackCorrelator {
    pub fn new(registry: Arc<RequestRegistry>) -> Self {
        Self { registry }
    }

    /// Handle one completion notification scoped to `user_id`.
    ///
    /// Returns whether a pending request was matched. No match is not an
    /// error; the acknowledgment to the job system is the same either way.
    pub fn handle_completion(&self, user_id: &str, callback: &JobCallback) -> bool {
        match self
            .registry
            .complete_job(user_id, &callback.job_id, callback.result.clone())
        {
            Some(request_id) => {
                info!(
                    request_id = %request_id,
                    user_id = user_id,
                    job_id = %callback.job_id,
                    callback_status = %callback.status,
                    "Completion callback correlated"
                );
                true
            }
            None => {
                warn!(
                    user_id = user_id,
                    job_id = %callback.job_id,
                    "Completion callback matched no pending request"
                );
                false
            }
        }
    }
}

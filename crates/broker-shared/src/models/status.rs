//! Request status state machine.

use serde::{Deserialize, Serialize};

/// Caller-visible workflow state of a request.
///
/// Statuses are ordered along the workflow: each stage is strictly after its
/// predecessor, `Completed` and `Failed` are terminal, and `Failed` is
/// reachable from any non-terminal state. `Completed` is only ever set by
/// callback correlation; the workflow itself tops out at `JobRunning`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Initiated,
    Negotiating,
    TransferInitiating,
    AwaitingCredential,
    Invoking,
    JobRunning,
    Completed,
    Failed,
}

impl RequestStatus {
    /// Position of this status along the workflow order.
    ///
    /// `Failed` ranks above everything so a failed record never moves again.
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            RequestStatus::Initiated => 0,
            RequestStatus::Negotiating => 1,
            RequestStatus::TransferInitiating => 2,
            RequestStatus::AwaitingCredential => 3,
            RequestStatus::Invoking => 4,
            RequestStatus::JobRunning => 5,
            RequestStatus::Completed => 6,
            RequestStatus::Failed => 7,
        }
    }

    /// Whether no further transitions are allowed from this status
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Failed)
    }

    /// Whether a transition from `self` to `next` is allowed.
    ///
    /// Forward moves along the workflow order are allowed, as is `Failed`
    /// from any non-terminal state. Terminal states accept nothing.
    #[must_use]
    pub fn can_transition_to(self, next: RequestStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == RequestStatus::Failed {
            return true;
        }
        next.rank() > self.rank()
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RequestStatus::Initiated => "initiated",
            RequestStatus::Negotiating => "negotiating",
            RequestStatus::TransferInitiating => "transfer_initiating",
            RequestStatus::AwaitingCredential => "awaiting_credential",
            RequestStatus::Invoking => "invoking",
            RequestStatus::JobRunning => "job_running",
            RequestStatus::Completed => "completed",
            RequestStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

//! # Upstream Protocol Clients
//!
//! The three outbound clients of the workflow (contract negotiation,
//! transfer process, DSS job invocation) plus the bounded polling policy
//! the first two share.

pub mod dss;
pub mod negotiation;
pub mod polling;
pub mod transfer;

pub use dss::{DssJobClient, JobInvocation};
pub use negotiation::NegotiationClient;
pub use polling::{PollError, PollingPolicy};
pub use transfer::TransferClient;

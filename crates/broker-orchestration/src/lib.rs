//! # broker-orchestration
//!
//! The dataspace job broker's orchestration core: protocol clients for
//! contract negotiation and transfer processes, credential receivers, the
//! downstream DSS job invoker, the per-request workflow orchestrator,
//! callback correlation, and the axum web API.

pub mod callbacks;
pub mod clients;
pub mod credentials;
pub mod web;
pub mod workflow;

pub use callbacks::CallbackCorrelator;
pub use clients::{DssJobClient, JobInvocation, NegotiationClient, PollingPolicy, TransferClient};
pub use credentials::CredentialReceiver;
pub use web::{router, AppState};
pub use workflow::Orchestrator;

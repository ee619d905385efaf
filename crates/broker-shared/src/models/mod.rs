//! # Data Model
//!
//! Request records, the workflow status state machine, and the wire payloads
//! exchanged with the broker's API clients and upstream collaborators.

pub mod messages;
pub mod record;
pub mod status;

pub use messages::{
    ContractRequest, CreatedResource, CredentialEntry, DssJobRequest, DssJobResponse, JobCallback,
    JobToolRequest, JobToolResponse, NegotiationStatus, TransferRequest, TransferStatus,
};
pub use record::RequestRecord;
pub use status::RequestStatus;

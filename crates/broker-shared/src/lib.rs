//! # broker-shared
//!
//! Shared foundation for the dataspace job broker: configuration, error
//! taxonomy, logging bootstrap, the request data model, and the concurrent
//! request registry that the orchestration crate builds on.

pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod registry;

pub use config::BrokerConfig;
pub use errors::{BrokerError, BrokerResult};
pub use registry::RequestRegistry;

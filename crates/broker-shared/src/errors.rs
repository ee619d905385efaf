//! # Broker Error Types
//!
//! Unified error handling for the dataspace job broker. Stage-level errors
//! (negotiation, transfer, credential wait, invocation) are captured by the
//! workflow and recorded on the request; only query-path errors surface to
//! HTTP callers.

use thiserror::Error;

/// Broker operation result type
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Comprehensive error types for broker operations
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Contract negotiation timed out: {negotiation_id} not finalized after {attempts} polls")]
    NegotiationTimeout {
        negotiation_id: String,
        attempts: u32,
    },

    #[error("Contract negotiation failed: {0}")]
    NegotiationFailed(String),

    #[error("Transfer process timed out: {transfer_id} not started after {attempts} polls")]
    TransferTimeout { transfer_id: String, attempts: u32 },

    #[error("Transfer process failed: {0}")]
    TransferFailed(String),

    #[error("Credentials not received for transfer {transfer_id} within {timeout_seconds}s")]
    CredentialTimeout {
        transfer_id: String,
        timeout_seconds: u64,
    },

    #[error("Job invocation failed on both mediated and direct paths: {0}")]
    InvocationFailed(String),

    #[error("Request not found: {request_id}")]
    RequestNotFound { request_id: String },

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization failed: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid response in {stage}: {field} - {reason}")]
    InvalidResponse {
        stage: &'static str,
        field: String,
        reason: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BrokerError {
    /// Create a negotiation failure from any displayable cause
    pub fn negotiation_failed(cause: impl std::fmt::Display) -> Self {
        Self::NegotiationFailed(cause.to_string())
    }

    /// Create a transfer failure from any displayable cause
    pub fn transfer_failed(cause: impl std::fmt::Display) -> Self {
        Self::TransferFailed(cause.to_string())
    }

    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Create an invalid response error for protocol violations
    ///
    /// Use this when an upstream response is missing required fields or
    /// contains malformed data that should not be silently defaulted. The
    /// stage label attributes the failure to the workflow stage whose
    /// upstream produced the response.
    pub fn invalid_response(
        stage: &'static str,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidResponse {
            stage,
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Check whether this error is one of the per-stage timeouts
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            BrokerError::NegotiationTimeout { .. }
                | BrokerError::TransferTimeout { .. }
                | BrokerError::CredentialTimeout { .. }
        )
    }

    /// The workflow stage this error belongs to, for logging
    #[must_use]
    pub fn stage(&self) -> &'static str {
        match self {
            BrokerError::NegotiationTimeout { .. } | BrokerError::NegotiationFailed(_) => {
                "negotiation"
            }
            BrokerError::TransferTimeout { .. } | BrokerError::TransferFailed(_) => "transfer",
            BrokerError::CredentialTimeout { .. } => "credential_wait",
            BrokerError::InvocationFailed(_) => "invocation",
            BrokerError::RequestNotFound { .. } => "query",
            BrokerError::InvalidResponse { stage, .. } => stage,
            _ => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negotiation_timeout_display() {
        let err = BrokerError::NegotiationTimeout {
            negotiation_id: "neg-1".to_string(),
            attempts: 10,
        };
        assert_eq!(
            format!("{err}"),
            "Contract negotiation timed out: neg-1 not finalized after 10 polls"
        );
    }

    #[test]
    fn test_transfer_timeout_display() {
        let err = BrokerError::TransferTimeout {
            transfer_id: "tr-1".to_string(),
            attempts: 10,
        };
        assert_eq!(
            format!("{err}"),
            "Transfer process timed out: tr-1 not started after 10 polls"
        );
    }

    #[test]
    fn test_credential_timeout_display() {
        let err = BrokerError::CredentialTimeout {
            transfer_id: "tr-9".to_string(),
            timeout_seconds: 60,
        };
        assert_eq!(
            format!("{err}"),
            "Credentials not received for transfer tr-9 within 60s"
        );
    }

    #[test]
    fn test_request_not_found_display() {
        let err = BrokerError::RequestNotFound {
            request_id: "abc".to_string(),
        };
        assert_eq!(format!("{err}"), "Request not found: abc");
    }

    #[test]
    fn test_invalid_response_constructor() {
        let err = BrokerError::invalid_response("invocation", "job_id", "missing field");
        match err {
            BrokerError::InvalidResponse {
                stage,
                field,
                reason,
            } => {
                assert_eq!(stage, "invocation");
                assert_eq!(field, "job_id");
                assert_eq!(reason, "missing field");
            }
            _ => panic!("Expected InvalidResponse variant"),
        }
    }

    #[test]
    fn test_timeouts_are_timeouts() {
        assert!(BrokerError::NegotiationTimeout {
            negotiation_id: "n".to_string(),
            attempts: 1
        }
        .is_timeout());
        assert!(BrokerError::TransferTimeout {
            transfer_id: "t".to_string(),
            attempts: 1
        }
        .is_timeout());
        assert!(BrokerError::CredentialTimeout {
            transfer_id: "t".to_string(),
            timeout_seconds: 5
        }
        .is_timeout());
    }

    #[test]
    fn test_failures_are_not_timeouts() {
        assert!(!BrokerError::NegotiationFailed("boom".to_string()).is_timeout());
        assert!(!BrokerError::InvocationFailed("boom".to_string()).is_timeout());
        assert!(!BrokerError::Internal("boom".to_string()).is_timeout());
    }

    #[test]
    fn test_stage_mapping() {
        assert_eq!(
            BrokerError::NegotiationFailed("x".to_string()).stage(),
            "negotiation"
        );
        assert_eq!(
            BrokerError::TransferFailed("x".to_string()).stage(),
            "transfer"
        );
        assert_eq!(
            BrokerError::CredentialTimeout {
                transfer_id: "t".to_string(),
                timeout_seconds: 1
            }
            .stage(),
            "credential_wait"
        );
        assert_eq!(
            BrokerError::InvocationFailed("x".to_string()).stage(),
            "invocation"
        );
        assert_eq!(
            BrokerError::RequestNotFound {
                request_id: "r".to_string()
            }
            .stage(),
            "query"
        );
    }

    #[test]
    fn test_invalid_response_keeps_its_stage() {
        let missing_agreement = BrokerError::invalid_response(
            "negotiation",
            "contractAgreementId",
            "finalized negotiation carries no agreement id",
        );
        assert_eq!(missing_agreement.stage(), "negotiation");

        let missing_token = BrokerError::invalid_response(
            "credential_wait",
            "authKey",
            "credential message carries no access token",
        );
        assert_eq!(missing_token.stage(), "credential_wait");
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: BrokerError = json_err.into();
        assert!(matches!(err, BrokerError::SerializationError(_)));
    }

    #[test]
    fn test_config_error_constructor() {
        let err = BrokerError::config_error("missing base url");
        assert_eq!(format!("{err}"), "Configuration error: missing base url");
    }
}

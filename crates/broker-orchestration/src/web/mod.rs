//! # Web API
//!
//! The broker's inbound HTTP surface: job-initiation, status queries, the
//! completion webhook, and a health probe. The initiation handler responds
//! synchronously with an acknowledgment and hands the actual workflow to a
//! detached background task; query-path errors are the only ones surfaced
//! over HTTP.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use broker_shared::models::{JobCallback, JobToolRequest, JobToolResponse, RequestRecord};
use broker_shared::{BrokerConfig, BrokerError, RequestRegistry};

use crate::callbacks::CallbackCorrelator;
use crate::workflow::Orchestrator;

/// Shared state behind every handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub registry: Arc<RequestRegistry>,
    pub orchestrator: Arc<Orchestrator>,
    pub correlator: CallbackCorrelator,
    pub service_name: String,
}

impl AppState {
    /// Wire the registry, orchestrator, and correlator from configuration
    pub fn from_config(config: Arc<BrokerConfig>) -> Self {
        let registry = Arc::new(RequestRegistry::new());
        let orchestrator = Arc::new(Orchestrator::new(Arc::clone(&registry), Arc::clone(&config)));
        let correlator = CallbackCorrelator::new(Arc::clone(&registry));
        Self {
            registry,
            orchestrator,
            correlator,
            service_name: config.server.service_name.clone(),
        }
    }
}

/// Build the broker's router over the given state
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/f1/request-tool", post(request_tool))
        .route("/f1/requests", get(list_requests))
        .route("/f1/requests/{request_id}", get(get_request))
        .route("/webhooks/dss-callback/{user_id}", post(dss_callback))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Query-path error envelope; workflow errors never reach HTTP
#[derive(Debug)]
struct ApiError(BrokerError);

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            BrokerError::RequestNotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            detail: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize)]
struct RequestList {
    requests: Vec<RequestRecord>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: String,
}

#[derive(Debug, Serialize)]
struct CallbackAck {
    status: &'static str,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: state.service_name.clone(),
    })
}

/// Admit a tool request and detach its workflow; the ack returns immediately
async fn request_tool(
    State(state): State<AppState>,
    Json(request): Json<JobToolRequest>,
) -> Json<JobToolResponse> {
    let request_id = state.registry.create(
        request.user_id.as_str(),
        request.building_id.as_str(),
        request.optimization_type.as_str(),
    );

    let message = format!(
        "DSS F1 energy optimization request initiated for building {} ({})",
        request.building_id, request.optimization_type
    );

    info!(request_id = %request_id, user_id = %request.user_id, "Initiated DSS F1 tool request");

    Arc::clone(&state.orchestrator).spawn_workflow(request_id, request);

    Json(JobToolResponse {
        request_id,
        status: "initiated".to_string(),
        message,
        dss_job_id: None,
    })
}

async fn get_request(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Result<Json<RequestRecord>, ApiError> {
    let not_found = || {
        ApiError(BrokerError::RequestNotFound {
            request_id: request_id.clone(),
        })
    };
    let id: Uuid = request_id.parse().map_err(|_| not_found())?;
    let record = state.registry.get(&id).ok_or_else(not_found)?;
    Ok(Json(record))
}

async fn list_requests(State(state): State<AppState>) -> Json<RequestList> {
    Json(RequestList {
        requests: state.registry.list(),
    })
}

/// Completion webhook; acknowledges identically whether or not a request matched
async fn dss_callback(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(callback): Json<JobCallback>,
) -> Json<CallbackAck> {
    state.correlator.handle_completion(&user_id, &callback);
    Json(CallbackAck {
        status: "callback_received",
    })
}

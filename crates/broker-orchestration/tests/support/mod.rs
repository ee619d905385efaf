#![allow(dead_code)] // each test binary uses a different subset

//! Shared test support: in-process mock upstreams for the broker's
//! collaborators (connector management API, SSE credential channel, and the
//! DSS job API in both mediated and direct variants), plus a helper that
//! wires a `BrokerConfig` against them.

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use broker_shared::config::{BrokerConfig, CredentialMode};

/// Bind a router on an ephemeral port and serve it in the background
pub async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server");
    let addr = listener.local_addr().expect("mock server local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("mock server");
    });
    addr
}

/// Observable state of the mock connector management API
#[derive(Debug)]
pub struct ManagementState {
    /// Polls until the negotiation reports FINALIZED (1 = first poll)
    pub finalize_after_polls: u32,
    /// Polls until the transfer reports STARTED
    pub start_after_polls: u32,
    pub negotiation_polls: AtomicU32,
    pub transfer_polls: AtomicU32,
}

impl ManagementState {
    pub fn immediate() -> Arc<Self> {
        Arc::new(Self {
            finalize_after_polls: 1,
            start_after_polls: 1,
            negotiation_polls: AtomicU32::new(0),
            transfer_polls: AtomicU32::new(0),
        })
    }

    pub fn slow(finalize_after_polls: u32, start_after_polls: u32) -> Arc<Self> {
        Arc::new(Self {
            finalize_after_polls,
            start_after_polls,
            negotiation_polls: AtomicU32::new(0),
            transfer_polls: AtomicU32::new(0),
        })
    }
}

/// Mock EDC-style management API: create/poll negotiations and transfers
pub fn management_router(state: Arc<ManagementState>) -> Router {
    async fn create_negotiation() -> Json<Value> {
        Json(json!({"@id": "neg-1"}))
    }

    async fn poll_negotiation(
        State(state): State<Arc<ManagementState>>,
        Path(_id): Path<String>,
    ) -> Json<Value> {
        let polls = state.negotiation_polls.fetch_add(1, Ordering::SeqCst) + 1;
        if polls >= state.finalize_after_polls {
            Json(json!({"state": "FINALIZED", "contractAgreementId": "agr-1"}))
        } else {
            Json(json!({"state": "REQUESTED"}))
        }
    }

    async fn create_transfer() -> Json<Value> {
        Json(json!({"@id": "tr-1"}))
    }

    async fn poll_transfer(
        State(state): State<Arc<ManagementState>>,
        Path(_id): Path<String>,
    ) -> Json<Value> {
        let polls = state.transfer_polls.fetch_add(1, Ordering::SeqCst) + 1;
        if polls >= state.start_after_polls {
            Json(json!({"state": "STARTED"}))
        } else {
            Json(json!({"state": "REQUESTED"}))
        }
    }

    Router::new()
        .route("/v2/contractnegotiations", post(create_negotiation))
        .route("/v2/contractnegotiations/{id}", get(poll_negotiation))
        .route("/v2/transferprocesses", post(create_transfer))
        .route("/v2/transferprocesses/{id}", get(poll_transfer))
        .with_state(state)
}

/// Mock SSE credential channel emitting one `data:` message after a delay
pub fn sse_router(message: Value, delay: Duration) -> Router {
    async fn stream(
        State((message, delay)): State<(Value, Duration)>,
        Path(_host): Path<String>,
    ) -> Response {
        let line = format!("data: {message}\n\n");
        let body_stream = futures::stream::once(async move {
            tokio::time::sleep(delay).await;
            Ok::<_, std::convert::Infallible>(line.into_bytes())
        })
        .chain(futures::stream::pending());
        (
            [("content-type", "text/event-stream")],
            Body::from_stream(body_stream),
        )
            .into_response()
    }

    Router::new()
        .route("/pull/stream/provider/{host}", get(stream))
        .with_state((message, delay))
}

/// Observable state of the mock DSS job API
#[derive(Debug, Default)]
pub struct DssState {
    /// When set, the mediated endpoint answers 500
    pub mediated_fails: AtomicBool,
    /// When set, the direct endpoint answers 500
    pub direct_fails: AtomicBool,
    pub mediated_calls: AtomicU32,
    pub direct_calls: AtomicU32,
    /// Last bearer token seen on the mediated path
    pub seen_bearer: Mutex<Option<String>>,
    /// Last callback_url query parameter seen on either path
    pub seen_callback_url: Mutex<Option<String>>,
}

/// Mock DSS API serving both the mediated and the direct job endpoints
pub fn dss_router(state: Arc<DssState>) -> Router {
    async fn mediated(
        State(state): State<Arc<DssState>>,
        Query(params): Query<HashMap<String, String>>,
        headers: HeaderMap,
        Json(_job): Json<Value>,
    ) -> Response {
        state.mediated_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
            *state.seen_bearer.lock().unwrap() = Some(auth.to_string());
        }
        if let Some(cb) = params.get("callback_url") {
            *state.seen_callback_url.lock().unwrap() = Some(cb.clone());
        }
        if state.mediated_fails.load(Ordering::SeqCst) {
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        Json(json!({"job_id": "job-mediated-1", "status": "pending"})).into_response()
    }

    async fn direct(
        State(state): State<Arc<DssState>>,
        Query(params): Query<HashMap<String, String>>,
        Json(_job): Json<Value>,
    ) -> Response {
        state.direct_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(cb) = params.get("callback_url") {
            *state.seen_callback_url.lock().unwrap() = Some(cb.clone());
        }
        if state.direct_fails.load(Ordering::SeqCst) {
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        Json(json!({"job_id": "job-direct-1", "status": "pending"})).into_response()
    }

    Router::new()
        .route("/api/f1/jobs", post(mediated))
        .route("/f1/jobs", post(direct))
        .with_state(state)
}

/// A full mocked dataspace: management, SSE, and DSS upstreams plus a
/// `BrokerConfig` pointing at them.
#[derive(Debug)]
pub struct MockDataspace {
    pub config: BrokerConfig,
    pub management: Arc<ManagementState>,
    pub dss: Arc<DssState>,
}

impl MockDataspace {
    /// Spin up all upstreams with the given credential message and knobs
    pub async fn start(
        management: Arc<ManagementState>,
        credential_message: Value,
        credential_delay: Duration,
    ) -> Self {
        let dss = Arc::new(DssState::default());

        let management_addr = serve(management_router(Arc::clone(&management))).await;
        let sse_addr = serve(sse_router(credential_message, credential_delay)).await;
        let dss_addr = serve(dss_router(Arc::clone(&dss))).await;

        let mut config = BrokerConfig::default();
        config.connector.management_url = format!("http://{management_addr}");
        config.consumer_backend.base_url = format!("http://{sse_addr}");
        config.dss.public_api_url = format!("http://{dss_addr}");
        config.dss.direct_api_url = format!("http://{dss_addr}");
        config.polling.interval_seconds = 1;
        config.polling.max_attempts = 3;
        config.credentials.mode = CredentialMode::Streaming;
        config.credentials.wait_timeout_seconds = 10;

        Self {
            config,
            management,
            dss,
        }
    }
}

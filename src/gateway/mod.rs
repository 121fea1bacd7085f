//! HTTP gateway (Axum) over the matching engine.
//!
//! Routes mirror the mobile client's API: fingerprinting, pending replay and
//! match queries, plus report registration and a pairwise compare endpoint.

pub mod error;
pub mod handler;
pub mod payload;
pub mod state;


use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

pub use error::GatewayError;
pub use handler::{
    compare_handler, generate_embedding_handler, matches_for_lost_handler,
    process_pending_handler, register_item_handler, user_matches_handler,
};
pub use state::HandlerState;

pub const REUNITE_STATUS_HEADER: &str = "X-Reunite-Status";
pub const REUNITE_STATUS_HEALTHY: &str = "healthy";
pub const REUNITE_STATUS_READY: &str = "ready";
pub const REUNITE_STATUS_NOT_READY: &str = "not_ready";
pub const REUNITE_STATUS_OK: &str = "ok";
pub const REUNITE_STATUS_MATCHED: &str = "matched";

pub fn create_router_with_state(state: HandlerState) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/generate-embedding", post(generate_embedding_handler))
        .route("/process-pending-objects", post(process_pending_handler))
        .route("/matches/{lost_id}", get(matches_for_lost_handler))
        .route("/user_matches", get(user_matches_handler))
        .route("/items", post(register_item_handler))
        .route("/compare", post(compare_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(serde::Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(serde::Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub components: ComponentStatus,
}

#[derive(serde::Serialize)]
pub struct ComponentStatus {
    pub http: &'static str,
    pub engine: &'static str,
    pub storage_mode: &'static str,
    pub embedder_mode: &'static str,
}

#[tracing::instrument]
pub async fn health_handler() -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        REUNITE_STATUS_HEADER,
        HeaderValue::from_static(REUNITE_STATUS_HEALTHY),
    );

    (
        StatusCode::OK,
        headers,
        Json(HealthResponse { status: "ok" }),
    )
        .into_response()
}

#[tracing::instrument(skip(state))]
pub async fn ready_handler(State(state): State<HandlerState>) -> Response {
    let is_ready = !state.engine.is_closed();

    let components = ComponentStatus {
        http: REUNITE_STATUS_READY,
        engine: if is_ready {
            REUNITE_STATUS_READY
        } else {
            REUNITE_STATUS_NOT_READY
        },
        storage_mode: state.storage_mode,
        embedder_mode: state.embedder_mode,
    };

    let (status_code, status_msg) = if is_ready {
        (StatusCode::OK, REUNITE_STATUS_READY)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, REUNITE_STATUS_NOT_READY)
    };

    let mut headers = HeaderMap::new();
    headers.insert(REUNITE_STATUS_HEADER, HeaderValue::from_static(status_msg));

    (
        status_code,
        headers,
        Json(ReadyResponse {
            status: status_msg,
            components,
        }),
    )
        .into_response()
}

/// Client side of `/healthz`, used by the binary's `--health-check` flag.
///
/// `true` only for a 2xx answer within `timeout`.
pub async fn check_health(port: u16, timeout: std::time::Duration) -> bool {
    let url = format!("http://127.0.0.1:{}/healthz", port);

    let Ok(client) = reqwest::Client::builder().timeout(timeout).build() else {
        return false;
    };

    match client.get(&url).send().await {
        Ok(res) => res.status().is_success(),
        Err(e) => {
            tracing::debug!(error = %e, %url, "Health check failed");
            false
        }
    }
}

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use super::REUNITE_STATUS_HEADER;
use crate::engine::EngineError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Engine(#[from] EngineError),

    /// A submission failed and was stored in the pending queue.
    #[error("{0}; stored in pending queue")]
    Parked(EngineError),
}

impl GatewayError {
    /// Wraps a failed submission; only a successfully queued one is reported as parked.
    pub fn from_submission(err: EngineError) -> Self {
        if err.is_parked() {
            GatewayError::Parked(err)
        } else {
            GatewayError::Engine(err)
        }
    }
}

#[derive(serde::Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

fn classify(err: &EngineError) -> (StatusCode, &'static str) {
    match err {
        EngineError::Unparked { cause, .. } => classify(cause),
        EngineError::Validation { .. } => (StatusCode::BAD_REQUEST, "invalid_request"),
        EngineError::Conflict { .. } | EngineError::Store(StoreError::ItemExists { .. }) => {
            (StatusCode::CONFLICT, "conflict")
        }
        EngineError::Encoding(_) => (StatusCode::INTERNAL_SERVER_ERROR, "embedding_error"),
        EngineError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
        EngineError::InvalidConfig { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, reunite_status) = match &self {
            GatewayError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            GatewayError::Engine(err) => classify(err),
            GatewayError::Parked(err) => (classify(err).0, "pending"),
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            REUNITE_STATUS_HEADER,
            HeaderValue::from_static(reunite_status),
        );

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: status.as_u16(),
        });

        (status, headers, body).into_response()
    }
}

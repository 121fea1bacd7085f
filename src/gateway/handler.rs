use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument};

use super::error::GatewayError;
use super::payload::{
    CompareRequest, CompareResponse, GenerateEmbeddingResponse, MatchesResponse,
    ProcessPendingResponse, RegisterItemRequest, UserMatchesQuery, submission_from_json,
};
use super::state::HandlerState;
use super::{REUNITE_STATUS_HEADER, REUNITE_STATUS_MATCHED, REUNITE_STATUS_OK};
use crate::model::{Category, Item};

fn make_response<T: Serialize>(status: StatusCode, reunite_status: &'static str, body: T) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        REUNITE_STATUS_HEADER,
        HeaderValue::from_static(reunite_status),
    );
    (status, headers, Json(body)).into_response()
}

fn parse_body<T: serde::de::DeserializeOwned>(body: Value) -> Result<T, GatewayError> {
    serde_json::from_value(body)
        .map_err(|e| GatewayError::InvalidRequest(format!("Invalid request schema: {e}")))
}

#[instrument(skip(state, body), fields(doc_id = tracing::field::Empty))]
pub async fn generate_embedding_handler(
    State(state): State<HandlerState>,
    Json(body): Json<Value>,
) -> Result<Response, GatewayError> {
    let submission = submission_from_json(&body);
    if let Some(doc_id) = submission.item_id.as_deref() {
        tracing::Span::current().record("doc_id", doc_id);
    }

    let result = state
        .engine
        .submit(submission)
        .await
        .map_err(GatewayError::from_submission)?;

    let reunite_status = if result.matches.is_empty() {
        REUNITE_STATUS_OK
    } else {
        REUNITE_STATUS_MATCHED
    };

    Ok(make_response(
        StatusCode::OK,
        reunite_status,
        GenerateEmbeddingResponse {
            message: format!(
                "Embedding generated and matches searched for {} ({})",
                result.item_id, result.category
            ),
            embedding: result.embedding,
            matches: result.matches,
        },
    ))
}

#[instrument(skip(state))]
pub async fn process_pending_handler(
    State(state): State<HandlerState>,
) -> Result<Response, GatewayError> {
    let report = state.engine.replay_pending().await?;
    info!(
        processed = report.processed.len(),
        failed = report.failed.len(),
        "Pending queue processed"
    );

    Ok(make_response(
        StatusCode::OK,
        REUNITE_STATUS_OK,
        ProcessPendingResponse {
            message: "Processing finished",
            processed: report.processed,
            skipped: report.skipped,
            failed: report.failed,
            matches_created: report.matches_created,
        },
    ))
}

#[instrument(skip(state))]
pub async fn matches_for_lost_handler(
    State(state): State<HandlerState>,
    Path(lost_id): Path<String>,
) -> Result<Response, GatewayError> {
    let matches = state.engine.matches_for_item(&lost_id).await?;
    debug!(count = matches.len(), "Matches for lost item");
    Ok(make_response(
        StatusCode::OK,
        REUNITE_STATUS_OK,
        MatchesResponse { matches },
    ))
}

#[instrument(skip(state, query))]
pub async fn user_matches_handler(
    State(state): State<HandlerState>,
    Query(query): Query<UserMatchesQuery>,
) -> Result<Response, GatewayError> {
    let user_id = query
        .user_id
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| GatewayError::InvalidRequest("Missing userId".to_string()))?;

    let matches = state.engine.matches_for_user(&user_id).await?;
    Ok(make_response(StatusCode::OK, REUNITE_STATUS_OK, matches))
}

#[instrument(skip(state, body))]
pub async fn register_item_handler(
    State(state): State<HandlerState>,
    Json(body): Json<Value>,
) -> Result<Response, GatewayError> {
    let request: RegisterItemRequest = parse_body(body)?;
    let category: Category = request
        .category
        .parse()
        .map_err(|e: crate::model::ParseEnumError| GatewayError::InvalidRequest(e.to_string()))?;

    let mut item = Item::new(request.id, category, request.description);
    item.owner_user_id = request.user_id;

    let item = state.engine.register_item(item).await?;
    Ok(make_response(StatusCode::CREATED, REUNITE_STATUS_OK, item))
}

#[instrument(skip(state, body))]
pub async fn compare_handler(
    State(state): State<HandlerState>,
    Json(body): Json<Value>,
) -> Result<Response, GatewayError> {
    let request: CompareRequest = parse_body(body)?;
    let similarity_score = state
        .engine
        .compare(&request.description1, &request.description2)
        .await?;

    Ok(make_response(
        StatusCode::OK,
        REUNITE_STATUS_OK,
        CompareResponse { similarity_score },
    ))
}

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::Submission;
use crate::model::Match;

/// Reads a `/generate-embedding` body without rejecting it.
///
/// Non-string or missing fields become `None` so the engine can park the
/// submission verbatim.
pub fn submission_from_json(body: &Value) -> Submission {
    let field = |name: &str| body.get(name).and_then(Value::as_str).map(str::to_string);

    Submission {
        item_id: field("docId"),
        description: field("description"),
        category: field("type"),
        user_id: field("userId"),
    }
}

#[derive(Serialize, Debug)]
pub struct GenerateEmbeddingResponse {
    pub message: String,
    pub embedding: Vec<f32>,
    pub matches: Vec<Match>,
}

#[derive(Serialize, Debug)]
pub struct ProcessPendingResponse {
    pub message: &'static str,
    pub processed: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
    #[serde(rename = "matchesCreated")]
    pub matches_created: usize,
}

#[derive(Serialize, Debug)]
pub struct MatchesResponse {
    pub matches: Vec<Match>,
}

#[derive(Deserialize, Debug)]
pub struct UserMatchesQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct RegisterItemRequest {
    pub id: String,
    #[serde(rename = "type")]
    pub category: String,
    pub description: String,
    #[serde(rename = "userId", default)]
    pub user_id: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct CompareRequest {
    pub description1: String,
    pub description2: String,
}

#[derive(Serialize, Debug)]
pub struct CompareResponse {
    pub similarity_score: f32,
}

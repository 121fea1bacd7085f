//! Shared descriptions, vectors and request bodies.

use std::sync::Arc;

use reunite::embedding::ScriptedEncoder;

pub const DIM: usize = 2;

pub const LOST_PHONE: &str = "black Samsung phone lost on the plane";
pub const FOUND_PHONE: &str = "black Samsung phone found on flight";
pub const FOUND_UMBRELLA: &str = "red umbrella left at the bus stop";

/// Cosine with [`LOST_PHONE`] is 0.78.
pub const FOUND_PHONE_VECTOR: [f32; 2] = [0.78, 0.6257795];

/// Encoder scripted for the phone pair plus one unrelated found report.
pub fn phone_encoder() -> Arc<ScriptedEncoder> {
    Arc::new(
        ScriptedEncoder::new(DIM)
            .with_vector(LOST_PHONE, vec![1.0, 0.0])
            .with_vector(FOUND_PHONE, FOUND_PHONE_VECTOR.to_vec())
            .with_vector(FOUND_UMBRELLA, vec![0.0, 1.0]),
    )
}

pub fn submission_body(doc_id: &str, description: &str, kind: &str, user: &str) -> serde_json::Value {
    serde_json::json!({
        "docId": doc_id,
        "description": description,
        "type": kind,
        "userId": user
    })
}

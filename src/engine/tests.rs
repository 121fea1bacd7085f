use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use super::*;
use crate::embedding::{Encoder, EncodingError, FailingEncoder, ScriptedEncoder};
use crate::model::{
    Category, Item, ItemStatus, NewMatch, NewPendingEntry, PendingReason, ReasonCode,
};
use crate::store::{FlakyStore, ItemStore, MatchStore, MemoryStore, PendingQueue, StoreError};

const LOST_TEXT: &str = "black Samsung phone lost on the plane";
const FOUND_TEXT: &str = "black Samsung phone found on flight";

fn samsung_encoder() -> Arc<ScriptedEncoder> {
    Arc::new(
        ScriptedEncoder::new(2)
            .with_vector(LOST_TEXT, vec![1.0, 0.0])
            .with_vector(FOUND_TEXT, vec![0.78, 0.6257795]),
    )
}

fn config(dim: usize) -> EngineConfig {
    EngineConfig::default().with_embedding_dim(dim)
}

fn engine_on<S>(encoder: Arc<dyn Encoder>, store: Arc<S>, config: EngineConfig) -> MatchEngine
where
    S: ItemStore + MatchStore + PendingQueue + 'static,
{
    MatchEngine::with_store(encoder, store, config).expect("engine should build")
}

async fn status_of(store: &MemoryStore, category: Category, id: &str) -> ItemStatus {
    store.get(category, id).await.unwrap().status
}

#[tokio::test]
async fn test_samsung_pair_matches_once() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine_on(samsung_encoder(), store.clone(), config(2));

    let found = engine
        .submit(Submission::new("F1", FOUND_TEXT, Category::Found))
        .await
        .unwrap();
    assert!(found.matches.is_empty());
    assert_eq!(found.embedding, vec![0.78, 0.6257795]);

    let lost = engine
        .submit(Submission::new("L1", LOST_TEXT, Category::Lost).with_user("u1"))
        .await
        .unwrap();

    assert_eq!(lost.matches.len(), 1);
    let m = &lost.matches[0];
    assert_eq!(m.pair(), ("L1", "F1"));
    assert!((m.score - 0.78).abs() < 1e-4, "score was {}", m.score);
    assert_eq!(m.owner_user_id.as_deref(), Some("u1"));
    assert_eq!(m.status, crate::model::MatchStatus::Waiting);

    assert_eq!(status_of(&store, Category::Lost, "L1").await, ItemStatus::Matched);
    assert_eq!(status_of(&store, Category::Found, "F1").await, ItemStatus::Matched);
    assert_eq!(store.match_count(), 1);
    assert_eq!(store.pending_count(), 0);
}

#[tokio::test]
async fn test_found_submission_orders_pair() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine_on(samsung_encoder(), store.clone(), config(2));

    engine
        .submit(Submission::new("L1", LOST_TEXT, Category::Lost))
        .await
        .unwrap();
    let found = engine
        .submit(Submission::new("F1", FOUND_TEXT, Category::Found))
        .await
        .unwrap();

    assert_eq!(found.matches.len(), 1);
    assert_eq!(found.matches[0].lost_id, "L1");
    assert_eq!(found.matches[0].found_id, "F1");
}

#[tokio::test]
async fn test_score_at_threshold_is_not_a_match() {
    let encoder = Arc::new(
        ScriptedEncoder::new(4)
            .with_vector("lost umbrella", vec![1.0, 0.0, 0.0, 0.0])
            .with_vector("found umbrella", vec![1.0, 1.0, 1.0, 1.0])
            .with_vector("found blue umbrella", vec![1.01, 1.0, 1.0, 1.0]),
    );
    let store = Arc::new(MemoryStore::new());
    let engine = engine_on(encoder, store.clone(), config(4));

    engine
        .submit(Submission::new("F1", "found umbrella", Category::Found))
        .await
        .unwrap();
    let lost = engine
        .submit(Submission::new("L1", "lost umbrella", Category::Lost))
        .await
        .unwrap();
    assert!(lost.matches.is_empty());
    assert_eq!(status_of(&store, Category::Lost, "L1").await, ItemStatus::Waiting);
    assert_eq!(status_of(&store, Category::Found, "F1").await, ItemStatus::Waiting);

    let found = engine
        .submit(Submission::new("F2", "found blue umbrella", Category::Found))
        .await
        .unwrap();
    assert_eq!(found.matches.len(), 1);
    assert!(found.matches[0].score > 0.5);
}

#[tokio::test]
async fn test_zero_norm_never_matches() {
    let encoder = Arc::new(
        ScriptedEncoder::new(2)
            .with_vector("blank", vec![0.0, 0.0])
            .with_vector("wallet", vec![1.0, 0.0]),
    );
    let store = Arc::new(MemoryStore::new());
    let config = config(2).with_threshold(-0.5).unwrap();
    let engine = engine_on(encoder, store.clone(), config);

    engine
        .submit(Submission::new("F1", "wallet", Category::Found))
        .await
        .unwrap();
    let lost = engine
        .submit(Submission::new("L1", "blank", Category::Lost))
        .await
        .unwrap();
    assert!(lost.matches.is_empty());
}

#[tokio::test]
async fn test_resubmission_does_not_duplicate_pair() {
    let store = Arc::new(MemoryStore::new());
    let encoder = samsung_encoder();
    let engine = engine_on(encoder.clone(), store.clone(), config(2));

    engine
        .submit(Submission::new("F1", FOUND_TEXT, Category::Found))
        .await
        .unwrap();
    engine
        .submit(Submission::new("L1", LOST_TEXT, Category::Lost))
        .await
        .unwrap();
    let again = engine
        .submit(Submission::new("L1", LOST_TEXT, Category::Lost))
        .await
        .unwrap();

    assert!(again.matches.is_empty());
    assert_eq!(store.query_by_lost_id("L1").await.unwrap().len(), 1);
    assert_eq!(encoder.calls(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submissions_claim_candidate_once() {
    let encoder = Arc::new(ScriptedEncoder::new(2).with_fallback(vec![1.0, 0.1]));
    let store = Arc::new(MemoryStore::new());
    let engine = Arc::new(engine_on(encoder, store.clone(), config(2)));

    engine
        .submit(Submission::new("F1", "grey backpack", Category::Found))
        .await
        .unwrap();

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                engine
                    .submit(Submission::new(format!("L{i}"), "grey backpack", Category::Lost))
                    .await
                    .unwrap()
                    .matches
                    .len()
            })
        })
        .collect();

    let mut total = 0;
    for handle in handles {
        total += handle.await.unwrap();
    }

    assert_eq!(total, 1);
    assert_eq!(store.match_count(), 1);
    assert_eq!(status_of(&store, Category::Found, "F1").await, ItemStatus::Matched);
}

#[tokio::test]
async fn test_one_item_can_match_several_candidates() {
    let encoder = Arc::new(ScriptedEncoder::new(2).with_fallback(vec![1.0, 0.0]));
    let store = Arc::new(MemoryStore::new());
    let engine = engine_on(encoder, store.clone(), config(2));

    for id in ["F1", "F2", "F3"] {
        engine
            .submit(Submission::new(id, "red scarf", Category::Found))
            .await
            .unwrap();
    }
    let lost = engine
        .submit(Submission::new("L1", "red scarf", Category::Lost))
        .await
        .unwrap();

    assert_eq!(lost.matches.len(), 3);
    let mut found: Vec<_> = lost.matches.iter().map(|m| m.found_id.as_str()).collect();
    found.sort_unstable();
    assert_eq!(found, vec!["F1", "F2", "F3"]);
}

#[tokio::test]
async fn test_invalid_submission_is_parked() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine_on(samsung_encoder(), store.clone(), config(2));

    let submission = Submission {
        item_id: None,
        description: Some("a hat".to_string()),
        category: Some("misplaced".to_string()),
        user_id: None,
    };
    let err = engine.submit(submission).await.unwrap_err();
    assert!(err.is_client_error());

    let queued = store.scan_all().await.unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].reason, PendingReason::invalid_fields());
    assert!(queued[0].doc_id.is_none());
    assert_eq!(queued[0].category.as_deref(), Some("misplaced"));
}

#[tokio::test]
async fn test_validation_rules() {
    let cases = [
        Submission::new("", "wallet", Category::Lost),
        Submission::new("L1", "   ", Category::Lost),
        Submission {
            category: Some("LOST".to_string()),
            ..Submission::new("L1", "wallet", Category::Lost)
        },
        Submission {
            category: None,
            ..Submission::new("L1", "wallet", Category::Lost)
        },
    ];
    for case in cases {
        assert!(
            matches!(case.validate(), Err(EngineError::Validation { .. })),
            "{case:?} should be rejected"
        );
    }

    let valid = Submission::new("L1", "wallet", Category::Lost)
        .with_user("u7")
        .validate()
        .unwrap();
    assert_eq!(valid.category, Category::Lost);
    assert_eq!(valid.user_id.as_deref(), Some("u7"));
}

#[tokio::test]
async fn test_encoding_failure_is_parked_then_replayed() {
    let store = Arc::new(MemoryStore::new());
    let encoder = samsung_encoder();
    let engine = engine_on(encoder.clone(), store.clone(), config(2));

    engine
        .submit(Submission::new("F1", FOUND_TEXT, Category::Found))
        .await
        .unwrap();

    encoder.fail_on(LOST_TEXT);
    let err = engine
        .submit(Submission::new("L1", LOST_TEXT, Category::Lost).with_user("u1"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Encoding(_)));

    let queued = store.scan_all().await.unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].reason.code, ReasonCode::EncodingFailed);
    assert_eq!(queued[0].user_id.as_deref(), Some("u1"));

    encoder.heal(LOST_TEXT);
    let report = engine.replay_pending().await.unwrap();
    assert_eq!(report.processed, vec!["L1".to_string()]);
    assert_eq!(report.matches_created, 1);
    assert!(report.is_clean());
    assert_eq!(store.pending_count(), 0);

    let owned = engine.matches_for_user("u1").await.unwrap();
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].pair(), ("L1", "F1"));
}

#[tokio::test]
async fn test_replay_retains_only_the_failing_entry() {
    let encoder = Arc::new(ScriptedEncoder::new(2).with_fallback(vec![0.0, 1.0]));
    encoder.fail_on("item 3");
    let store = Arc::new(MemoryStore::new());
    let engine = engine_on(encoder.clone(), store.clone(), config(2));

    for i in 1..=5 {
        PendingQueue::insert(
            &*store,
            NewPendingEntry {
                doc_id: Some(format!("d{i}")),
                description: Some(format!("item {i}")),
                category: Some("lost".to_string()),
                user_id: None,
                timestamp: Utc::now(),
                reason: PendingReason::new(ReasonCode::EncodingFailed, "model offline"),
            },
        )
        .await
        .unwrap();
    }

    let report = engine.replay_pending().await.unwrap();
    assert_eq!(report.processed, vec!["d1", "d2", "d4", "d5"]);
    assert_eq!(report.failed.len(), 1);
    assert!(report.skipped.is_empty());

    let remaining = store.scan_all().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].doc_id.as_deref(), Some("d3"));
    assert_eq!(report.failed[0], remaining[0].id);

    // Replayed items were registered and fingerprinted.
    let item = store.get(Category::Lost, "d4").await.unwrap();
    assert_eq!(item.embedding, Some(vec![0.0, 1.0]));
}

#[tokio::test]
async fn test_replay_skips_invalid_entries_without_deleting() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine_on(samsung_encoder(), store.clone(), config(2));

    let _ = engine
        .submit(Submission {
            item_id: Some("L9".to_string()),
            description: None,
            category: Some("lost".to_string()),
            user_id: None,
        })
        .await;

    let report = engine.replay_pending().await.unwrap();
    assert_eq!(report.skipped.len(), 1);
    assert!(report.processed.is_empty());
    assert_eq!(store.pending_count(), 1);
}

#[tokio::test]
async fn test_encoder_timeout_is_parked_with_timeout_code() {
    let encoder = Arc::new(
        ScriptedEncoder::new(2)
            .with_fallback(vec![1.0, 0.0])
            .with_delay(Duration::from_millis(500)),
    );
    let store = Arc::new(MemoryStore::new());
    let config = config(2).with_operation_timeout(Duration::from_millis(20));
    let engine = engine_on(encoder, store.clone(), config);

    let err = engine
        .submit(Submission::new("L1", "wallet", Category::Lost))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Encoding(EncodingError::Timeout { .. })
    ));
    assert!(err.is_timeout());

    let queued = store.scan_all().await.unwrap();
    assert_eq!(queued[0].reason.code, ReasonCode::Timeout);
}

#[tokio::test]
async fn test_store_timeout_keeps_written_embedding() {
    let encoder = Arc::new(ScriptedEncoder::new(2).with_fallback(vec![1.0, 0.0]));
    let inner = Arc::new(MemoryStore::new());
    let store = Arc::new(FlakyStore::new(inner.clone()));
    store.delay_scans(Some(Duration::from_millis(500)));
    let config = config(2).with_operation_timeout(Duration::from_millis(20));
    let engine = engine_on(encoder, store.clone(), config);

    let err = engine
        .submit(Submission::new("L1", "wallet", Category::Lost))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Store(StoreError::Timeout {
            operation: "scan",
            ..
        })
    ));

    assert!(inner.get(Category::Lost, "L1").await.unwrap().is_fingerprinted());
    assert_eq!(inner.scan_all().await.unwrap()[0].reason.code, ReasonCode::Timeout);
}

#[tokio::test]
async fn test_failed_match_insert_releases_claim() {
    let encoder = samsung_encoder();
    let inner = Arc::new(MemoryStore::new());
    let store = Arc::new(FlakyStore::new(inner.clone()));
    let engine = engine_on(encoder, store.clone(), config(2));

    engine
        .submit(Submission::new("F1", FOUND_TEXT, Category::Found))
        .await
        .unwrap();

    store.fail_match_inserts(true);
    let err = engine
        .submit(Submission::new("L1", LOST_TEXT, Category::Lost))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Store(StoreError::Backend { .. })));

    assert_eq!(status_of(&inner, Category::Found, "F1").await, ItemStatus::Waiting);
    assert_eq!(status_of(&inner, Category::Lost, "L1").await, ItemStatus::Waiting);
    assert_eq!(inner.match_count(), 0);
    assert_eq!(
        inner.scan_all().await.unwrap()[0].reason.code,
        ReasonCode::StoreFailed
    );

    store.fail_match_inserts(false);
    let report = engine.replay_pending().await.unwrap();
    assert_eq!(report.processed, vec!["L1"]);
    assert_eq!(inner.match_count(), 1);
    assert_eq!(status_of(&inner, Category::Found, "F1").await, ItemStatus::Matched);
}

#[tokio::test]
async fn test_unparkable_failure_still_reports_error() {
    let inner = Arc::new(MemoryStore::new());
    let store = Arc::new(FlakyStore::new(inner.clone()));
    store.fail_pending_inserts(true);
    let engine = engine_on(
        Arc::new(FailingEncoder::new(2, "model offline")),
        store,
        config(2),
    );

    let err = engine
        .submit(Submission::new("L1", "wallet", Category::Lost))
        .await
        .unwrap_err();
    assert_eq!(err.reason_code(), ReasonCode::EncodingFailed);
    assert!(!err.is_parked());
    assert!(matches!(err, EngineError::Unparked { .. }));
    assert!(matches!(err.cause(), EngineError::Encoding(_)));
    assert!(err.to_string().contains("could not be parked"));
    assert_eq!(inner.pending_count(), 0);
}

#[tokio::test]
async fn test_parked_failure_reports_parked() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine_on(
        Arc::new(FailingEncoder::new(2, "model offline")),
        store.clone(),
        config(2),
    );

    let err = engine
        .submit(Submission::new("L1", "wallet", Category::Lost))
        .await
        .unwrap_err();
    assert!(err.is_parked());
    assert_eq!(store.pending_count(), 1);
}

#[tokio::test]
async fn test_match_insert_committed_after_timeout_is_adopted() {
    let inner = Arc::new(MemoryStore::new());
    let store = Arc::new(FlakyStore::new(inner.clone()));
    let config = config(2).with_operation_timeout(Duration::from_millis(50));
    let engine = engine_on(samsung_encoder(), store.clone(), config);

    engine
        .submit(Submission::new("F1", FOUND_TEXT, Category::Found))
        .await
        .unwrap();

    store.late_match_inserts(Some(Duration::from_millis(300)));
    let lost = engine
        .submit(Submission::new("L1", LOST_TEXT, Category::Lost))
        .await
        .unwrap();

    assert_eq!(lost.matches.len(), 1);
    assert_eq!(lost.matches[0].pair(), ("L1", "F1"));
    assert_eq!(status_of(&inner, Category::Lost, "L1").await, ItemStatus::Matched);
    assert_eq!(status_of(&inner, Category::Found, "F1").await, ItemStatus::Matched);
    assert_eq!(inner.match_count(), 1);
    assert_eq!(inner.pending_count(), 0);
}

#[tokio::test]
async fn test_claim_committed_after_timeout_is_adopted() {
    let inner = Arc::new(MemoryStore::new());
    let store = Arc::new(FlakyStore::new(inner.clone()));
    let config = config(2).with_operation_timeout(Duration::from_millis(50));
    let engine = engine_on(samsung_encoder(), store.clone(), config);

    engine
        .submit(Submission::new("F1", FOUND_TEXT, Category::Found))
        .await
        .unwrap();

    store.late_claim_for("F1", Duration::from_millis(300));
    let lost = engine
        .submit(Submission::new("L1", LOST_TEXT, Category::Lost))
        .await
        .unwrap();

    assert_eq!(lost.matches.len(), 1);
    assert_eq!(status_of(&inner, Category::Lost, "L1").await, ItemStatus::Matched);
    assert_eq!(status_of(&inner, Category::Found, "F1").await, ItemStatus::Matched);
    assert_eq!(inner.match_count(), 1);
    assert_eq!(inner.pending_count(), 0);
}

#[tokio::test]
async fn test_late_claim_on_candidate_paired_elsewhere_is_skipped() {
    let inner = Arc::new(MemoryStore::new());
    let store = Arc::new(FlakyStore::new(inner.clone()));
    let config = config(2).with_operation_timeout(Duration::from_millis(50));
    let engine = engine_on(samsung_encoder(), store.clone(), config);

    engine
        .submit(Submission::new("F1", FOUND_TEXT, Category::Found))
        .await
        .unwrap();
    inner.insert_match_unchecked(NewMatch::new("L9", "F1", 0.9));

    store.late_claim_for("F1", Duration::from_millis(300));
    let lost = engine
        .submit(Submission::new("L1", LOST_TEXT, Category::Lost))
        .await
        .unwrap();

    assert!(lost.matches.is_empty());
    assert_eq!(status_of(&inner, Category::Lost, "L1").await, ItemStatus::Waiting);
    assert_eq!(inner.match_count(), 1);
}

#[tokio::test]
async fn test_failed_final_status_write_is_settled_on_replay() {
    let inner = Arc::new(MemoryStore::new());
    let store = Arc::new(FlakyStore::new(inner.clone()));
    let engine = engine_on(samsung_encoder(), store.clone(), config(2));

    engine
        .submit(Submission::new("F1", FOUND_TEXT, Category::Found))
        .await
        .unwrap();

    store.fail_matched_write_for("L1");
    let err = engine
        .submit(Submission::new("L1", LOST_TEXT, Category::Lost))
        .await
        .unwrap_err();
    assert!(err.is_parked());
    assert_eq!(err.reason_code(), ReasonCode::StoreFailed);
    assert_eq!(inner.match_count(), 1);
    assert_eq!(status_of(&inner, Category::Lost, "L1").await, ItemStatus::Waiting);

    store.heal_matched_write_for("L1");
    let report = engine.replay_pending().await.unwrap();
    assert_eq!(report.processed, vec!["L1"]);
    assert_eq!(report.matches_created, 0);
    assert_eq!(status_of(&inner, Category::Lost, "L1").await, ItemStatus::Matched);
    assert_eq!(status_of(&inner, Category::Found, "F1").await, ItemStatus::Matched);
    assert_eq!(inner.match_count(), 1);
    assert_eq!(inner.pending_count(), 0);
}

#[tokio::test]
async fn test_existing_pair_moves_both_items_to_matched() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine_on(samsung_encoder(), store.clone(), config(2));

    ItemStore::insert(
        &*store,
        Item::new("F1", Category::Found, FOUND_TEXT).with_embedding(vec![0.78, 0.6257795]),
    )
    .await
    .unwrap();
    ItemStore::insert(&*store, Item::new("L1", Category::Lost, LOST_TEXT))
        .await
        .unwrap();
    store.insert_match_unchecked(NewMatch::new("L1", "F1", 0.78));

    let lost = engine
        .submit(Submission::new("L1", LOST_TEXT, Category::Lost))
        .await
        .unwrap();

    assert!(lost.matches.is_empty());
    assert_eq!(status_of(&store, Category::Lost, "L1").await, ItemStatus::Matched);
    assert_eq!(status_of(&store, Category::Found, "F1").await, ItemStatus::Matched);
    assert_eq!(store.match_count(), 1);
}

#[tokio::test]
async fn test_matches_for_item_filters_low_scores() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine_on(samsung_encoder(), store.clone(), config(2));

    store.insert_match_unchecked(NewMatch::new("L1", "F1", 0.3).with_owner(Some("u1".into())));
    store.insert_match_unchecked(NewMatch::new("L1", "F2", 0.5).with_owner(Some("u1".into())));
    store.insert_match_unchecked(NewMatch::new("L1", "F3", 0.91).with_owner(Some("u1".into())));

    let for_item = engine.matches_for_item("L1").await.unwrap();
    assert_eq!(for_item.len(), 1);
    assert_eq!(for_item[0].found_id, "F3");

    // User queries are not score-filtered.
    assert_eq!(engine.matches_for_user("u1").await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_owner_falls_back_to_registered_item() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine_on(samsung_encoder(), store.clone(), config(2));

    engine
        .register_item(Item::new("L1", Category::Lost, LOST_TEXT).with_owner("owner-7"))
        .await
        .unwrap();
    engine
        .submit(Submission::new("F1", FOUND_TEXT, Category::Found))
        .await
        .unwrap();
    let result = engine
        .submit(Submission::new("L1", LOST_TEXT, Category::Lost))
        .await
        .unwrap();

    assert_eq!(result.matches[0].owner_user_id.as_deref(), Some("owner-7"));
}

#[tokio::test]
async fn test_candidates_with_wrong_dimension_are_skipped() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine_on(samsung_encoder(), store.clone(), config(2));

    ItemStore::insert(
        &*store,
        Item::new("F1", Category::Found, "odd").with_embedding(vec![1.0, 0.0, 0.0]),
    )
    .await
    .unwrap();
    ItemStore::insert(&*store, Item::new("F2", Category::Found, "unfingerprinted"))
        .await
        .unwrap();

    let lost = engine
        .submit(Submission::new("L1", LOST_TEXT, Category::Lost))
        .await
        .unwrap();
    assert!(lost.matches.is_empty());
}

#[tokio::test]
async fn test_register_item_validates_fields() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine_on(samsung_encoder(), store.clone(), config(2));

    let err = engine
        .register_item(Item::new("L1", Category::Lost, " "))
        .await
        .unwrap_err();
    assert!(err.is_client_error());

    let err = engine
        .register_item(Item::new("L1", Category::Lost, "bag").with_embedding(vec![1.0]))
        .await
        .unwrap_err();
    assert!(err.is_client_error());

    let item = engine
        .register_item(
            Item::new("L1", Category::Lost, "bag").with_status(ItemStatus::Matched),
        )
        .await
        .unwrap();
    assert_eq!(item.status, ItemStatus::Waiting);

    let err = engine
        .register_item(Item::new("L1", Category::Lost, "bag"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Store(StoreError::ItemExists { .. })
    ));
}

#[tokio::test]
async fn test_compare_descriptions() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine_on(samsung_encoder(), store, config(2));

    let score = engine.compare(LOST_TEXT, FOUND_TEXT).await.unwrap();
    assert!((score - 0.78).abs() < 1e-4);

    assert!(engine.compare("", FOUND_TEXT).await.unwrap_err().is_client_error());
}

#[tokio::test]
async fn test_encoder_dimension_must_match_config() {
    let store = Arc::new(MemoryStore::new());
    let err = MatchEngine::with_store(Arc::new(ScriptedEncoder::new(3)), store, config(2))
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidConfig { .. }));
}

#[tokio::test]
async fn test_wrong_encoder_output_is_rejected() {
    let encoder = Arc::new(ScriptedEncoder::new(2).with_fallback(vec![1.0, 0.0, 0.0]));
    let store = Arc::new(MemoryStore::new());
    let engine = engine_on(encoder, store.clone(), config(2));

    let err = engine
        .submit(Submission::new("L1", "wallet", Category::Lost))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Encoding(EncodingError::DimensionMismatch {
            expected: 2,
            actual: 3
        })
    ));
}

#[tokio::test]
async fn test_close_shuts_every_capability() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine_on(samsung_encoder(), store.clone(), config(2));

    engine.close().await.unwrap();

    assert!(matches!(
        engine.matches_for_user("u1").await,
        Err(EngineError::Store(StoreError::Closed))
    ));
    assert!(matches!(
        store.scan_all().await,
        Err(StoreError::Closed)
    ));
}

#[test]
fn test_reason_codes() {
    assert_eq!(
        EngineError::validation("x").pending_reason(),
        PendingReason::invalid_fields()
    );
    assert_eq!(
        EngineError::from(StoreError::Closed).reason_code(),
        ReasonCode::StoreFailed
    );
    assert_eq!(
        EngineError::from(EncodingError::Timeout {
            after: Duration::from_secs(1)
        })
        .reason_code(),
        ReasonCode::Timeout
    );

    let reason = EngineError::from(EncodingError::Closed).pending_reason();
    assert_eq!(reason.code, ReasonCode::EncodingFailed);
    assert!(reason.detail.contains("closed"));
}

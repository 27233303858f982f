use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use code_ledger::routes::{
    append_record, get_record, latest_record, list_records, verify_chain, AppState,
};
use code_ledger::{HashAlgorithm, HashChain};
use serde_json::json;

fn state() -> AppState {
    AppState {
        chain: Arc::new(HashChain::initialize(HashAlgorithm::Sha256)),
    }
}

#[tokio::test]
async fn append_then_read_back() {
    let state = state();
    let payload = json!({
        "code": "PRD-3F9A0C1B22DE",
        "batch": "B42",
        "location": "KCMO",
        "status": "active"
    });

    let Json(record) = append_record(State(state.clone()), Json(payload.clone()))
        .await
        .unwrap();
    assert_eq!(record.index, 1);
    assert_eq!(record.payload, payload);

    let Json(fetched) = get_record(State(state.clone()), Path(1)).await.unwrap();
    assert_eq!(fetched, record);

    let Json(latest) = latest_record(State(state.clone())).await.unwrap();
    assert_eq!(latest, record);

    let Json(all) = list_records(State(state.clone())).await;
    assert_eq!(all.len(), 2);
    assert_eq!(all[1].previous_digest, all[0].digest);

    let Json(report) = verify_chain(State(state)).await;
    assert!(report.ok);
    assert_eq!(report.checked, 2);
    assert!(report.failing_index.is_none());
    assert!(report.reason.is_none());
}

#[tokio::test]
async fn unknown_index_is_404() {
    let state = state();
    let (status, message) = get_record(State(state), Path(5)).await.unwrap_err();
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(message.contains("record 5 not found"));
}

#[tokio::test]
async fn concurrent_requests_produce_a_contiguous_chain() {
    let state = state();
    let mut tasks = Vec::new();
    for n in 0..50 {
        let state = state.clone();
        tasks.push(tokio::spawn(async move {
            append_record(State(state), Json(json!({ "request": n })))
                .await
                .map(|Json(r)| r.index)
        }));
    }
    let mut indices = Vec::new();
    for task in tasks {
        indices.push(task.await.unwrap().unwrap());
    }
    indices.sort_unstable();
    assert_eq!(indices, (1..=50).collect::<Vec<u64>>());

    let Json(report) = verify_chain(State(state)).await;
    assert!(report.ok);
    assert_eq!(report.checked, 51);
}

//! HTTP routes for appending to, reading and verifying the ledger.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use tracing::error;

use crate::chain::HashChain;
use crate::error::LedgerError;
use crate::model::Record;

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub chain: Arc<HashChain>,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

fn api_error(e: LedgerError) -> (StatusCode, String) {
    match e {
        LedgerError::NotFound { .. } => (StatusCode::NOT_FOUND, e.to_string()),
        other => {
            error!("ledger operation failed: {other}");
            (StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/records", post(append_record).get(list_records))
        .route("/records/:index", get(get_record))
        .route("/latest", get(latest_record))
        .route("/verify", get(verify_chain))
        .route("/health", get(health))
        .route("/version", get(version))
        .with_state(state)
}

/// POST /records — body is the payload, stored as-is.
pub async fn append_record(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> ApiResult<Record> {
    state.chain.append(payload).map(Json).map_err(api_error)
}

/// GET /records
pub async fn list_records(State(state): State<AppState>) -> Json<Vec<Record>> {
    Json(state.chain.all())
}

/// GET /records/:index
pub async fn get_record(State(state): State<AppState>, Path(index): Path<u64>) -> ApiResult<Record> {
    state.chain.get(index).map(Json).map_err(api_error)
}

/// GET /latest
pub async fn latest_record(State(state): State<AppState>) -> ApiResult<Record> {
    state.chain.latest().map(Json).map_err(api_error)
}

/// GET /verify — `{ ok, failing_index, reason }`
#[derive(Debug, Serialize)]
pub struct VerifyResp {
    pub ok: bool,
    pub checked: u64,
    pub failing_index: Option<u64>,
    pub reason: Option<String>,
    pub detail: Option<String>,
}

pub async fn verify_chain(State(state): State<AppState>) -> Json<VerifyResp> {
    let verification = state.chain.verify();
    Json(VerifyResp {
        ok: verification.is_ok(),
        checked: verification.checked,
        failing_index: verification.failing_index(),
        reason: verification.reason().map(|r| r.to_string()),
        detail: verification.failure.map(|f| f.to_string()),
    })
}

/// GET /health
#[derive(Serialize)]
pub struct Health {
    pub status: &'static str,
    pub records: u64,
    pub algorithm: String,
}
pub async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        records: state.chain.len(),
        algorithm: state.chain.algorithm().to_string(),
    })
}

/// GET /version
#[derive(Serialize)]
pub struct Version {
    pub version: &'static str,
    pub git_sha: Option<&'static str>,
}
pub async fn version() -> Json<Version> {
    Json(Version {
        version: env!("CARGO_PKG_VERSION"),
        git_sha: option_env!("GIT_SHA"),
    })
}

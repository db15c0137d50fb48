use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::playground::{self, PlaygroundReport, PlaygroundRequest};

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
    pub cached_environments: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CacheSummary {
    pub epoch: u64,
    pub environments: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InvalidateResult {
    /// Environment ids whose snapshots were dropped.
    pub invalidated: Vec<String>,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "operational".to_string(),
        cached_environments: state.edge.cache().len(),
    })
}

pub async fn get_cache(State(state): State<AdminState>) -> Json<CacheSummary> {
    let cache = state.edge.cache();
    Json(CacheSummary {
        epoch: cache.epoch(),
        environments: cache.cached_ids(),
    })
}

pub async fn post_playground(
    Json(request): Json<PlaygroundRequest>,
) -> Result<Json<PlaygroundReport>, (StatusCode, Json<serde_json::Value>)> {
    playground::evaluate(&request).map(Json).map_err(|e| {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
    })
}

pub async fn invalidate_environment(
    State(state): State<AdminState>,
    Path(env_id): Path<String>,
) -> Json<InvalidateResult> {
    let invalidated = if state.edge.cache().invalidate(&env_id) {
        vec![env_id]
    } else {
        Vec::new()
    };
    Json(InvalidateResult { invalidated })
}

pub async fn invalidate_all(State(state): State<AdminState>) -> Json<InvalidateResult> {
    let cache = state.edge.cache();
    let invalidated = cache.cached_ids();
    cache.invalidate_all();
    Json(InvalidateResult { invalidated })
}

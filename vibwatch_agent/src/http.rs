//! Plain HTTP reads for polling clients.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::state::AppState;
use crate::types::{Sample, StatusPayload};

pub const SAMPLES_DEFAULT: usize = 300;

#[derive(Debug, Deserialize)]
pub struct SamplesQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SamplesBody {
    pub samples: Vec<Sample>,
}

pub async fn realtime_state(State(state): State<AppState>) -> Json<StatusPayload> {
    Json(state.status().await)
}

pub async fn realtime_samples(
    State(state): State<AppState>,
    Query(q): Query<SamplesQuery>,
) -> Json<SamplesBody> {
    let limit = q.limit.unwrap_or(SAMPLES_DEFAULT);
    Json(SamplesBody {
        samples: state.recent_samples(limit).await,
    })
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

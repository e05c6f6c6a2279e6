//! HTTP server: a thin `axum` router binding the wire contract.
//!
//! Every handler does nothing but deserialize, delegate to the Request
//! Pipeline, and serialize. No business logic lives here. Port of
//! `routes/fetch.py` and `routes/health.py`'s endpoint shapes onto `axum`.

use crate::health;
use crate::pipeline::{Pipeline, MAX_BATCH_SIZE};
use crate::types::{BatchFetchRequest, BatchFetchResponse, FetchRequest, HealthResponse};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub started_at: Instant,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/fetch", post(fetch_page))
        .route("/batch", post(batch_fetch))
        .route("/cache/:url_hash", delete(invalidate_cache))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn fetch_page(State(state): State<AppState>, Json(body): Json<FetchRequest>) -> impl IntoResponse {
    if !state.pipeline.pool.is_connected() {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(serde_json::json!({"detail": "Browser not available"})))
            .into_response();
    }

    let response = state.pipeline.fetch(&body).await;
    Json(response).into_response()
}

async fn batch_fetch(State(state): State<AppState>, Json(body): Json<BatchFetchRequest>) -> impl IntoResponse {
    if !state.pipeline.pool.is_connected() {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(serde_json::json!({"detail": "Browser not available"})))
            .into_response();
    }

    if body.requests.is_empty() || body.requests.len() > MAX_BATCH_SIZE {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({"detail": format!("Batch size must be between 1 and {MAX_BATCH_SIZE}")})),
        )
            .into_response();
    }

    let response: BatchFetchResponse = state.pipeline.fetch_batch(&body.requests).await;
    Json(response).into_response()
}

async fn invalidate_cache(State(state): State<AppState>, Path(url_hash): Path<String>) -> impl IntoResponse {
    let deleted = state.pipeline.cache.invalidate(&url_hash).await;
    Json(serde_json::json!({"deleted": deleted}))
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health(&state.pipeline.pool, &state.pipeline.cache, state.started_at))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_batch_size_matches_wire_contract() {
        assert_eq!(MAX_BATCH_SIZE, 10);
    }
}

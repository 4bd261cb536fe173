use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::AppError,
    models::{PlayerId, ScoreSubmit, SubmitAck},
    rate_limit::Quota,
    state::State as AppState,
    submission,
};

/// Client identity for listing quotas: the first hop of
/// `X-Forwarded-For` when the reverse proxy supplies it. Callers that
/// reach the service without the header share one fallback bucket.
fn client_key(headers: &HeaderMap) -> &str {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("unidentified")
}

fn apply_quota_headers(response: &mut Response, quota: &Quota) {
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&quota.limit.to_string()) {
        headers.insert("x-ratelimit-limit", value);
    }
    if let Ok(value) = HeaderValue::from_str(&quota.remaining.to_string()) {
        headers.insert("x-ratelimit-remaining", value);
    }
    if let Ok(value) = HeaderValue::from_str(&quota.reset_at.to_rfc3339()) {
        headers.insert("x-ratelimit-reset", value);
    }
}

pub async fn submit_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ScoreSubmit>,
) -> Result<Response, AppError> {
    // Keyed by player until an identity layer fronts this service.
    let quota = state.submit_limiter.check(&payload.player_id.to_string())?;

    submission::submit(&state, payload.player_id, payload.score, &payload.mode).await?;

    let ack = SubmitAck::new("Score submitted successfully");
    let mut response = (StatusCode::CREATED, Json(ack)).into_response();
    apply_quota_headers(&mut response, &quota);
    Ok(response)
}

#[derive(Deserialize)]
pub struct TopParams {
    #[serde(default = "default_limit")]
    limit: u32,
    #[serde(default = "default_page")]
    page: u32,
}

fn default_limit() -> u32 {
    10
}

fn default_page() -> u32 {
    1
}

pub async fn top_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TopParams>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let quota = state.top_limiter.check(client_key(&headers))?;

    if !(1..=100).contains(&params.limit) {
        return Err(AppError::InvalidQuery(format!(
            "limit must be between 1 and 100, got {}",
            params.limit
        )));
    }
    if params.page < 1 {
        return Err(AppError::InvalidQuery(format!(
            "page must be at least 1, got {}",
            params.page
        )));
    }

    let page = state
        .top_cache
        .get_or_compute((params.limit, params.page), || async {
            state.store.list_top(params.limit, params.page).await
        })
        .await?;

    let mut response = Json(page).into_response();
    apply_quota_headers(&mut response, &quota);
    Ok(response)
}

pub async fn rank_handler(
    State(state): State<Arc<AppState>>,
    Path(player_id): Path<PlayerId>,
) -> Result<Response, AppError> {
    let quota = state.rank_limiter.check(&player_id.to_string())?;

    let rank = state
        .rank_cache
        .get_or_compute(player_id, || async {
            state.store.player_rank(player_id).await
        })
        .await?;

    let mut response = Json(rank).into_response();
    apply_quota_headers(&mut response, &quota);
    Ok(response)
}

pub async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "name": "Gaming Leaderboard API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "ok",
    }))
}

pub async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

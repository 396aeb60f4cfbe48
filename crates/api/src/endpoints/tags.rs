//! Tag endpoints.

use axum::{Json, Router, extract::State, routing::post};
use pulse_common::AppResult;
use pulse_core::TrendingTag;
use serde::Deserialize;

use crate::{middleware::AppState, response::ApiResponse};

/// Create the tags router.
pub fn router() -> Router<AppState> {
    Router::new().route("/trending", post(trending))
}

/// Trending tags request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrendingRequest {
    /// `24h`, `week` or `month`; anything else means `week`.
    pub period: Option<String>,
    pub limit: Option<u64>,
}

/// Get trending tags.
async fn trending(
    State(state): State<AppState>,
    Json(req): Json<TrendingRequest>,
) -> AppResult<ApiResponse<Vec<TrendingTag>>> {
    let tags = state
        .tag_trend_service
        .trending_tags(req.period.as_deref(), req.limit)
        .await?;
    Ok(ApiResponse::ok(tags))
}

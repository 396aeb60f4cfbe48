//! Discovery feed endpoints.

use axum::{Json, Router, extract::State, routing::post};
use pulse_common::AppResult;
use pulse_core::{DiscoveryStrategy, FeedPage, RecommendRequest, SearchRequest};

use crate::{middleware::AppState, response::ApiResponse};

/// Create the discovery router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/discover", post(discover))
        .route("/recommend", post(recommend))
}

/// Explore feed: posts from creators the user does not follow.
async fn discover(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> AppResult<ApiResponse<FeedPage>> {
    let page = state
        .discovery_service
        .compose(DiscoveryStrategy::Explore, req)
        .await?;
    Ok(ApiResponse::ok(page))
}

/// "Recommended for you" feed.
async fn recommend(
    State(state): State<AppState>,
    Json(req): Json<RecommendRequest>,
) -> AppResult<ApiResponse<FeedPage>> {
    let page = state.discovery_service.recommend(req).await?;
    Ok(ApiResponse::ok(page))
}

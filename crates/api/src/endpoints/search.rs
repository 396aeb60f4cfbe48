//! Search endpoints.

use axum::{Json, Router, extract::State, routing::post};
use pulse_common::AppResult;
use pulse_core::{SearchRequest, SearchResponse};

use crate::{middleware::AppState, response::ApiResponse};

/// Create the search router.
pub fn router() -> Router<AppState> {
    Router::new().route("/posts", post(search_posts))
}

/// Search posts visible to the requesting user.
async fn search_posts(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> AppResult<ApiResponse<SearchResponse>> {
    let response = state.search_service.search(req).await?;
    Ok(ApiResponse::ok(response))
}

//! Interaction tracking endpoints.

use axum::{Json, Router, extract::State, routing::post};
use futures::TryStreamExt;
use pulse_common::AppResult;
use pulse_core::{TrackInteractionInput, TrackedInteraction, validate_user_id};
use pulse_db::entities::interaction_event;
use serde::Deserialize;

use crate::{middleware::AppState, response::ApiResponse};

/// Create the interactions router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(track))
        .route("/recent", post(recent))
}

/// Track a user action.
async fn track(
    State(state): State<AppState>,
    Json(input): Json<TrackInteractionInput>,
) -> AppResult<ApiResponse<TrackedInteraction>> {
    let tracked = state.interaction_service.track(input).await?;
    Ok(ApiResponse::ok(tracked))
}

/// Recent interactions request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentRequest {
    pub user_id: i64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

const fn default_limit() -> u64 {
    20
}

/// A user's newest interactions, newest first.
async fn recent(
    State(state): State<AppState>,
    Json(req): Json<RecentRequest>,
) -> AppResult<ApiResponse<Vec<interaction_event::Model>>> {
    validate_user_id(req.user_id)?;
    let limit = req.limit.clamp(1, 100);

    let events: Vec<interaction_event::Model> = state
        .interaction_service
        .stream(req.user_id, limit)
        .await?
        .try_collect()
        .await?;
    Ok(ApiResponse::ok(events))
}

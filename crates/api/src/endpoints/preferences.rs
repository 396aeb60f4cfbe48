//! Preference endpoints.

use axum::{Json, Router, extract::State, routing::post};
use pulse_common::AppResult;
use pulse_core::UserPreferences;
use serde::Deserialize;

use crate::{middleware::AppState, response::ApiResponse};

/// Create the preferences router.
pub fn router() -> Router<AppState> {
    Router::new().route("/", post(get_preferences))
}

/// Preferences request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesRequest {
    #[serde(default)]
    pub user_id: i64,
}

/// Compute a user's tag affinities and preferred creators.
async fn get_preferences(
    State(state): State<AppState>,
    Json(req): Json<PreferencesRequest>,
) -> AppResult<ApiResponse<UserPreferences>> {
    let prefs = state.preference_service.compute(req.user_id).await?;
    Ok(ApiResponse::ok(prefs))
}

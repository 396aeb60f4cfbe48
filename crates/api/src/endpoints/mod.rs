//! API endpoints.

mod discovery;
mod interactions;
mod metrics;
mod preferences;
mod search;
mod tags;

use axum::Router;

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(discovery::router())
        .nest("/search", search::router())
        .nest("/interactions", interactions::router())
        .nest("/preferences", preferences::router())
        .nest("/tags", tags::router())
        .nest("/metrics", metrics::router())
}

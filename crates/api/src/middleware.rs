//! API middleware and shared state.

#![allow(missing_docs)]

use axum::{Router, body::Body, http::Request, middleware::Next, response::Response};
use pulse_common::{Timer, get_metrics};
use pulse_core::{
    DiscoveryService, InteractionService, PreferenceService, SearchService, TagTrendService,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::endpoints::router;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub search_service: SearchService,
    pub discovery_service: DiscoveryService,
    pub interaction_service: InteractionService,
    pub preference_service: PreferenceService,
    pub tag_trend_service: TagTrendService,
}

/// Request metrics middleware.
pub async fn metrics_middleware(req: Request<Body>, next: Next) -> Response {
    let timer = Timer::start();
    let response = next.run(req).await;
    get_metrics().record_http_request(response.status().as_u16(), timer.elapsed());
    response
}

/// The full application: `/api` routes with tracing, CORS and request metrics.
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api", router())
        .layer(axum::middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

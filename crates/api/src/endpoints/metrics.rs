//! Metrics endpoints for monitoring and observability.
//!
//! Provides endpoints for:
//! - JSON counters
//! - Prometheus metrics export
//! - Health checks

use axum::{
    Json, Router,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use pulse_common::metrics::{MetricsSnapshot, get_metrics};
use serde::Serialize;

use crate::middleware::AppState;

/// Create the metrics router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_metrics_json))
        .route("/prometheus", get(get_metrics_prometheus))
        .route("/health", get(health_check))
}

/// JSON metrics response.
#[derive(Serialize)]
pub struct MetricsResponse {
    pub http: HttpMetrics,
    pub database: DatabaseMetrics,
    pub feeds: FeedMetrics,
    pub signals: SignalMetrics,
    pub maintenance: MaintenanceMetrics,
}

#[derive(Serialize)]
pub struct HttpMetrics {
    pub requests_total: u64,
    pub requests_2xx: u64,
    pub requests_4xx: u64,
    pub requests_5xx: u64,
    pub latency_avg_us: u64,
}

#[derive(Serialize)]
pub struct DatabaseMetrics {
    pub errors_total: u64,
}

#[derive(Serialize)]
pub struct FeedMetrics {
    pub searches_total: u64,
    pub search_avg_time_us: u64,
    pub discoveries_total: u64,
    pub recommendations_total: u64,
    pub validation_failures_total: u64,
    pub partial_results_total: u64,
}

#[derive(Serialize)]
pub struct SignalMetrics {
    pub interactions_recorded: u64,
    pub metrics_refreshes: u64,
    pub metrics_refresh_failures: u64,
}

#[derive(Serialize)]
pub struct MaintenanceMetrics {
    pub interactions_purged: u64,
    pub time_boxed_runs: u64,
}

impl From<MetricsSnapshot> for MetricsResponse {
    fn from(s: MetricsSnapshot) -> Self {
        Self {
            http: HttpMetrics {
                requests_total: s.http_requests_total,
                requests_2xx: s.http_requests_2xx,
                requests_4xx: s.http_requests_4xx,
                requests_5xx: s.http_requests_5xx,
                latency_avg_us: s.http_request_latency_avg_us,
            },
            database: DatabaseMetrics {
                errors_total: s.db_errors_total,
            },
            feeds: FeedMetrics {
                searches_total: s.searches_total,
                search_avg_time_us: s.search_avg_time_us,
                discoveries_total: s.discoveries_total,
                recommendations_total: s.recommendations_total,
                validation_failures_total: s.validation_failures_total,
                partial_results_total: s.partial_results_total,
            },
            signals: SignalMetrics {
                interactions_recorded: s.interactions_recorded,
                metrics_refreshes: s.metrics_refreshes,
                metrics_refresh_failures: s.metrics_refresh_failures,
            },
            maintenance: MaintenanceMetrics {
                interactions_purged: s.interactions_purged,
                time_boxed_runs: s.maintenance_time_boxed,
            },
        }
    }
}

/// Get metrics in JSON format.
async fn get_metrics_json() -> Json<MetricsResponse> {
    let snapshot = get_metrics().snapshot();
    Json(MetricsResponse::from(snapshot))
}

/// Get metrics in Prometheus text format.
async fn get_metrics_prometheus() -> Response {
    let prometheus_output = get_metrics().to_prometheus();

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        prometheus_output,
    )
        .into_response()
}

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Simple health check (liveness probe).
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

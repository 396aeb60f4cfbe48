//! API integration tests.
//!
//! These tests drive the full router against a mock database.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use pulse_api::{AppState, app};
use pulse_common::IdGenerator;
use pulse_common::config::RankingConfig;
use pulse_core::{
    DiscoveryService, InteractionService, PostMetricsService, PreferenceService, SearchService,
    TagTrendService,
};
use pulse_db::repositories::{
    CommentRepository, InteractionRepository, LikeRepository, PostMetricsRepository,
    PostRepository, UserRepository,
};
use sea_orm::{DatabaseBackend, MockDatabase, Value};
use serde_json::Value as Json;
use tower::ServiceExt;

/// Create test app state over a mock database.
fn create_test_state(db: MockDatabase) -> AppState {
    let db = Arc::new(db.into_connection());
    let ranking = RankingConfig::default();

    let post_repo = PostRepository::new(Arc::clone(&db));
    let user_repo = UserRepository::new(Arc::clone(&db));
    let like_repo = LikeRepository::new(Arc::clone(&db));
    let comment_repo = CommentRepository::new(Arc::clone(&db));
    let interaction_repo = InteractionRepository::new(Arc::clone(&db));
    let metrics_repo = PostMetricsRepository::new(Arc::clone(&db));

    let post_metrics_service = PostMetricsService::new(
        post_repo.clone(),
        interaction_repo.clone(),
        like_repo.clone(),
        comment_repo,
        metrics_repo.clone(),
        ranking.share_weight,
    );
    let preference_service = PreferenceService::new(
        interaction_repo.clone(),
        like_repo.clone(),
        ranking.preference_window_days,
        ranking.preferred_creator_limit,
    );
    let search_service = SearchService::new(
        post_repo.clone(),
        user_repo,
        post_metrics_service.clone(),
        preference_service.clone(),
        ranking.clone(),
    );
    let discovery_service = DiscoveryService::new(
        search_service.clone(),
        post_repo.clone(),
        like_repo,
        interaction_repo.clone(),
        metrics_repo,
        ranking.recommend_page_size,
    );
    let interaction_service = InteractionService::new(
        interaction_repo,
        post_repo.clone(),
        post_metrics_service,
        IdGenerator::new(),
    );
    let tag_trend_service = TagTrendService::new(post_repo, ranking.min_trending_posts);

    AppState {
        search_service,
        discovery_service,
        interaction_service,
        preference_service,
        tag_trend_service,
    }
}

fn create_test_app(db: MockDatabase) -> Router {
    app(create_test_state(db))
}

fn empty_db() -> MockDatabase {
    MockDatabase::new(DatabaseBackend::Postgres)
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("POST")
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Json {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn tag_usage_row(
    tag: &str,
    posts: i64,
    oldest: chrono::DateTime<Utc>,
) -> std::collections::BTreeMap<&'static str, Value> {
    let mut row = std::collections::BTreeMap::new();
    row.insert("tag", Value::String(Some(Box::new(tag.to_string()))));
    row.insert("posts_count", Value::BigInt(Some(posts)));
    row.insert(
        "oldest_created_at",
        Value::ChronoDateTimeWithTimeZone(Some(Box::new(oldest.into()))),
    );
    row
}

#[tokio::test]
async fn test_search_with_invalid_user_returns_validation_error() {
    let app = create_test_app(empty_db());

    let response = app
        .oneshot(post_json("/api/search/posts", r#"{"userId":0,"query":"yoga"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_search_normalizes_oversized_limit() {
    let mut count = std::collections::BTreeMap::new();
    count.insert("num_items", Value::BigInt(Some(0)));
    let db = empty_db().append_query_results([[count]]);
    let app = create_test_app(db);

    let response = app
        .oneshot(post_json(
            "/api/search/posts",
            r#"{"userId":4,"limit":500,"offset":-3,"tags":["Art","unknown"],"sort":"bogus"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let filters = &body["data"]["appliedFilters"];
    assert_eq!(filters["limit"], 20);
    assert_eq!(filters["offset"], 0);
    assert_eq!(filters["tags"], serde_json::json!(["art"]));
    assert_eq!(filters["sort"], "recent");
    assert_eq!(body["data"]["total"], 0);
    assert_eq!(body["data"]["hasMore"], false);
}

#[tokio::test]
async fn test_discover_with_invalid_user_returns_validation_error() {
    let app = create_test_app(empty_db());

    let response = app
        .oneshot(post_json("/api/discover", r#"{"userId":-5}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_recommend_without_history_returns_empty_feed() {
    let empty_ids: Vec<std::collections::BTreeMap<&str, Value>> = Vec::new();
    let db = empty_db()
        .append_query_results([empty_ids.clone()])
        .append_query_results([empty_ids.clone()])
        .append_query_results([empty_ids.clone()])
        .append_query_results([empty_ids]);
    let app = create_test_app(db);

    let response = app
        .oneshot(post_json("/api/recommend", r#"{"userId":4}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["posts"], serde_json::json!([]));
    assert_eq!(body["data"]["hasMore"], false);
}

#[tokio::test]
async fn test_preferences_rejects_missing_user() {
    let app = create_test_app(empty_db());

    let response = app
        .oneshot(post_json("/api/preferences", "{}"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_trending_tags_defaults_to_week() {
    let db = empty_db().append_query_results([vec![tag_usage_row(
        "tech",
        5,
        Utc::now() - Duration::days(2),
    )]]);
    let app = create_test_app(db);

    let response = app
        .oneshot(post_json("/api/tags/trending", r#"{"period":"decade"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"][0]["tag"], "tech");
    assert_eq!(body["data"][0]["growthRate"], 2.5);
    assert_eq!(body["data"][0]["period"], "week");
}

#[tokio::test]
async fn test_track_with_invalid_json_returns_error() {
    let app = create_test_app(empty_db());

    let response = app
        .oneshot(post_json("/api/interactions", "invalid json"))
        .await
        .unwrap();

    assert!(
        response.status() == StatusCode::BAD_REQUEST
            || response.status() == StatusCode::UNPROCESSABLE_ENTITY
    );
}

#[tokio::test]
async fn test_track_with_unknown_type_is_rejected() {
    let app = create_test_app(empty_db());

    let response = app
        .oneshot(post_json(
            "/api/interactions",
            r#"{"userId":1,"interactionType":"bookmark","contentType":"post","contentId":3}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app(empty_db());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/metrics/health")
                .method("GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_prometheus_endpoint_is_plain_text() {
    let app = create_test_app(empty_db());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/metrics/prometheus")
                .method("GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
}

#[tokio::test]
async fn test_unknown_endpoint_returns_404() {
    let app = create_test_app(empty_db());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/nonexistent")
                .method("GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

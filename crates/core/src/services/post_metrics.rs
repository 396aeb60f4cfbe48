//! Post metrics service (popularity and trending scores).

use std::collections::HashMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use pulse_common::{AppResult, get_metrics};
use pulse_db::entities::interaction_event::InteractionType;
use pulse_db::entities::post_metrics;
use pulse_db::repositories::{
    CommentRepository, InteractionRepository, LikeRepository, PostMetricsRepository, PostRepository,
};
use tracing::{debug, warn};

const LIKE_WEIGHT: f64 = 1.0;
const COMMENT_WEIGHT: f64 = 2.0;
const VIEW_WEIGHT: f64 = 0.1;

/// `likes*1.0 + comments*2.0 + views*0.1 + shares*share_weight`.
#[must_use]
pub fn popularity_score(likes: i64, comments: i64, views: i64, shares: i64, share_weight: f64) -> f64 {
    likes as f64 * LIKE_WEIGHT
        + comments as f64 * COMMENT_WEIGHT
        + views as f64 * VIEW_WEIGHT
        + shares as f64 * share_weight
}

/// Popularity decayed by age: `popularity / (1 + hours/24)`.
#[must_use]
pub fn trending_score(popularity: f64, hours_since_creation: f64) -> f64 {
    popularity / (1.0 + hours_since_creation.max(0.0) / 24.0)
}

/// Outcome of a batch recompute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecomputeReport {
    pub refreshed: u64,
    pub failed: u64,
    /// The deadline passed before every post was visited.
    pub time_boxed: bool,
}

/// Post metrics service for business logic.
#[derive(Clone)]
pub struct PostMetricsService {
    post_repo: PostRepository,
    interaction_repo: InteractionRepository,
    like_repo: LikeRepository,
    comment_repo: CommentRepository,
    metrics_repo: PostMetricsRepository,
    share_weight: f64,
}

impl PostMetricsService {
    /// Create a new post metrics service.
    #[must_use]
    pub const fn new(
        post_repo: PostRepository,
        interaction_repo: InteractionRepository,
        like_repo: LikeRepository,
        comment_repo: CommentRepository,
        metrics_repo: PostMetricsRepository,
        share_weight: f64,
    ) -> Self {
        Self {
            post_repo,
            interaction_repo,
            like_repo,
            comment_repo,
            metrics_repo,
            share_weight,
        }
    }

    /// Recount a post and overwrite its stored metrics.
    ///
    /// The reference instant is the wall clock, so counts and popularity are
    /// stable across calls while `trending_score` and `last_updated` move
    /// with time. Use [`Self::refresh_at`] for a fixed instant.
    pub async fn refresh(&self, post_id: i64) -> AppResult<post_metrics::Model> {
        self.refresh_at(post_id, Utc::now()).await
    }

    /// Recount a post relative to `now`.
    ///
    /// Counts come from their sources of truth and the row is written with a
    /// single upsert, so repeated calls for the same `now` store the same row.
    pub async fn refresh_at(&self, post_id: i64, now: DateTime<Utc>) -> AppResult<post_metrics::Model> {
        let post = self.post_repo.get_by_id(post_id).await?;

        let views = self
            .interaction_repo
            .count_for_post(post_id, InteractionType::View, None)
            .await?;
        let shares = self
            .interaction_repo
            .count_for_post(post_id, InteractionType::Share, None)
            .await?;
        let likes = self.like_repo.count_for_post(post_id).await?;
        let comments = self.comment_repo.count_for_post(post_id).await?;

        let (views, shares, likes, comments) =
            (views as i64, shares as i64, likes as i64, comments as i64);

        let popularity = popularity_score(likes, comments, views, shares, self.share_weight);
        let hours = (now - post.created_at.with_timezone(&Utc)).num_seconds() as f64 / 3600.0;

        let metrics = post_metrics::Model {
            post_id,
            views_count: views,
            likes_count: likes,
            comments_count: comments,
            shares_count: shares,
            popularity_score: popularity,
            trending_score: trending_score(popularity, hours),
            last_updated: now.into(),
        };

        self.metrics_repo.upsert(metrics.clone()).await?;
        debug!(post_id, popularity, "Refreshed post metrics");

        Ok(metrics)
    }

    /// Stored metrics, or a zero record for a post never scored.
    pub async fn get(&self, post_id: i64) -> AppResult<post_metrics::Model> {
        Ok(self
            .metrics_repo
            .find(post_id)
            .await?
            .unwrap_or_else(|| post_metrics::Model::zero(post_id, Utc::now().into())))
    }

    /// Metrics for every requested post; unscored posts get a zero record.
    pub async fn get_many(&self, post_ids: &[i64]) -> AppResult<HashMap<i64, post_metrics::Model>> {
        let mut found: HashMap<i64, post_metrics::Model> = self
            .metrics_repo
            .find_by_post_ids(post_ids)
            .await?
            .into_iter()
            .map(|m| (m.post_id, m))
            .collect();

        let now = Utc::now();
        for id in post_ids {
            found
                .entry(*id)
                .or_insert_with(|| post_metrics::Model::zero(*id, now.into()));
        }
        Ok(found)
    }

    /// Refresh every post in ID order, `batch_size` at a time, until done or
    /// `deadline` passes. Individual failures are logged and counted.
    pub async fn recompute_all(&self, batch_size: u64, deadline: Instant) -> AppResult<RecomputeReport> {
        let mut report = RecomputeReport::default();
        let mut cursor = None;

        loop {
            let ids = self.post_repo.ids_after(cursor, batch_size.max(1)).await?;
            let Some(&last) = ids.last() else {
                break;
            };

            let now = Utc::now();
            for id in ids {
                if Instant::now() >= deadline {
                    report.time_boxed = true;
                    return Ok(report);
                }
                match self.refresh_at(id, now).await {
                    Ok(_) => {
                        report.refreshed += 1;
                        get_metrics().record_metrics_refresh(true);
                    }
                    Err(e) => {
                        report.failed += 1;
                        get_metrics().record_metrics_refresh(false);
                        warn!(post_id = id, error = %e, "Failed to refresh post metrics");
                    }
                }
            }
            cursor = Some(last);
        }

        Ok(report)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pulse_common::AppError;
    use pulse_db::entities::post;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::sync::Arc;

    fn create_test_post(id: i64, created_at: DateTime<Utc>) -> post::Model {
        post::Model {
            id,
            user_id: 1,
            title: "Sunset timelapse".to_string(),
            description: None,
            media_url: None,
            visibility: post::Visibility::Public,
            created_at: created_at.into(),
            updated_at: None,
        }
    }

    fn count_row(n: i64) -> std::collections::BTreeMap<&'static str, sea_orm::Value> {
        maplit::btreemap! { "num_items" => sea_orm::Value::BigInt(Some(n)) }
    }

    fn service(db: sea_orm::DatabaseConnection) -> PostMetricsService {
        let db = Arc::new(db);
        PostMetricsService::new(
            PostRepository::new(db.clone()),
            InteractionRepository::new(db.clone()),
            LikeRepository::new(db.clone()),
            CommentRepository::new(db.clone()),
            PostMetricsRepository::new(db),
            0.0,
        )
    }

    /// Mock answers for one refresh: post, views, shares, likes, comments, upsert.
    fn with_refresh(mock: MockDatabase, post: &post::Model, counts: [i64; 4]) -> MockDatabase {
        mock.append_query_results([[post.clone()]])
            .append_query_results([[count_row(counts[0])]])
            .append_query_results([[count_row(counts[1])]])
            .append_query_results([[count_row(counts[2])]])
            .append_query_results([[count_row(counts[3])]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
    }

    #[test]
    fn test_popularity_formula_is_exact() {
        assert_eq!(popularity_score(3, 2, 10, 0, 0.0), 3.0 + 4.0 + 1.0);
        assert_eq!(popularity_score(0, 0, 0, 0, 0.0), 0.0);
        // Shares only count when weighted.
        assert_eq!(popularity_score(1, 0, 0, 5, 0.0), 1.0);
        assert_eq!(popularity_score(1, 0, 0, 5, 0.5), 3.5);
    }

    #[test]
    fn test_trending_equals_popularity_when_new() {
        assert_eq!(trending_score(42.0, 0.0), 42.0);
        assert_eq!(trending_score(42.0, 24.0), 21.0);
    }

    #[test]
    fn test_trending_strictly_decreasing_in_age() {
        let mut previous = trending_score(10.0, 0.0);
        for hours in [1.0, 6.0, 24.0, 72.0, 500.0] {
            let current = trending_score(10.0, hours);
            assert!(current < previous);
            previous = current;
        }
    }

    #[tokio::test]
    async fn test_refresh_computes_scores() {
        let now = Utc::now();
        let post = create_test_post(5, now - Duration::hours(24));
        // views, shares, likes, comments
        let mock = with_refresh(MockDatabase::new(DatabaseBackend::Postgres), &post, [10, 4, 3, 2]);

        let metrics = service(mock.into_connection()).refresh_at(5, now).await.unwrap();

        assert_eq!(metrics.views_count, 10);
        assert_eq!(metrics.shares_count, 4);
        assert_eq!(metrics.likes_count, 3);
        assert_eq!(metrics.comments_count, 2);
        assert!((metrics.popularity_score - 8.0).abs() < 1e-9);
        assert!((metrics.trending_score - 4.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_refresh_is_idempotent() {
        let now = Utc::now();
        let post = create_test_post(5, now - Duration::hours(3));
        let mock = MockDatabase::new(DatabaseBackend::Postgres);
        let mock = with_refresh(mock, &post, [7, 0, 2, 1]);
        let mock = with_refresh(mock, &post, [7, 0, 2, 1]);

        let service = service(mock.into_connection());
        let first = service.refresh_at(5, now).await.unwrap();
        let second = service.refresh_at(5, now).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_wall_clock_refresh_keeps_counts_and_popularity() {
        let post = create_test_post(5, Utc::now() - Duration::hours(3));
        let mock = MockDatabase::new(DatabaseBackend::Postgres);
        let mock = with_refresh(mock, &post, [7, 0, 2, 1]);
        let mock = with_refresh(mock, &post, [7, 0, 2, 1]);

        let service = service(mock.into_connection());
        let first = service.refresh(5).await.unwrap();
        let second = service.refresh(5).await.unwrap();

        assert_eq!(
            (first.views_count, first.likes_count, first.comments_count),
            (second.views_count, second.likes_count, second.comments_count)
        );
        assert_eq!(first.popularity_score, second.popularity_score);
        assert!(second.trending_score <= first.trending_score);
        assert!(second.last_updated >= first.last_updated);
    }

    #[tokio::test]
    async fn test_refresh_unknown_post() {
        let mock = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<post::Model>::new()]);

        let result = service(mock.into_connection()).refresh(404).await;
        assert!(matches!(result, Err(AppError::PostNotFound(404))));
    }

    #[tokio::test]
    async fn test_get_unscored_returns_zero_record() {
        let mock = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<post_metrics::Model>::new()]);

        let metrics = service(mock.into_connection()).get(8).await.unwrap();
        assert_eq!(metrics.post_id, 8);
        assert_eq!(metrics.popularity_score, 0.0);
        assert_eq!(metrics.views_count, 0);
    }

    #[tokio::test]
    async fn test_get_many_fills_missing() {
        let stored = post_metrics::Model {
            likes_count: 3,
            popularity_score: 3.0,
            ..post_metrics::Model::zero(1, Utc::now().into())
        };
        let mock = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[stored]]);

        let metrics = service(mock.into_connection()).get_many(&[1, 2]).await.unwrap();
        assert_eq!(metrics[&1].likes_count, 3);
        assert_eq!(metrics[&2].popularity_score, 0.0);
    }

    #[tokio::test]
    async fn test_recompute_all_stops_at_deadline() {
        let mock = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([vec![
            maplit::btreemap! { "id" => sea_orm::Value::BigInt(Some(1)) },
            maplit::btreemap! { "id" => sea_orm::Value::BigInt(Some(2)) },
        ]]);

        let report = service(mock.into_connection())
            .recompute_all(10, Instant::now())
            .await
            .unwrap();

        assert!(report.time_boxed);
        assert_eq!(report.refreshed, 0);
    }

    #[tokio::test]
    async fn test_recompute_all_visits_every_post() {
        let now = Utc::now();
        let post = create_test_post(1, now);
        let mock = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([vec![
            maplit::btreemap! { "id" => sea_orm::Value::BigInt(Some(1)) },
        ]]);
        let mock = with_refresh(mock, &post, [0, 0, 1, 0]).append_query_results([Vec::<
            std::collections::BTreeMap<&'static str, sea_orm::Value>,
        >::new()]);

        let report = service(mock.into_connection())
            .recompute_all(1, Instant::now() + std::time::Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(report.refreshed, 1);
        assert_eq!(report.failed, 0);
        assert!(!report.time_boxed);
    }
}

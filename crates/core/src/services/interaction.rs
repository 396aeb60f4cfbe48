//! Interaction tracking service.

use chrono::{DateTime, Utc};
use futures::Stream;
use pulse_common::{AppResult, IdGenerator, get_metrics};
use pulse_db::entities::interaction_event::{self, CONTENT_TYPE_POST, CONTENT_TYPE_TAG, InteractionType};
use pulse_db::repositories::{InteractionRepository, PostRepository};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use validator::Validate;

use super::post_metrics::PostMetricsService;

/// Interaction service for business logic.
#[derive(Clone)]
pub struct InteractionService {
    interaction_repo: InteractionRepository,
    post_repo: PostRepository,
    post_metrics: PostMetricsService,
    id_gen: IdGenerator,
}

/// Input for tracking a user action.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TrackInteractionInput {
    #[validate(range(min = 1, message = "userId must be a positive integer"))]
    pub user_id: i64,

    pub interaction_type: InteractionType,

    #[validate(length(min = 1, max = 32))]
    pub content_type: String,

    pub content_id: Option<i64>,

    #[validate(length(max = 256))]
    pub content_meta: Option<String>,
}

/// Result of tracking an interaction.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedInteraction {
    pub event: interaction_event::Model,
    /// Tag-level events appended alongside the primary event.
    pub tag_events: u64,
}

impl InteractionService {
    /// Create a new interaction service.
    #[must_use]
    pub const fn new(
        interaction_repo: InteractionRepository,
        post_repo: PostRepository,
        post_metrics: PostMetricsService,
        id_gen: IdGenerator,
    ) -> Self {
        Self {
            interaction_repo,
            post_repo,
            post_metrics,
            id_gen,
        }
    }

    fn event(
        &self,
        user_id: i64,
        interaction_type: InteractionType,
        content_type: &str,
        content_id: Option<i64>,
        content_meta: Option<String>,
    ) -> interaction_event::ActiveModel {
        interaction_event::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(user_id),
            interaction_type: Set(interaction_type),
            content_type: Set(content_type.to_string()),
            content_id: Set(content_id),
            content_meta: Set(content_meta),
            score: Set(interaction_type.weight()),
            created_at: Set(Utc::now().into()),
        }
    }

    /// Append one event, scored with the type's fixed weight.
    pub async fn record(
        &self,
        user_id: i64,
        interaction_type: InteractionType,
        content_type: &str,
        content_id: Option<i64>,
        content_meta: Option<String>,
    ) -> AppResult<interaction_event::Model> {
        let model = self.event(user_id, interaction_type, content_type, content_id, content_meta);
        self.interaction_repo.create(model).await
    }

    /// Track a user action.
    ///
    /// Actions on a post also append one tag-level event per post tag and
    /// refresh the post's metrics. Neither the tag lookup nor the refresh can
    /// fail the call once the primary event is stored.
    pub async fn track(&self, input: TrackInteractionInput) -> AppResult<TrackedInteraction> {
        if let Err(e) = input.validate() {
            get_metrics().record_validation_failure();
            return Err(e.into());
        }

        let event = self
            .record(
                input.user_id,
                input.interaction_type,
                &input.content_type,
                input.content_id,
                input.content_meta,
            )
            .await?;

        let mut tag_events = 0;
        if let (CONTENT_TYPE_POST, Some(post_id)) = (event.content_type.as_str(), event.content_id) {
            tag_events = self.fan_out_tags(&event, post_id).await;

            if event.interaction_type.affects_post_metrics() {
                match self.post_metrics.refresh(post_id).await {
                    Ok(_) => get_metrics().record_metrics_refresh(true),
                    Err(e) => {
                        get_metrics().record_metrics_refresh(false);
                        warn!(post_id, error = %e, "Post metrics refresh failed after interaction");
                    }
                }
            }
        }

        get_metrics().record_interactions(1 + tag_events);
        debug!(
            user_id = event.user_id,
            interaction_type = ?event.interaction_type,
            tag_events,
            "Tracked interaction"
        );

        Ok(TrackedInteraction { event, tag_events })
    }

    async fn fan_out_tags(&self, event: &interaction_event::Model, post_id: i64) -> u64 {
        let tags = match self.post_repo.tags_for_post(post_id).await {
            Ok(tags) => tags,
            Err(e) => {
                get_metrics().record_partial_result();
                warn!(post_id, error = %e, "Could not load post tags, skipping tag events");
                return 0;
            }
        };

        let models = tags
            .into_iter()
            .map(|tag| {
                self.event(
                    event.user_id,
                    event.interaction_type,
                    CONTENT_TYPE_TAG,
                    None,
                    Some(tag.as_str().to_string()),
                )
            })
            .collect();

        match self.interaction_repo.create_many(models).await {
            Ok(inserted) => inserted,
            Err(e) => {
                get_metrics().record_partial_result();
                warn!(post_id, error = %e, "Could not store tag events");
                0
            }
        }
    }

    /// The newest `limit` events of a user, newest first.
    pub async fn query(&self, user_id: i64, limit: u64) -> AppResult<Vec<interaction_event::Model>> {
        self.interaction_repo.find_recent(user_id, limit).await
    }

    /// Lazy variant of [`Self::query`].
    pub async fn stream(
        &self,
        user_id: i64,
        limit: u64,
    ) -> AppResult<impl Stream<Item = AppResult<interaction_event::Model>> + Send + '_> {
        self.interaction_repo.stream_recent(user_id, limit).await
    }

    /// Delete events created before `older_than`. Returns rows removed.
    pub async fn purge(&self, older_than: DateTime<Utc>) -> AppResult<u64> {
        let removed = self.interaction_repo.purge_older_than(older_than.into()).await?;
        get_metrics().record_purge(removed);
        info!(removed, cutoff = %older_than, "Purged interaction events");
        Ok(removed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pulse_common::AppError;
    use pulse_db::entities::post;
    use pulse_db::repositories::{CommentRepository, LikeRepository, PostMetricsRepository};
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult};
    use std::sync::Arc;

    fn service(db: DatabaseConnection) -> InteractionService {
        let db = Arc::new(db);
        let post_repo = PostRepository::new(db.clone());
        let interaction_repo = InteractionRepository::new(db.clone());
        let metrics = PostMetricsService::new(
            post_repo.clone(),
            interaction_repo.clone(),
            LikeRepository::new(db.clone()),
            CommentRepository::new(db.clone()),
            PostMetricsRepository::new(db),
            0.0,
        );
        InteractionService::new(interaction_repo, post_repo, metrics, IdGenerator::new())
    }

    fn stored_event(
        interaction_type: InteractionType,
        content_type: &str,
        content_id: Option<i64>,
    ) -> interaction_event::Model {
        interaction_event::Model {
            id: "01j9zqv8m4k2x7d3f5h6n8p0r1".to_string(),
            user_id: 7,
            interaction_type,
            content_type: content_type.to_string(),
            content_id,
            content_meta: None,
            score: interaction_type.weight(),
            created_at: Utc::now().into(),
        }
    }

    fn input(interaction_type: InteractionType, content_type: &str, content_id: Option<i64>) -> TrackInteractionInput {
        TrackInteractionInput {
            user_id: 7,
            interaction_type,
            content_type: content_type.to_string(),
            content_id,
            content_meta: None,
        }
    }

    #[tokio::test]
    async fn test_track_rejects_non_positive_user() {
        // No query results: any store access would fail the test.
        let service = service(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let mut bad = input(InteractionType::View, "post", Some(1));
        bad.user_id = 0;

        let result = service.track(bad).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_track_non_post_content() {
        let event = stored_event(InteractionType::ProfileView, "user", Some(3));
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[event.clone()]])
            .into_connection();

        let tracked = service(db)
            .track(input(InteractionType::ProfileView, "user", Some(3)))
            .await
            .unwrap();

        assert_eq!(tracked.event, event);
        assert_eq!(tracked.tag_events, 0);
    }

    #[tokio::test]
    async fn test_track_post_fans_out_tags_and_survives_refresh_failure() {
        let event = stored_event(InteractionType::Like, "post", Some(9));
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[event.clone()]])
            .append_query_results([vec![
                maplit::btreemap! { "tag" => sea_orm::Value::String(Some(Box::new("art".to_string()))) },
                maplit::btreemap! { "tag" => sea_orm::Value::String(Some(Box::new("music".to_string()))) },
            ]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 2,
            }])
            // Refresh finds no post.
            .append_query_results([Vec::<post::Model>::new()])
            .into_connection();

        let tracked = service(db)
            .track(input(InteractionType::Like, "post", Some(9)))
            .await
            .unwrap();

        assert_eq!(tracked.event.score, 1.0);
        assert_eq!(tracked.tag_events, 2);
    }

    #[tokio::test]
    async fn test_track_survives_tag_event_insert_failure() {
        let event = stored_event(InteractionType::View, "post", Some(9));
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[event.clone()]])
                .append_query_results([vec![
                    maplit::btreemap! { "tag" => sea_orm::Value::String(Some(Box::new("art".to_string()))) },
                ]])
                .append_exec_errors([sea_orm::DbErr::Custom("tag insert failed".to_string())])
                .append_query_results([Vec::<post::Model>::new()])
                .into_connection(),
        );
        let post_repo = PostRepository::new(db.clone());
        let interaction_repo = InteractionRepository::new(db.clone());
        let metrics = PostMetricsService::new(
            post_repo.clone(),
            interaction_repo.clone(),
            LikeRepository::new(db.clone()),
            CommentRepository::new(db.clone()),
            PostMetricsRepository::new(db.clone()),
            0.0,
        );
        let service = InteractionService::new(interaction_repo, post_repo, metrics, IdGenerator::new());

        let tracked = service
            .track(input(InteractionType::View, "post", Some(9)))
            .await
            .unwrap();
        drop(service);

        assert_eq!(tracked.event, event);
        assert_eq!(tracked.tag_events, 0);

        // Primary insert, tag lookup, failed tag insert, then the refresh's post lookup.
        let log = Arc::try_unwrap(db).ok().unwrap().into_transaction_log();
        assert_eq!(log.len(), 4);
        assert!(format!("{:?}", log[3]).contains("post"));
    }

    #[tokio::test]
    async fn test_record_uses_type_weight() {
        let event = stored_event(InteractionType::Share, "post", Some(2));
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[event]])
                .into_connection(),
        );
        let repo = InteractionRepository::new(db.clone());
        let post_repo = PostRepository::new(db.clone());
        let metrics = PostMetricsService::new(
            post_repo.clone(),
            repo.clone(),
            LikeRepository::new(db.clone()),
            CommentRepository::new(db.clone()),
            PostMetricsRepository::new(db.clone()),
            0.0,
        );
        let service = InteractionService::new(repo, post_repo, metrics, IdGenerator::new());

        service
            .record(7, InteractionType::Share, "post", Some(2), None)
            .await
            .unwrap();
        drop(service);

        let log = Arc::try_unwrap(db).ok().unwrap().into_transaction_log();
        let sql = format!("{:?}", log[0]);
        assert!(sql.contains("INSERT INTO"));
        assert!(sql.contains("Double(Some(3.0))"));
    }

    #[tokio::test]
    async fn test_purge_reports_rows() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 42,
            }])
            .into_connection();

        let removed = service(db)
            .purge(Utc::now() - chrono::Duration::days(90))
            .await
            .unwrap();
        assert_eq!(removed, 42);
    }
}

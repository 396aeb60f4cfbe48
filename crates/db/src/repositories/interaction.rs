//! Interaction event repository (append-only log).

use std::sync::Arc;

use crate::entities::interaction_event::{self, CONTENT_TYPE_POST, CONTENT_TYPE_TAG, InteractionType};
use crate::entities::InteractionEvent;
use futures::{Stream, StreamExt};
use pulse_common::{AppError, AppResult};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Select,
};

/// Interaction repository for database operations.
#[derive(Clone)]
pub struct InteractionRepository {
    db: Arc<DatabaseConnection>,
}

impl InteractionRepository {
    /// Create a new interaction repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Append a single event.
    pub async fn create(
        &self,
        model: interaction_event::ActiveModel,
    ) -> AppResult<interaction_event::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Append several events in one statement. Returns the number of rows written.
    pub async fn create_many(&self, models: Vec<interaction_event::ActiveModel>) -> AppResult<u64> {
        if models.is_empty() {
            return Ok(0);
        }

        let inserted = InteractionEvent::insert_many(models)
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(inserted)
    }

    fn recent_query(user_id: i64) -> Select<InteractionEvent> {
        InteractionEvent::find()
            .filter(interaction_event::Column::UserId.eq(user_id))
            .order_by_desc(interaction_event::Column::CreatedAt)
            .order_by_desc(interaction_event::Column::Id)
    }

    /// The newest `limit` events of a user, newest first.
    pub async fn find_recent(
        &self,
        user_id: i64,
        limit: u64,
    ) -> AppResult<Vec<interaction_event::Model>> {
        Self::recent_query(user_id)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Lazily stream the newest `limit` events of a user, newest first.
    pub async fn stream_recent(
        &self,
        user_id: i64,
        limit: u64,
    ) -> AppResult<impl Stream<Item = AppResult<interaction_event::Model>> + Send + '_> {
        let stream = Self::recent_query(user_id)
            .limit(limit)
            .stream(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(stream.map(|row| row.map_err(|e| AppError::Database(e.to_string()))))
    }

    /// Tag-level events of a user created at or after `since`.
    pub async fn tag_events_since(
        &self,
        user_id: i64,
        since: DateTimeWithTimeZone,
    ) -> AppResult<Vec<interaction_event::Model>> {
        InteractionEvent::find()
            .filter(interaction_event::Column::UserId.eq(user_id))
            .filter(interaction_event::Column::ContentType.eq(CONTENT_TYPE_TAG))
            .filter(interaction_event::Column::CreatedAt.gte(since))
            .order_by_desc(interaction_event::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count events of one type on a post, optionally only those since a point in time.
    pub async fn count_for_post(
        &self,
        post_id: i64,
        interaction_type: InteractionType,
        since: Option<DateTimeWithTimeZone>,
    ) -> AppResult<u64> {
        let mut query = InteractionEvent::find()
            .filter(interaction_event::Column::ContentType.eq(CONTENT_TYPE_POST))
            .filter(interaction_event::Column::ContentId.eq(post_id))
            .filter(interaction_event::Column::InteractionType.eq(interaction_type));

        if let Some(since) = since {
            query = query.filter(interaction_event::Column::CreatedAt.gte(since));
        }

        query
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Posts the user has viewed or liked.
    pub async fn seen_post_ids(&self, user_id: i64) -> AppResult<Vec<i64>> {
        let ids = InteractionEvent::find()
            .select_only()
            .column(interaction_event::Column::ContentId)
            .distinct()
            .filter(interaction_event::Column::UserId.eq(user_id))
            .filter(interaction_event::Column::ContentType.eq(CONTENT_TYPE_POST))
            .filter(
                interaction_event::Column::InteractionType
                    .is_in([InteractionType::View, InteractionType::Like]),
            )
            .filter(interaction_event::Column::ContentId.is_not_null())
            .into_tuple::<Option<i64>>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(ids.into_iter().flatten().collect())
    }

    /// Delete events created before `cutoff`. Returns the number of rows removed.
    pub async fn purge_older_than(&self, cutoff: DateTimeWithTimeZone) -> AppResult<u64> {
        let result = InteractionEvent::delete_many()
            .filter(interaction_event::Column::CreatedAt.lt(cutoff))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use futures::TryStreamExt;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_event(id: &str, user_id: i64, kind: InteractionType) -> interaction_event::Model {
        interaction_event::Model {
            id: id.to_string(),
            user_id,
            interaction_type: kind,
            content_type: CONTENT_TYPE_POST.to_string(),
            content_id: Some(1),
            content_meta: None,
            score: kind.weight(),
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_find_recent() {
        let events = vec![
            create_test_event("e2", 1, InteractionType::Like),
            create_test_event("e1", 1, InteractionType::View),
        ];

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([events])
                .into_connection(),
        );

        let repo = InteractionRepository::new(db);
        let found = repo.find_recent(1, 10).await.unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id, "e2");
        assert_eq!(found[0].score, 1.0);
    }

    #[tokio::test]
    async fn test_stream_recent_yields_rows_in_order() {
        let events = vec![
            create_test_event("e3", 1, InteractionType::Share),
            create_test_event("e2", 1, InteractionType::Comment),
        ];

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([events])
                .into_connection(),
        );

        let repo = InteractionRepository::new(db);
        let rows: Vec<_> = repo
            .stream_recent(1, 2)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "e3");
        assert_eq!(rows[1].interaction_type, InteractionType::Comment);
    }

    #[tokio::test]
    async fn test_create_many_empty_is_noop() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let repo = InteractionRepository::new(db);
        assert_eq!(repo.create_many(vec![]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_count_for_post() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(12))
                }]])
                .into_connection(),
        );

        let repo = InteractionRepository::new(db);
        let views = repo
            .count_for_post(1, InteractionType::View, None)
            .await
            .unwrap();

        assert_eq!(views, 12);
    }

    #[tokio::test]
    async fn test_seen_post_ids_skips_nulls() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![
                    maplit::btreemap! { "content_id" => sea_orm::Value::BigInt(Some(4)) },
                    maplit::btreemap! { "content_id" => sea_orm::Value::BigInt(None) },
                ]])
                .into_connection(),
        );

        let repo = InteractionRepository::new(db);
        assert_eq!(repo.seen_post_ids(1).await.unwrap(), vec![4]);
    }

    #[tokio::test]
    async fn test_purge_older_than() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 7,
                }])
                .into_connection(),
        );

        let repo = InteractionRepository::new(db);
        let removed = repo
            .purge_older_than((Utc::now() - Duration::days(90)).into())
            .await
            .unwrap();

        assert_eq!(removed, 7);
    }
}

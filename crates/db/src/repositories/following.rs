//! Following repository.

use std::sync::Arc;

use crate::entities::{Following, following};
use pulse_common::{AppError, AppResult};
use sea_orm::sea_query::{Query, SelectStatement};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect};

/// Following repository for database operations.
#[derive(Clone)]
pub struct FollowingRepository {
    db: Arc<DatabaseConnection>,
}

impl FollowingRepository {
    /// Create a new following repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Subquery selecting the IDs of creators a user follows.
    #[must_use]
    pub fn followees_query(follower_id: i64) -> SelectStatement {
        Query::select()
            .column(following::Column::FolloweeId)
            .from(following::Entity)
            .and_where(following::Column::FollowerId.eq(follower_id))
            .to_owned()
    }

    /// IDs of the creators a user follows.
    pub async fn followee_ids(&self, follower_id: i64) -> AppResult<Vec<i64>> {
        Following::find()
            .filter(following::Column::FollowerId.eq(follower_id))
            .select_only()
            .column(following::Column::FolloweeId)
            .into_tuple::<i64>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::sea_query::{PostgresQueryBuilder, QueryStatementWriter};
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_followee_ids() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![
                    maplit::btreemap! { "followee_id" => sea_orm::Value::BigInt(Some(2)) },
                    maplit::btreemap! { "followee_id" => sea_orm::Value::BigInt(Some(3)) },
                ]])
                .into_connection(),
        );

        let repo = FollowingRepository::new(db);
        let ids = repo.followee_ids(1).await.unwrap();

        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_followees_query_sql() {
        let sql = FollowingRepository::followees_query(5).to_string(PostgresQueryBuilder);
        assert_eq!(
            sql,
            r#"SELECT "followee_id" FROM "following" WHERE "following"."follower_id" = 5"#
        );
    }
}

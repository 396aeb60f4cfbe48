//! Subscription repository.

use std::sync::Arc;

use crate::entities::subscription::{self, SubscriptionStatus};
use crate::entities::Subscription;
use pulse_common::{AppError, AppResult};
use sea_orm::sea_query::{Expr, Query, SelectStatement};
use sea_orm::{ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};

/// Subscription repository for database operations.
#[derive(Clone)]
pub struct SubscriptionRepository {
    db: Arc<DatabaseConnection>,
}

impl SubscriptionRepository {
    /// Create a new subscription repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Condition matching subscriptions that currently grant access.
    fn active_condition() -> Condition {
        Condition::all()
            .add(subscription::Column::Status.eq(SubscriptionStatus::Active))
            .add(
                Condition::any()
                    .add(subscription::Column::ExpiresAt.is_null())
                    .add(Expr::col(subscription::Column::ExpiresAt).gt(Expr::current_timestamp())),
            )
    }

    /// Subquery selecting the creators a user holds an active subscription to.
    #[must_use]
    pub fn active_creators_query(subscriber_id: i64) -> SelectStatement {
        Query::select()
            .column(subscription::Column::CreatorId)
            .from(subscription::Entity)
            .and_where(subscription::Column::SubscriberId.eq(subscriber_id))
            .cond_where(Self::active_condition())
            .to_owned()
    }

    /// Check whether `subscriber_id` has an active subscription to `creator_id`.
    pub async fn is_active_subscriber(&self, subscriber_id: i64, creator_id: i64) -> AppResult<bool> {
        let count = Subscription::find()
            .filter(subscription::Column::SubscriberId.eq(subscriber_id))
            .filter(subscription::Column::CreatorId.eq(creator_id))
            .filter(Self::active_condition())
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(count > 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::sea_query::{PostgresQueryBuilder, QueryStatementWriter};
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_is_active_subscriber_true() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(1))
                }]])
                .into_connection(),
        );

        let repo = SubscriptionRepository::new(db);
        assert!(repo.is_active_subscriber(1, 2).await.unwrap());
    }

    #[tokio::test]
    async fn test_is_active_subscriber_false() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(0))
                }]])
                .into_connection(),
        );

        let repo = SubscriptionRepository::new(db);
        assert!(!repo.is_active_subscriber(1, 2).await.unwrap());
    }

    #[test]
    fn test_active_creators_query_checks_status_and_expiry() {
        let sql = SubscriptionRepository::active_creators_query(4)
            .to_string(PostgresQueryBuilder);

        assert!(sql.contains(r#""subscriber_id" = 4"#));
        assert!(sql.contains(r#""status" = 'active'"#));
        assert!(sql.contains(r#""expires_at" IS NULL"#));
        assert!(sql.contains("CURRENT_TIMESTAMP"));
    }
}

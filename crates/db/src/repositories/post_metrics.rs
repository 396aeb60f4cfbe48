//! Post metrics repository.

use std::sync::Arc;

use crate::entities::{PostMetrics, post_metrics};
use pulse_common::{AppError, AppResult};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder,
    QuerySelect,
};

/// Post metrics repository for database operations.
#[derive(Clone)]
pub struct PostMetricsRepository {
    db: Arc<DatabaseConnection>,
}

impl PostMetricsRepository {
    /// Create a new post metrics repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find the stored metrics of a post.
    pub async fn find(&self, post_id: i64) -> AppResult<Option<post_metrics::Model>> {
        PostMetrics::find_by_id(post_id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find stored metrics for several posts. Unscored posts are absent.
    pub async fn find_by_post_ids(&self, post_ids: &[i64]) -> AppResult<Vec<post_metrics::Model>> {
        if post_ids.is_empty() {
            return Ok(vec![]);
        }

        PostMetrics::find()
            .filter(post_metrics::Column::PostId.is_in(post_ids.to_vec()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert or overwrite the metrics row of a post in one statement.
    pub async fn upsert(&self, metrics: post_metrics::Model) -> AppResult<()> {
        PostMetrics::insert(metrics.into_active_model().reset_all())
            .on_conflict(
                OnConflict::column(post_metrics::Column::PostId)
                    .update_columns([
                        post_metrics::Column::ViewsCount,
                        post_metrics::Column::LikesCount,
                        post_metrics::Column::CommentsCount,
                        post_metrics::Column::SharesCount,
                        post_metrics::Column::PopularityScore,
                        post_metrics::Column::TrendingScore,
                        post_metrics::Column::LastUpdated,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    /// Most popular scored posts, excluding `exclude`.
    pub async fn popular_post_ids(&self, exclude: &[i64], limit: u64) -> AppResult<Vec<i64>> {
        let mut query = PostMetrics::find().filter(post_metrics::Column::PopularityScore.gt(0.0));

        if !exclude.is_empty() {
            query = query.filter(post_metrics::Column::PostId.is_not_in(exclude.to_vec()));
        }

        query
            .select_only()
            .column(post_metrics::Column::PostId)
            .order_by_desc(post_metrics::Column::PopularityScore)
            .order_by_desc(post_metrics::Column::PostId)
            .limit(limit)
            .into_tuple::<i64>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

//! Post like repository (like counts and like-derived signals).

use std::sync::Arc;

use crate::entities::post_tag::Category;
use crate::entities::{PostLike, PostTag, post, post_like, post_tag};
use pulse_common::{AppError, AppResult};
use sea_orm::sea_query::Query;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, JoinType, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait,
};

/// How many of a user's likes went to one creator.
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult)]
pub struct CreatorLikes {
    /// Author of the liked posts.
    pub creator_id: i64,
    /// Number of likes the user gave that author.
    pub like_count: i64,
}

/// Like repository for database operations.
#[derive(Clone)]
pub struct LikeRepository {
    db: Arc<DatabaseConnection>,
}

impl LikeRepository {
    /// Create a new like repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Count likes on a post.
    pub async fn count_for_post(&self, post_id: i64) -> AppResult<u64> {
        PostLike::find()
            .filter(post_like::Column::PostId.eq(post_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Creators whose posts the user liked most, by like count desc then creator ID.
    pub async fn top_liked_creators(&self, user_id: i64, limit: u64) -> AppResult<Vec<CreatorLikes>> {
        PostLike::find()
            .select_only()
            .column_as(post::Column::UserId, "creator_id")
            .column_as(post_like::Column::Id.count(), "like_count")
            .join(JoinType::InnerJoin, post_like::Relation::Post.def())
            .filter(post_like::Column::UserId.eq(user_id))
            .group_by(post::Column::UserId)
            .order_by_desc(post_like::Column::Id.count())
            .order_by_asc(post::Column::UserId)
            .limit(limit)
            .into_model::<CreatorLikes>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Distinct authors of posts the user has liked.
    pub async fn liked_creator_ids(&self, user_id: i64) -> AppResult<Vec<i64>> {
        PostLike::find()
            .select_only()
            .column(post::Column::UserId)
            .distinct()
            .join(JoinType::InnerJoin, post_like::Relation::Post.def())
            .filter(post_like::Column::UserId.eq(user_id))
            .into_tuple::<i64>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Distinct tags carried by posts the user has liked.
    pub async fn liked_tags(&self, user_id: i64) -> AppResult<Vec<Category>> {
        let liked_posts = Query::select()
            .column(post_like::Column::PostId)
            .from(post_like::Entity)
            .and_where(post_like::Column::UserId.eq(user_id))
            .to_owned();

        PostTag::find()
            .select_only()
            .column(post_tag::Column::Tag)
            .distinct()
            .filter(post_tag::Column::PostId.in_subquery(liked_posts))
            .into_tuple::<Category>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

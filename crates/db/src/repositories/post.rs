//! Post repository (post catalog and tag assignments).

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::entities::post_tag::Category;
use crate::entities::{Post, PostTag, post, post_tag};
use pulse_common::{AppError, AppResult};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::{Expr, Query, SelectStatement};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, FromQueryResult, JoinType, Order,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
};

/// Number of posts carrying a tag inside a time window.
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult)]
pub struct TagUsage {
    /// The tag.
    pub tag: Category,
    /// Distinct posts carrying the tag.
    pub posts_count: i64,
    /// Creation time of the oldest of those posts.
    pub oldest_created_at: DateTimeWithTimeZone,
}

/// Post repository for database operations.
#[derive(Clone)]
pub struct PostRepository {
    db: Arc<DatabaseConnection>,
}

impl PostRepository {
    /// Create a new post repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a post by ID.
    pub async fn find_by_id(&self, id: i64) -> AppResult<Option<post::Model>> {
        Post::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a post by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: i64) -> AppResult<post::Model> {
        self.find_by_id(id)
            .await?
            .ok_or(AppError::PostNotFound(id))
    }

    /// Fetch up to `cap` posts matching `condition`, newest first.
    pub async fn find_candidates(&self, condition: Condition, cap: u64) -> AppResult<Vec<post::Model>> {
        Post::find()
            .filter(condition)
            .order_by_desc(post::Column::CreatedAt)
            .order_by_desc(post::Column::Id)
            .limit(cap)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Number of posts matching `condition`.
    pub async fn count_matching(&self, condition: Condition) -> AppResult<u64> {
        Post::find()
            .filter(condition)
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// One page of posts matching `condition`, newest first.
    pub async fn page_by_recency(
        &self,
        condition: Condition,
        offset: u64,
        limit: u64,
    ) -> AppResult<Vec<post::Model>> {
        Post::find()
            .filter(condition)
            .order_by_desc(post::Column::CreatedAt)
            .order_by_desc(post::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// One page of posts matching `condition`, highest stored popularity
    /// first. Posts that were never scored count as zero.
    pub async fn page_by_popularity(
        &self,
        condition: Condition,
        offset: u64,
        limit: u64,
    ) -> AppResult<Vec<post::Model>> {
        Post::find()
            .join(JoinType::LeftJoin, post::Relation::PostMetrics.def())
            .filter(condition)
            .order_by(
                Expr::cust(r#"COALESCE("post_metrics"."popularity_score", 0)"#),
                Order::Desc,
            )
            .order_by_desc(post::Column::CreatedAt)
            .order_by_desc(post::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Post IDs in ascending order, starting after `after_id` (keyset paging).
    pub async fn ids_after(&self, after_id: Option<i64>, limit: u64) -> AppResult<Vec<i64>> {
        let mut query = Post::find();

        if let Some(id) = after_id {
            query = query.filter(post::Column::Id.gt(id));
        }

        query
            .select_only()
            .column(post::Column::Id)
            .order_by_asc(post::Column::Id)
            .limit(limit)
            .into_tuple::<i64>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Subquery selecting the IDs of posts carrying any of `tags`.
    #[must_use]
    pub fn tagged_posts_query(tags: &[Category]) -> SelectStatement {
        Query::select()
            .column(post_tag::Column::PostId)
            .from(post_tag::Entity)
            .and_where(post_tag::Column::Tag.is_in(tags.iter().copied()))
            .to_owned()
    }

    /// List the tags of a single post.
    pub async fn tags_for_post(&self, post_id: i64) -> AppResult<Vec<Category>> {
        PostTag::find()
            .filter(post_tag::Column::PostId.eq(post_id))
            .select_only()
            .column(post_tag::Column::Tag)
            .order_by_asc(post_tag::Column::Tag)
            .into_tuple::<Category>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Tags of several posts, keyed by post ID. Posts without tags are absent.
    pub async fn tags_for_posts(&self, post_ids: &[i64]) -> AppResult<HashMap<i64, Vec<Category>>> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = PostTag::find()
            .filter(post_tag::Column::PostId.is_in(post_ids.to_vec()))
            .order_by_asc(post_tag::Column::PostId)
            .order_by_asc(post_tag::Column::Tag)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut tags: HashMap<i64, Vec<Category>> = HashMap::new();
        for row in rows {
            tags.entry(row.post_id).or_default().push(row.tag);
        }
        Ok(tags)
    }

    /// Replace the tags of a post.
    ///
    /// Every value must name a known category; otherwise nothing is written
    /// and a validation error is returned.
    pub async fn set_tags(&self, post_id: i64, tags: &[String]) -> AppResult<Vec<Category>> {
        let parsed = tags
            .iter()
            .map(|t| t.parse::<Category>())
            .collect::<AppResult<BTreeSet<_>>>()?;

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        PostTag::delete_many()
            .filter(post_tag::Column::PostId.eq(post_id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if !parsed.is_empty() {
            let models = parsed.iter().map(|tag| post_tag::ActiveModel {
                post_id: Set(post_id),
                tag: Set(*tag),
                ..Default::default()
            });
            PostTag::insert_many(models)
                .exec_without_returning(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(parsed.into_iter().collect())
    }

    /// Per-tag post counts for posts created at or after `since`.
    ///
    /// Only tags with at least `min_posts` posts are returned.
    pub async fn tag_usage_since(
        &self,
        since: DateTimeWithTimeZone,
        min_posts: i64,
    ) -> AppResult<Vec<TagUsage>> {
        PostTag::find()
            .select_only()
            .column(post_tag::Column::Tag)
            .column_as(post_tag::Column::PostId.count(), "posts_count")
            .column_as(post::Column::CreatedAt.min(), "oldest_created_at")
            .join(JoinType::InnerJoin, post_tag::Relation::Post.def())
            .filter(post::Column::CreatedAt.gte(since))
            .group_by(post_tag::Column::Tag)
            .having(Expr::expr(post_tag::Column::PostId.count()).gte(min_posts))
            .into_model::<TagUsage>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

//! Post metrics entity (derived per-post counters and scores).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "post_metrics")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub post_id: i64,

    #[sea_orm(default_value = 0)]
    pub views_count: i64,

    #[sea_orm(default_value = 0)]
    pub likes_count: i64,

    #[sea_orm(default_value = 0)]
    pub comments_count: i64,

    #[sea_orm(default_value = 0)]
    pub shares_count: i64,

    #[sea_orm(default_value = 0.0)]
    pub popularity_score: f64,

    #[sea_orm(default_value = 0.0)]
    pub trending_score: f64,

    pub last_updated: DateTimeWithTimeZone,
}

impl Model {
    /// Zero-valued record for a post that has never been scored.
    #[must_use]
    pub fn zero(post_id: i64, at: DateTimeWithTimeZone) -> Self {
        Self {
            post_id,
            views_count: 0,
            likes_count: 0,
            comments_count: 0,
            shares_count: 0,
            popularity_score: 0.0,
            trending_score: 0.0,
            last_updated: at,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::post::Entity",
        from = "Column::PostId",
        to = "super::post::Column::Id",
        on_delete = "Cascade"
    )]
    Post,
}

impl Related<super::post::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Post.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

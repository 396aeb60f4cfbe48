//! Interaction event entity (append-only behavioral log).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of user action recorded in the interaction log.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    #[sea_orm(string_value = "view")]
    View,
    #[sea_orm(string_value = "like")]
    Like,
    #[sea_orm(string_value = "comment")]
    Comment,
    #[sea_orm(string_value = "share")]
    Share,
    #[sea_orm(string_value = "profile_view")]
    ProfileView,
    #[sea_orm(string_value = "search")]
    Search,
    #[sea_orm(string_value = "tag_click")]
    TagClick,
}

impl InteractionType {
    /// Fixed score stored with every event of this type.
    #[must_use]
    pub const fn weight(self) -> f64 {
        match self {
            Self::View => 0.5,
            Self::Like => 1.0,
            Self::Comment => 2.0,
            Self::Share => 3.0,
            Self::ProfileView => 0.3,
            Self::Search => 0.2,
            Self::TagClick => 0.4,
        }
    }

    /// Whether tracking this type on a post changes its metrics.
    #[must_use]
    pub const fn affects_post_metrics(self) -> bool {
        matches!(self, Self::View | Self::Like | Self::Comment | Self::Share)
    }
}

/// `content_type` value for events about a post.
pub const CONTENT_TYPE_POST: &str = "post";

/// `content_type` value for tag-level events; `content_meta` holds the tag.
pub const CONTENT_TYPE_TAG: &str = "tag";

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "interaction_event")]
pub struct Model {
    /// ULID, so id order is creation order
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub user_id: i64,

    pub interaction_type: InteractionType,

    /// What the event is about ("post", "tag", "user", "search", ...)
    pub content_type: String,

    #[sea_orm(nullable)]
    pub content_id: Option<i64>,

    /// Free-form detail (tag name, search text)
    #[sea_orm(nullable)]
    pub content_meta: Option<String>,

    /// Weight captured at write time
    pub score: f64,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

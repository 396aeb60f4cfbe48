//! Post tag entity (post <-> category join relation).

use std::fmt;
use std::str::FromStr;

use pulse_common::AppError;
use sea_orm::Iterable;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Fixed set of topical categories a post can be tagged with.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[sea_orm(string_value = "wellness")]
    Wellness,
    #[sea_orm(string_value = "art")]
    Art,
    #[sea_orm(string_value = "music")]
    Music,
    #[sea_orm(string_value = "fitness")]
    Fitness,
    #[sea_orm(string_value = "food")]
    Food,
    #[sea_orm(string_value = "travel")]
    Travel,
    #[sea_orm(string_value = "fashion")]
    Fashion,
    #[sea_orm(string_value = "tech")]
    Tech,
    #[sea_orm(string_value = "gaming")]
    Gaming,
    #[sea_orm(string_value = "education")]
    Education,
    #[sea_orm(string_value = "lifestyle")]
    Lifestyle,
    #[sea_orm(string_value = "photography")]
    Photography,
    #[sea_orm(string_value = "comedy")]
    Comedy,
    #[sea_orm(string_value = "business")]
    Business,
}

impl Category {
    /// Wire/storage name of the category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Wellness => "wellness",
            Self::Art => "art",
            Self::Music => "music",
            Self::Fitness => "fitness",
            Self::Food => "food",
            Self::Travel => "travel",
            Self::Fashion => "fashion",
            Self::Tech => "tech",
            Self::Gaming => "gaming",
            Self::Education => "education",
            Self::Lifestyle => "lifestyle",
            Self::Photography => "photography",
            Self::Comedy => "comedy",
            Self::Business => "business",
        }
    }

    /// Parse a category name, ignoring case, surrounding whitespace and a leading `#`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().trim_start_matches('#').to_lowercase();
        Self::iter().find(|c| c.as_str() == normalized)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| AppError::Validation(format!("Unknown tag: {s}")))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "post_tag")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(indexed)]
    pub post_id: i64,

    pub tag: Category,
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

//! Request normalization and candidate predicates.
//!
//! A [`SearchRequest`] is validated and normalized into a
//! [`NormalizedRequest`], from which a [`PostPredicate`] tree is built. The
//! tree compiles to a sea-orm [`Condition`] for the candidate query and can
//! also be evaluated in memory against a loaded post.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use pulse_common::{AppError, AppResult, get_metrics};
use pulse_db::entities::post::{self, Visibility};
use pulse_db::entities::post_tag::Category;
use pulse_db::repositories::{FollowingRepository, PostRepository, SubscriptionRepository};
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{ColumnTrait, Condition};
use serde::{Deserialize, Serialize};
use tracing::debug;
use validator::Validate;

use super::ranking::RankingStrategy;

/// Whether a request feeds a plain search or a discovery feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    #[default]
    Posts,
    Discovery,
}

/// Raw search/discovery request as received from a caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchRequest {
    /// Free-text query matched against title and description.
    pub query: Option<String>,
    /// Requesting user.
    #[validate(range(min = 1, message = "userId must be a positive integer"))]
    pub user_id: i64,
    /// Tag filter; unknown values are dropped.
    pub tags: Vec<String>,
    /// Ranking strategy name; unknown values fall back to `recent`.
    pub sort: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub kind: RequestKind,
}

/// Page size bounds used during normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationLimits {
    pub default_limit: u64,
    pub max_limit: u64,
}

impl Default for PaginationLimits {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 100,
        }
    }
}

/// A validated request with every field corrected into range.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRequest {
    pub query: Option<String>,
    pub user_id: i64,
    pub tags: Vec<Category>,
    pub strategy: RankingStrategy,
    pub limit: u64,
    pub offset: u64,
    pub kind: RequestKind,
}

/// Filters actually applied to a search, echoed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedFilters {
    pub query: Option<String>,
    pub tags: Vec<Category>,
    pub sort: RankingStrategy,
    pub limit: u64,
    pub offset: u64,
    pub kind: RequestKind,
}

impl From<&NormalizedRequest> for AppliedFilters {
    fn from(req: &NormalizedRequest) -> Self {
        Self {
            query: req.query.clone(),
            tags: req.tags.clone(),
            sort: req.strategy,
            limit: req.limit,
            offset: req.offset,
            kind: req.kind,
        }
    }
}

/// Reject non-positive user identities.
pub fn validate_user_id(user_id: i64) -> AppResult<()> {
    if user_id <= 0 {
        get_metrics().record_validation_failure();
        return Err(AppError::Validation(
            "userId must be a positive integer".to_string(),
        ));
    }
    Ok(())
}

/// Validate a request and correct out-of-range values.
///
/// Only a missing or non-positive `user_id` is an error. Unknown tags are
/// dropped, an out-of-range limit falls back to the default and a negative
/// offset becomes zero.
pub fn normalize(req: &SearchRequest, limits: PaginationLimits) -> AppResult<NormalizedRequest> {
    if let Err(e) = req.validate() {
        get_metrics().record_validation_failure();
        return Err(e.into());
    }

    let mut tags = BTreeSet::new();
    for raw in &req.tags {
        match Category::parse(raw) {
            Some(tag) => {
                tags.insert(tag);
            }
            None => debug!(tag = %raw, "Dropping unknown tag"),
        }
    }

    let limit = match req.limit {
        None => limits.default_limit,
        Some(l) if l >= 1 && l as u64 <= limits.max_limit => l as u64,
        Some(l) => {
            debug!(limit = l, default = limits.default_limit, "Limit out of range, using default");
            limits.default_limit
        }
    };

    let offset = match req.offset {
        None => 0,
        Some(o) if o >= 0 => o as u64,
        Some(o) => {
            debug!(offset = o, "Negative offset, using 0");
            0
        }
    };

    let query = req
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string);

    Ok(NormalizedRequest {
        query,
        user_id: req.user_id,
        tags: tags.into_iter().collect(),
        strategy: RankingStrategy::parse(req.sort.as_deref()),
        limit,
        offset,
        kind: req.kind,
    })
}

/// Viewer-specific facts needed to evaluate a predicate in memory.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    /// Creators the viewer holds an active subscription to.
    pub subscribed_creators: HashSet<i64>,
    /// Creators the viewer follows.
    pub followed_creators: HashSet<i64>,
}

/// Composable filter over posts.
#[derive(Debug, Clone, PartialEq)]
pub enum PostPredicate {
    /// Public, or subscriber-only with an active subscription from the viewer.
    Visible { viewer: i64 },
    /// Carries at least one of the tags. Empty matches everything.
    TagsAny(Vec<Category>),
    /// Case-insensitive substring of title or description.
    TextMatch(String),
    /// Created at or after the instant.
    CreatedSince(DateTime<Utc>),
    /// Not authored by the user.
    AuthorNot(i64),
    /// Not authored by anyone the user follows.
    AuthorNotFollowedBy(i64),
    /// Authored by one of the users.
    AuthorIn(Vec<i64>),
    /// One of the posts.
    IdIn(Vec<i64>),
    All(Vec<PostPredicate>),
    Any(Vec<PostPredicate>),
}

fn like_pattern(query: &str) -> String {
    let escaped = query
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

impl PostPredicate {
    /// Candidate predicate for a normalized request.
    ///
    /// Discovery requests additionally exclude the requester's own posts and
    /// posts by creators the requester follows.
    #[must_use]
    pub fn for_request(req: &NormalizedRequest, now: DateTime<Utc>) -> Self {
        let mut parts = vec![Self::Visible {
            viewer: req.user_id,
        }];

        if !req.tags.is_empty() {
            parts.push(Self::TagsAny(req.tags.clone()));
        }
        if let Some(query) = &req.query {
            parts.push(Self::TextMatch(query.clone()));
        }
        if let Some(window) = req.strategy.window() {
            parts.push(Self::CreatedSince(now - window));
        }
        if req.kind == RequestKind::Discovery {
            parts.push(Self::AuthorNot(req.user_id));
            parts.push(Self::AuthorNotFollowedBy(req.user_id));
        }

        Self::All(parts)
    }

    /// Compile into a sea-orm condition over the `post` table.
    #[must_use]
    pub fn to_condition(&self) -> Condition {
        match self {
            Self::Visible { viewer } => Condition::any()
                .add(post::Column::Visibility.eq(Visibility::Public))
                .add(
                    Condition::all()
                        .add(post::Column::Visibility.eq(Visibility::SubscriberOnly))
                        .add(post::Column::UserId.in_subquery(
                            SubscriptionRepository::active_creators_query(*viewer),
                        )),
                ),
            Self::TagsAny(tags) if tags.is_empty() => Condition::all(),
            Self::TagsAny(tags) => Condition::all()
                .add(post::Column::Id.in_subquery(PostRepository::tagged_posts_query(tags))),
            Self::TextMatch(query) => {
                let pattern = like_pattern(query);
                Condition::any()
                    .add(Expr::expr(Func::lower(Expr::col(post::Column::Title))).like(pattern.clone()))
                    .add(Expr::expr(Func::lower(Expr::col(post::Column::Description))).like(pattern))
            }
            Self::CreatedSince(since) => Condition::all().add(post::Column::CreatedAt.gte(*since)),
            Self::AuthorNot(user_id) => Condition::all().add(post::Column::UserId.ne(*user_id)),
            Self::AuthorNotFollowedBy(user_id) => Condition::all().add(
                post::Column::UserId.not_in_subquery(FollowingRepository::followees_query(*user_id)),
            ),
            Self::AuthorIn(ids) => Condition::all().add(post::Column::UserId.is_in(ids.clone())),
            Self::IdIn(ids) => Condition::all().add(post::Column::Id.is_in(ids.clone())),
            Self::All(parts) => parts
                .iter()
                .fold(Condition::all(), |cond, p| cond.add(p.to_condition())),
            Self::Any(parts) => parts
                .iter()
                .fold(Condition::any(), |cond, p| cond.add(p.to_condition())),
        }
    }

    /// Evaluate against a loaded post and its tags.
    ///
    /// `ctx` must describe the same viewer the predicate was built for.
    #[must_use]
    pub fn matches(&self, post: &post::Model, tags: &[Category], ctx: &EvalContext) -> bool {
        match self {
            Self::Visible { .. } => match post.visibility {
                Visibility::Public => true,
                Visibility::SubscriberOnly => ctx.subscribed_creators.contains(&post.user_id),
            },
            Self::TagsAny(wanted) => wanted.is_empty() || tags.iter().any(|t| wanted.contains(t)),
            Self::TextMatch(query) => {
                let needle = query.to_lowercase();
                post.title.to_lowercase().contains(&needle)
                    || post
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
            }
            Self::CreatedSince(since) => post.created_at >= *since,
            Self::AuthorNot(user_id) => post.user_id != *user_id,
            Self::AuthorNotFollowedBy(_) => !ctx.followed_creators.contains(&post.user_id),
            Self::AuthorIn(ids) => ids.contains(&post.user_id),
            Self::IdIn(ids) => ids.contains(&post.id),
            Self::All(parts) => parts.iter().all(|p| p.matches(post, tags, ctx)),
            Self::Any(parts) => parts.iter().any(|p| p.matches(post, tags, ctx)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pulse_db::entities::post::Entity as Post;
    use sea_orm::{DbBackend, EntityTrait, QueryFilter, QueryTrait};

    fn request(user_id: i64) -> SearchRequest {
        SearchRequest {
            user_id,
            ..Default::default()
        }
    }

    fn create_test_post(id: i64, user_id: i64, visibility: Visibility) -> post::Model {
        post::Model {
            id,
            user_id,
            title: "Morning Stretch Routine".to_string(),
            description: Some("Ten minutes of gentle yoga".to_string()),
            media_url: None,
            visibility,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn sql_for(predicate: &PostPredicate) -> String {
        Post::find()
            .filter(predicate.to_condition())
            .build(DbBackend::Postgres)
            .to_string()
    }

    #[test]
    fn test_non_positive_user_is_rejected() {
        for user_id in [0, -3] {
            let err = normalize(&request(user_id), PaginationLimits::default()).unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
    }

    #[test]
    fn test_oversized_limit_falls_back_to_default() {
        let req = SearchRequest {
            limit: Some(500),
            ..request(1)
        };
        let normalized = normalize(&req, PaginationLimits::default()).unwrap();
        assert_eq!(normalized.limit, 20);
    }

    #[test]
    fn test_in_range_values_are_kept() {
        let req = SearchRequest {
            limit: Some(100),
            offset: Some(40),
            ..request(1)
        };
        let normalized = normalize(&req, PaginationLimits::default()).unwrap();
        assert_eq!(normalized.limit, 100);
        assert_eq!(normalized.offset, 40);
    }

    #[test]
    fn test_negative_offset_and_zero_limit_are_reset() {
        let req = SearchRequest {
            limit: Some(0),
            offset: Some(-5),
            ..request(1)
        };
        let normalized = normalize(&req, PaginationLimits::default()).unwrap();
        assert_eq!(normalized.limit, 20);
        assert_eq!(normalized.offset, 0);
    }

    #[test]
    fn test_unknown_tags_are_dropped() {
        let req = SearchRequest {
            tags: vec!["Art".into(), "knitting".into(), "art".into(), "music".into()],
            ..request(1)
        };
        let normalized = normalize(&req, PaginationLimits::default()).unwrap();
        assert_eq!(normalized.tags, vec![Category::Art, Category::Music]);
    }

    #[test]
    fn test_blank_query_and_unknown_sort() {
        let req = SearchRequest {
            query: Some("   ".into()),
            sort: Some("chronological".into()),
            ..request(1)
        };
        let normalized = normalize(&req, PaginationLimits::default()).unwrap();
        assert_eq!(normalized.query, None);
        assert_eq!(normalized.strategy, RankingStrategy::Recent);
    }

    #[test]
    fn test_subscriber_only_requires_subscription() {
        let predicate = PostPredicate::Visible { viewer: 1 };
        let locked = create_test_post(1, 9, Visibility::SubscriberOnly);
        let open = create_test_post(2, 9, Visibility::Public);

        let stranger = EvalContext::default();
        assert!(!predicate.matches(&locked, &[], &stranger));
        assert!(predicate.matches(&open, &[], &stranger));

        let subscriber = EvalContext {
            subscribed_creators: HashSet::from([9]),
            ..Default::default()
        };
        assert!(predicate.matches(&locked, &[], &subscriber));
    }

    #[test]
    fn test_discovery_excludes_own_and_followed() {
        let normalized = normalize(
            &SearchRequest {
                kind: RequestKind::Discovery,
                ..request(1)
            },
            PaginationLimits::default(),
        )
        .unwrap();
        let predicate = PostPredicate::for_request(&normalized, Utc::now());
        let ctx = EvalContext {
            followed_creators: HashSet::from([5]),
            ..Default::default()
        };

        let own = create_test_post(1, 1, Visibility::Public);
        let followed = create_test_post(2, 5, Visibility::Public);
        let stranger = create_test_post(3, 6, Visibility::Public);

        assert!(!predicate.matches(&own, &[], &ctx));
        assert!(!predicate.matches(&followed, &[], &ctx));
        assert!(predicate.matches(&stranger, &[], &ctx));
    }

    #[test]
    fn test_tags_and_text_match_in_memory() {
        let post = create_test_post(1, 2, Visibility::Public);
        let ctx = EvalContext::default();

        assert!(PostPredicate::TagsAny(vec![]).matches(&post, &[], &ctx));
        assert!(PostPredicate::TagsAny(vec![Category::Fitness]).matches(&post, &[Category::Fitness], &ctx));
        assert!(!PostPredicate::TagsAny(vec![Category::Art]).matches(&post, &[Category::Fitness], &ctx));

        assert!(PostPredicate::TextMatch("STRETCH".into()).matches(&post, &[], &ctx));
        assert!(PostPredicate::TextMatch("yoga".into()).matches(&post, &[], &ctx));
        assert!(!PostPredicate::TextMatch("pilates".into()).matches(&post, &[], &ctx));
    }

    #[test]
    fn test_created_since_in_memory() {
        let post = create_test_post(1, 2, Visibility::Public);
        let ctx = EvalContext::default();

        assert!(PostPredicate::CreatedSince(Utc::now() - Duration::hours(1)).matches(&post, &[], &ctx));
        assert!(!PostPredicate::CreatedSince(Utc::now() + Duration::hours(1)).matches(&post, &[], &ctx));
    }

    #[test]
    fn test_visible_compiles_to_subscription_subquery() {
        let sql = sql_for(&PostPredicate::Visible { viewer: 4 });
        assert!(sql.contains(r#""post"."visibility" = 'public'"#));
        assert!(sql.contains(r#""post"."visibility" = 'subscriber_only'"#));
        assert!(sql.contains(r#"IN (SELECT "creator_id" FROM "subscription""#));
        assert!(sql.contains(r#""subscriber_id" = 4"#));
    }

    #[test]
    fn test_discovery_compiles_exclusions() {
        let normalized = NormalizedRequest {
            query: Some("50%_off".into()),
            user_id: 3,
            tags: vec![Category::Food],
            strategy: RankingStrategy::Recent,
            limit: 20,
            offset: 0,
            kind: RequestKind::Discovery,
        };
        let sql = sql_for(&PostPredicate::for_request(&normalized, Utc::now()));

        assert!(sql.contains(r#""post"."user_id" <> 3"#));
        assert!(sql.contains(r#"NOT IN (SELECT "followee_id" FROM "following""#));
        assert!(sql.contains(r#"IN (SELECT "post_id" FROM "post_tag""#));
        assert!(sql.contains("LOWER"));
        assert!(sql.contains("LIKE"));
    }

    #[test]
    fn test_popular_strategy_adds_time_window() {
        let normalized = normalize(
            &SearchRequest {
                sort: Some("popular_24h".into()),
                ..request(1)
            },
            PaginationLimits::default(),
        )
        .unwrap();
        let now = Utc::now();
        let predicate = PostPredicate::for_request(&normalized, now);

        match predicate {
            PostPredicate::All(parts) => {
                assert!(parts.contains(&PostPredicate::CreatedSince(now - Duration::hours(24))));
            }
            other => panic!("unexpected predicate {other:?}"),
        }
    }
}

//! Discovery feeds: "explore" and "recommended for you".

use chrono::{DateTime, Utc};
use pulse_common::{AppResult, get_metrics};
use pulse_db::entities::post_metrics;
use pulse_db::repositories::{InteractionRepository, LikeRepository, PostMetricsRepository, PostRepository};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::query_filter::{EvalContext, PostPredicate, RequestKind, SearchRequest, normalize, validate_user_id};
use super::ranking::{Candidate, RankContext, RankingStrategy, rank};
use super::search::{PostView, SearchService, paginate};

/// The discovery algorithms, selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryStrategy {
    /// Ranked posts from creators the user does not follow.
    Explore,
    /// Posts drawn from the user's likes and global popularity.
    RecommendedForYou,
}

/// Input for the "recommended for you" feed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecommendRequest {
    pub user_id: i64,
    pub tags: Vec<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl From<&SearchRequest> for RecommendRequest {
    fn from(req: &SearchRequest) -> Self {
        Self {
            user_id: req.user_id,
            tags: req.tags.clone(),
            limit: req.limit,
            offset: req.offset,
        }
    }
}

/// One page of a discovery feed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    pub posts: Vec<PostView>,
    pub total: u64,
    pub has_more: bool,
    /// Set when only the newest matches were ranked.
    pub truncated: bool,
}

impl FeedPage {
    const fn empty() -> Self {
        Self {
            posts: Vec::new(),
            total: 0,
            has_more: false,
            truncated: false,
        }
    }
}

/// Discovery service for business logic.
#[derive(Clone)]
pub struct DiscoveryService {
    search: SearchService,
    post_repo: PostRepository,
    like_repo: LikeRepository,
    interaction_repo: InteractionRepository,
    metrics_repo: PostMetricsRepository,
    pool_size: u64,
}

impl DiscoveryService {
    /// Create a new discovery service.
    #[must_use]
    pub const fn new(
        search: SearchService,
        post_repo: PostRepository,
        like_repo: LikeRepository,
        interaction_repo: InteractionRepository,
        metrics_repo: PostMetricsRepository,
        pool_size: u64,
    ) -> Self {
        Self {
            search,
            post_repo,
            like_repo,
            interaction_repo,
            metrics_repo,
            pool_size,
        }
    }

    /// Run the named strategy for a request.
    pub async fn compose(&self, strategy: DiscoveryStrategy, req: SearchRequest) -> AppResult<FeedPage> {
        match strategy {
            DiscoveryStrategy::Explore => self.discover(req).await,
            DiscoveryStrategy::RecommendedForYou => self.recommend(RecommendRequest::from(&req)).await,
        }
    }

    /// Explore feed: the search pipeline with the requester's own posts and
    /// followed creators excluded.
    pub async fn discover(&self, req: SearchRequest) -> AppResult<FeedPage> {
        let req = SearchRequest {
            kind: RequestKind::Discovery,
            ..req
        };
        let normalized = normalize(&req, self.search.limits())?;

        let page = self.search.run(&normalized, Utc::now()).await?;
        let posts = self.search.present(page.posts).await;
        get_metrics().record_discovery();

        Ok(FeedPage {
            posts,
            total: page.total,
            has_more: page.has_more,
            truncated: page.truncated,
        })
    }

    /// "Recommended for you" feed.
    pub async fn recommend(&self, req: RecommendRequest) -> AppResult<FeedPage> {
        self.recommend_at(req, Utc::now()).await
    }

    /// Recommended feed relative to `now`.
    ///
    /// The pool is the union of visible posts by creators the user liked,
    /// posts sharing a tag with posts the user liked, and popular posts the
    /// user has not seen. Own posts are excluded. The pool is ordered newest
    /// first and capped before the tag filter and pagination apply.
    pub async fn recommend_at(&self, req: RecommendRequest, now: DateTime<Utc>) -> AppResult<FeedPage> {
        validate_user_id(req.user_id)?;
        let normalized = normalize(
            &SearchRequest {
                user_id: req.user_id,
                tags: req.tags,
                limit: req.limit,
                offset: req.offset,
                ..Default::default()
            },
            self.search.limits(),
        )?;
        let user_id = normalized.user_id;

        let liked_creators = self.like_repo.liked_creator_ids(user_id).await?;
        let liked_tags = self.like_repo.liked_tags(user_id).await?;
        let seen = self.interaction_repo.seen_post_ids(user_id).await?;
        let popular = self.metrics_repo.popular_post_ids(&seen, self.pool_size).await?;

        let mut sources = Vec::new();
        if !liked_creators.is_empty() {
            sources.push(PostPredicate::AuthorIn(liked_creators));
        }
        if !liked_tags.is_empty() {
            sources.push(PostPredicate::TagsAny(liked_tags));
        }
        if !popular.is_empty() {
            sources.push(PostPredicate::IdIn(popular));
        }
        if sources.is_empty() {
            debug!(user_id, "No recommendation sources");
            get_metrics().record_recommendation();
            return Ok(FeedPage::empty());
        }

        let predicate = PostPredicate::All(vec![
            PostPredicate::Visible { viewer: user_id },
            PostPredicate::AuthorNot(user_id),
            PostPredicate::Any(sources),
        ]);
        let posts = self
            .post_repo
            .find_candidates(predicate.to_condition(), self.pool_size)
            .await?;

        let ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
        let mut metrics = self.search.load_metrics(&ids).await?;
        let mut tags = self.search.load_tags(&ids).await;

        let tag_filter = PostPredicate::TagsAny(normalized.tags.clone());
        let ctx = EvalContext::default();
        let candidates: Vec<Candidate> = posts
            .into_iter()
            .map(|post| Candidate {
                metrics: metrics
                    .remove(&post.id)
                    .unwrap_or_else(|| post_metrics::Model::zero(post.id, now.into())),
                tags: tags.remove(&post.id).unwrap_or_default(),
                post,
            })
            .filter(|c| tag_filter.matches(&c.post, &c.tags, &ctx))
            .collect();

        let ranked = rank(candidates, RankingStrategy::Recent, &RankContext::new(now));
        let (page, total, has_more) = paginate(ranked, normalized.offset, normalized.limit);
        let posts = self.search.present(page).await;

        get_metrics().record_recommendation();
        debug!(user_id, total, "Composed recommendations");

        Ok(FeedPage {
            posts,
            total,
            has_more,
            truncated: false,
        })
    }
}

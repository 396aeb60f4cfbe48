//! Search pipeline: normalize, filter, rank, paginate, enrich.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use pulse_common::config::RankingConfig;
use pulse_common::{AppResult, Timer, get_metrics};
use pulse_db::entities::post::{self, Visibility};
use pulse_db::entities::post_metrics;
use pulse_db::entities::post_tag::Category;
use pulse_db::entities::user;
use pulse_db::repositories::{PostRepository, UserRepository};
use serde::Serialize;
use tracing::{debug, warn};

use super::post_metrics::PostMetricsService;
use super::preference::PreferenceService;
use super::query_filter::{
    AppliedFilters, NormalizedRequest, PaginationLimits, PostPredicate, RequestKind, SearchRequest,
    normalize,
};
use super::ranking::{Candidate, RankContext, RankedPost, RankingStrategy, rank};

/// Public author summary attached to a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorView {
    pub id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl From<user::Model> for AuthorView {
    fn from(user: user::Model) -> Self {
        let display_name = match (user.first_name, user.last_name) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            (Some(name), None) | (None, Some(name)) => Some(name),
            (None, None) => None,
        };
        Self {
            id: user.id,
            username: user.username,
            display_name,
            avatar_url: user.avatar_url,
        }
    }
}

/// A ranked post as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub media_url: Option<String>,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
    pub tags: Vec<Category>,
    pub metrics: post_metrics::Model,
    pub score: f64,
    /// Absent when the author could not be loaded.
    pub author: Option<AuthorView>,
}

impl PostView {
    fn new(ranked: RankedPost, author: Option<AuthorView>) -> Self {
        let RankedPost {
            post,
            metrics,
            tags,
            score,
        } = ranked;
        Self {
            id: post.id,
            user_id: post.user_id,
            title: post.title,
            description: post.description,
            media_url: post.media_url,
            visibility: post.visibility,
            created_at: post.created_at.with_timezone(&Utc),
            tags,
            metrics,
            score,
            author,
        }
    }
}

/// One page of search results.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub posts: Vec<PostView>,
    /// Matching posts before pagination.
    pub total: u64,
    pub has_more: bool,
    /// Set when only the newest matches were ranked, so `total` undercounts.
    pub truncated: bool,
    pub applied_filters: AppliedFilters,
}

/// A ranked result set cut down to one page.
pub(crate) struct Page {
    pub posts: Vec<RankedPost>,
    pub total: u64,
    pub has_more: bool,
    pub truncated: bool,
}

/// Slice `items` to `offset..offset+limit`; `has_more` iff items remain past the page.
pub(crate) fn paginate<T>(items: Vec<T>, offset: u64, limit: u64) -> (Vec<T>, u64, bool) {
    let total = items.len() as u64;
    let page: Vec<T> = items
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect();
    let has_more = total > offset + page.len() as u64;
    (page, total, has_more)
}

/// Search service for business logic.
#[derive(Clone)]
pub struct SearchService {
    post_repo: PostRepository,
    user_repo: UserRepository,
    post_metrics: PostMetricsService,
    preferences: PreferenceService,
    config: RankingConfig,
}

impl SearchService {
    /// Create a new search service.
    #[must_use]
    pub const fn new(
        post_repo: PostRepository,
        user_repo: UserRepository,
        post_metrics: PostMetricsService,
        preferences: PreferenceService,
        config: RankingConfig,
    ) -> Self {
        Self {
            post_repo,
            user_repo,
            post_metrics,
            preferences,
            config,
        }
    }

    /// Page size bounds from configuration.
    #[must_use]
    pub const fn limits(&self) -> PaginationLimits {
        PaginationLimits {
            default_limit: self.config.default_limit,
            max_limit: self.config.max_limit,
        }
    }

    /// Search posts visible to the requesting user.
    pub async fn search(&self, req: SearchRequest) -> AppResult<SearchResponse> {
        let timer = Timer::start();
        let normalized = normalize(&req, self.limits())?;

        let page = self.run(&normalized, Utc::now()).await?;
        let posts = self.present(page.posts).await;

        match normalized.kind {
            RequestKind::Posts => get_metrics().record_search(timer.elapsed()),
            RequestKind::Discovery => get_metrics().record_discovery(),
        }

        Ok(SearchResponse {
            posts,
            total: page.total,
            has_more: page.has_more,
            truncated: page.truncated,
            applied_filters: AppliedFilters::from(&normalized),
        })
    }

    /// Filter, rank and paginate a normalized request.
    ///
    /// `recent` and the popular strategies order and page in the store, with
    /// `total` counted over the full match set. `relevance` needs per-viewer
    /// scores, so it ranks the newest `candidate_cap` matches in memory.
    pub(crate) async fn run(&self, req: &NormalizedRequest, now: DateTime<Utc>) -> AppResult<Page> {
        let predicate = PostPredicate::for_request(req, now);
        match req.strategy {
            RankingStrategy::Relevance => self.run_in_memory(req, &predicate, now).await,
            RankingStrategy::Recent
            | RankingStrategy::Popular24h
            | RankingStrategy::PopularWeek
            | RankingStrategy::PopularMonth => self.run_in_store(req, &predicate, now).await,
        }
    }

    async fn run_in_store(
        &self,
        req: &NormalizedRequest,
        predicate: &PostPredicate,
        now: DateTime<Utc>,
    ) -> AppResult<Page> {
        let condition = predicate.to_condition();
        let total = self.post_repo.count_matching(condition.clone()).await?;
        if total <= req.offset {
            return Ok(Page {
                posts: Vec::new(),
                total,
                has_more: false,
                truncated: false,
            });
        }

        let posts = if req.strategy == RankingStrategy::Recent {
            self.post_repo
                .page_by_recency(condition, req.offset, req.limit)
                .await?
        } else {
            self.post_repo
                .page_by_popularity(condition, req.offset, req.limit)
                .await?
        };

        let candidates = self.candidates(posts, now).await?;
        debug!(
            user_id = req.user_id,
            total,
            page = candidates.len(),
            strategy = req.strategy.as_str(),
            "Ranking page"
        );

        // The page is already in strategy order; ranking attaches the scores.
        let posts = rank(candidates, req.strategy, &self.rank_context(now));
        let has_more = total > req.offset + posts.len() as u64;

        Ok(Page {
            posts,
            total,
            has_more,
            truncated: false,
        })
    }

    async fn run_in_memory(
        &self,
        req: &NormalizedRequest,
        predicate: &PostPredicate,
        now: DateTime<Utc>,
    ) -> AppResult<Page> {
        let cap = self.config.candidate_cap;
        let mut posts = self
            .post_repo
            .find_candidates(predicate.to_condition(), cap + 1)
            .await?;
        let truncated = posts.len() as u64 > cap;
        if truncated {
            posts.truncate(cap as usize);
            warn!(user_id = req.user_id, cap, "Relevance ranking limited to newest candidates");
        }

        let candidates = self.candidates(posts, now).await?;
        let mut ctx = self.rank_context(now);
        if req.kind == RequestKind::Discovery {
            ctx.boost_tags = self.boost_tags(req.user_id, now).await;
        }

        debug!(
            user_id = req.user_id,
            candidates = candidates.len(),
            truncated,
            strategy = req.strategy.as_str(),
            "Ranking candidates"
        );

        let ranked = rank(candidates, req.strategy, &ctx);
        let (posts, total, has_more) = paginate(ranked, req.offset, req.limit);

        Ok(Page {
            posts,
            total,
            has_more,
            truncated,
        })
    }

    fn rank_context(&self, now: DateTime<Utc>) -> RankContext {
        let mut ctx = RankContext::new(now);
        ctx.relevance_boost = self.config.relevance_boost;
        ctx.recency_weight = self.config.recency_weight;
        ctx
    }

    /// Attach metrics and tags to loaded posts, keeping their order.
    async fn candidates(&self, posts: Vec<post::Model>, now: DateTime<Utc>) -> AppResult<Vec<Candidate>> {
        let ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
        let mut metrics = self.load_metrics(&ids).await?;
        let mut tags = self.load_tags(&ids).await;

        Ok(posts
            .into_iter()
            .map(|post| Candidate {
                metrics: metrics
                    .remove(&post.id)
                    .unwrap_or_else(|| post_metrics::Model::zero(post.id, now.into())),
                tags: tags.remove(&post.id).unwrap_or_default(),
                post,
            })
            .collect())
    }

    pub(crate) async fn load_metrics(&self, ids: &[i64]) -> AppResult<HashMap<i64, post_metrics::Model>> {
        self.post_metrics.get_many(ids).await
    }

    /// Tags of the candidates. A failed lookup leaves every candidate untagged.
    pub(crate) async fn load_tags(&self, ids: &[i64]) -> HashMap<i64, Vec<Category>> {
        match self.post_repo.tags_for_posts(ids).await {
            Ok(tags) => tags,
            Err(e) => {
                get_metrics().record_partial_result();
                warn!(error = %e, "Could not load post tags");
                HashMap::new()
            }
        }
    }

    async fn boost_tags(&self, user_id: i64, now: DateTime<Utc>) -> Vec<Category> {
        match self.preferences.compute_at(user_id, now).await {
            Ok(prefs) => prefs.top_tags(self.config.boost_tag_count),
            Err(e) => {
                get_metrics().record_partial_result();
                warn!(user_id, error = %e, "Could not load preferences, ranking without boost");
                Vec::new()
            }
        }
    }

    /// Attach authors. A failed lookup returns the page without them.
    pub(crate) async fn present(&self, posts: Vec<RankedPost>) -> Vec<PostView> {
        let mut author_ids: Vec<i64> = posts.iter().map(|p| p.post.user_id).collect();
        author_ids.sort_unstable();
        author_ids.dedup();

        let authors: HashMap<i64, AuthorView> = match self.user_repo.find_by_ids(&author_ids).await {
            Ok(users) => users.into_iter().map(|u| (u.id, AuthorView::from(u))).collect(),
            Err(e) => {
                get_metrics().record_partial_result();
                warn!(error = %e, "Could not load post authors");
                HashMap::new()
            }
        };

        posts
            .into_iter()
            .map(|ranked| {
                let author = authors.get(&ranked.post.user_id).cloned();
                PostView::new(ranked, author)
            })
            .collect()
    }
}

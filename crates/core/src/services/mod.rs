//! Business logic services.

#![allow(missing_docs)]

pub mod discovery;
pub mod interaction;
pub mod maintenance;
pub mod post_metrics;
pub mod preference;
pub mod query_filter;
pub mod ranking;
pub mod search;
pub mod tag_trend;

pub use discovery::{DiscoveryService, DiscoveryStrategy, FeedPage, RecommendRequest};
pub use interaction::{InteractionService, TrackInteractionInput, TrackedInteraction};
pub use maintenance::{MaintenanceExecutor, MaintenanceService, SchedulerConfig, run_scheduler};
pub use post_metrics::{PostMetricsService, RecomputeReport, popularity_score, trending_score};
pub use preference::{PreferenceService, UserPreferences, aggregate_affinities};
pub use query_filter::{
    AppliedFilters, EvalContext, NormalizedRequest, PaginationLimits, PostPredicate, RequestKind,
    SearchRequest, normalize, validate_user_id,
};
pub use ranking::{Candidate, RankContext, RankedPost, RankingStrategy, rank, relevance_score};
pub use search::{AuthorView, PostView, SearchResponse, SearchService};
pub use tag_trend::{TagTrendService, TrendPeriod, TrendingTag, rank_trending};

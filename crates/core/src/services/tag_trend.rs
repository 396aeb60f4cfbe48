//! Trending tag calculator.

use chrono::{DateTime, Duration, Utc};
use pulse_common::AppResult;
use pulse_db::entities::post_tag::Category;
use pulse_db::repositories::{PostRepository, TagUsage};
use serde::{Deserialize, Serialize};
use tracing::debug;

const DEFAULT_TREND_LIMIT: u64 = 10;
const MAX_TREND_LIMIT: u64 = 100;

/// Window over which tag usage is measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendPeriod {
    #[serde(rename = "24h")]
    Day,
    #[default]
    #[serde(rename = "week")]
    Week,
    #[serde(rename = "month")]
    Month,
}

impl TrendPeriod {
    /// Parse a period name. Missing or unknown values mean `week`.
    #[must_use]
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("24h" | "day") => Self::Day,
            Some("month") => Self::Month,
            Some("week") | None => Self::Week,
            Some(other) => {
                debug!(period = other, "Unknown trend period, using week");
                Self::Week
            }
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Day => "24h",
            Self::Week => "week",
            Self::Month => "month",
        }
    }

    #[must_use]
    pub fn window(self) -> Duration {
        match self {
            Self::Day => Duration::hours(24),
            Self::Week => Duration::days(7),
            Self::Month => Duration::days(30),
        }
    }
}

/// A tag whose usage is growing inside a period.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingTag {
    pub tag: Category,
    pub posts_count: i64,
    /// Posts per day since the oldest qualifying post (at least one day).
    pub growth_rate: f64,
    /// `growth_rate * posts_count`.
    pub trending_score: f64,
    pub period: TrendPeriod,
}

/// Turn raw tag usage into a ranked trending list.
///
/// Tags below `min_posts` are dropped. Ordering is growth rate desc, then
/// post count desc, then tag name asc.
#[must_use]
pub fn rank_trending(
    usage: Vec<TagUsage>,
    now: DateTime<Utc>,
    period: TrendPeriod,
    min_posts: i64,
    limit: usize,
) -> Vec<TrendingTag> {
    let mut trending: Vec<TrendingTag> = usage
        .into_iter()
        .filter(|u| u.posts_count >= min_posts)
        .map(|u| {
            let days = (now - u.oldest_created_at.with_timezone(&Utc)).num_days().max(1);
            let growth_rate = u.posts_count as f64 / days as f64;
            TrendingTag {
                tag: u.tag,
                posts_count: u.posts_count,
                growth_rate,
                trending_score: growth_rate * u.posts_count as f64,
                period,
            }
        })
        .collect();

    trending.sort_by(|a, b| {
        b.growth_rate
            .total_cmp(&a.growth_rate)
            .then_with(|| b.posts_count.cmp(&a.posts_count))
            .then_with(|| a.tag.as_str().cmp(b.tag.as_str()))
    });
    trending.truncate(limit);
    trending
}

/// Tag trend service for business logic.
#[derive(Clone)]
pub struct TagTrendService {
    post_repo: PostRepository,
    min_posts: i64,
}

impl TagTrendService {
    /// Create a new tag trend service.
    #[must_use]
    pub const fn new(post_repo: PostRepository, min_posts: i64) -> Self {
        Self {
            post_repo,
            min_posts,
        }
    }

    /// Trending tags for a period. `limit` defaults to 10 and is clamped to 1..=100.
    pub async fn trending_tags(
        &self,
        period: Option<&str>,
        limit: Option<u64>,
    ) -> AppResult<Vec<TrendingTag>> {
        self.trending_tags_at(TrendPeriod::parse(period), limit, Utc::now())
            .await
    }

    /// Trending tags relative to `now`.
    pub async fn trending_tags_at(
        &self,
        period: TrendPeriod,
        limit: Option<u64>,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<TrendingTag>> {
        let limit = limit
            .unwrap_or(DEFAULT_TREND_LIMIT)
            .max(1)
            .min(MAX_TREND_LIMIT);

        let usage = self
            .post_repo
            .tag_usage_since((now - period.window()).into(), self.min_posts)
            .await?;

        Ok(rank_trending(usage, now, period, self.min_posts, limit as usize))
    }
}

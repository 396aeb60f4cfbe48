//! Ranking strategies.
//!
//! [`rank`] is a pure function: the same candidates, metrics and context
//! always produce the same order. Every strategy breaks ties by creation
//! time (newest first) and then by post ID (highest first).

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};
use pulse_db::entities::post_tag::Category;
use pulse_db::entities::{post, post_metrics};
use serde::{Deserialize, Serialize};

/// Sort strategy for a candidate set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingStrategy {
    #[default]
    Recent,
    #[serde(rename = "popular_24h")]
    Popular24h,
    PopularWeek,
    PopularMonth,
    Relevance,
}

impl RankingStrategy {
    /// Parse a strategy name. Missing or unknown names mean [`Self::Recent`].
    #[must_use]
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_lowercase()).as_deref() {
            Some("popular_24h") => Self::Popular24h,
            Some("popular_week") => Self::PopularWeek,
            Some("popular_month") => Self::PopularMonth,
            Some("relevance") => Self::Relevance,
            _ => Self::Recent,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Recent => "recent",
            Self::Popular24h => "popular_24h",
            Self::PopularWeek => "popular_week",
            Self::PopularMonth => "popular_month",
            Self::Relevance => "relevance",
        }
    }

    /// Creation-time window a candidate must fall in, for the popular strategies.
    #[must_use]
    pub fn window(self) -> Option<Duration> {
        match self {
            Self::Popular24h => Some(Duration::hours(24)),
            Self::PopularWeek => Some(Duration::days(7)),
            Self::PopularMonth => Some(Duration::days(30)),
            Self::Recent | Self::Relevance => None,
        }
    }
}

/// A post with the data needed to score it.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub post: post::Model,
    pub metrics: post_metrics::Model,
    pub tags: Vec<Category>,
}

/// A candidate with its strategy score, in final order.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedPost {
    pub post: post::Model,
    pub metrics: post_metrics::Model,
    pub tags: Vec<Category>,
    pub score: f64,
}

/// Inputs to ranking beyond the candidates themselves.
#[derive(Debug, Clone)]
pub struct RankContext {
    /// Reference instant for windows and recency.
    pub now: DateTime<Utc>,
    /// Preferred tags that earn the relevance boost (discovery only).
    pub boost_tags: Vec<Category>,
    pub relevance_boost: f64,
    /// Largest recency bonus, earned by a post created at `now`.
    pub recency_weight: f64,
}

impl RankContext {
    #[must_use]
    pub const fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            boost_tags: Vec::new(),
            relevance_boost: 10.0,
            recency_weight: 24.0,
        }
    }
}

fn hours_since(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    ((now - created_at).num_seconds() as f64 / 3600.0).max(0.0)
}

/// Relevance score: `likes*2 + comments*3 + recency_weight/(1 + hours/24)`,
/// plus the boost when the post carries one of the boosted tags.
#[must_use]
pub fn relevance_score(candidate: &Candidate, ctx: &RankContext) -> f64 {
    let hours = hours_since(candidate.post.created_at.with_timezone(&Utc), ctx.now);
    let engagement =
        candidate.metrics.likes_count as f64 * 2.0 + candidate.metrics.comments_count as f64 * 3.0;
    let recency = ctx.recency_weight / (1.0 + hours / 24.0);
    let boost = if candidate.tags.iter().any(|t| ctx.boost_tags.contains(t)) {
        ctx.relevance_boost
    } else {
        0.0
    };

    engagement + recency + boost
}

fn tie_break(a: &RankedPost, b: &RankedPost) -> Ordering {
    b.post
        .created_at
        .cmp(&a.post.created_at)
        .then_with(|| b.post.id.cmp(&a.post.id))
}

/// Order candidates by `strategy`.
///
/// The popular strategies drop candidates created outside their window.
#[must_use]
pub fn rank(candidates: Vec<Candidate>, strategy: RankingStrategy, ctx: &RankContext) -> Vec<RankedPost> {
    let cutoff = strategy.window().map(|w| ctx.now - w);

    let mut ranked: Vec<RankedPost> = candidates
        .into_iter()
        .filter(|c| cutoff.is_none_or(|cutoff| c.post.created_at >= cutoff))
        .map(|c| {
            let score = match strategy {
                RankingStrategy::Recent => 0.0,
                RankingStrategy::Popular24h
                | RankingStrategy::PopularWeek
                | RankingStrategy::PopularMonth => c.metrics.popularity_score,
                RankingStrategy::Relevance => relevance_score(&c, ctx),
            };
            RankedPost {
                post: c.post,
                metrics: c.metrics,
                tags: c.tags,
                score,
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| tie_break(a, b)));
    ranked
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pulse_db::entities::post::Visibility;

    fn candidate(id: i64, hours_old: i64, likes: i64, comments: i64, popularity: f64) -> Candidate {
        let now = Utc::now();
        let created_at = (now - Duration::hours(hours_old)).into();
        Candidate {
            post: post::Model {
                id,
                user_id: 100 + id,
                title: format!("post {id}"),
                description: None,
                media_url: None,
                visibility: Visibility::Public,
                created_at,
                updated_at: None,
            },
            metrics: post_metrics::Model {
                likes_count: likes,
                comments_count: comments,
                popularity_score: popularity,
                ..post_metrics::Model::zero(id, created_at)
            },
            tags: vec![],
        }
    }

    fn ids(ranked: &[RankedPost]) -> Vec<i64> {
        ranked.iter().map(|r| r.post.id).collect()
    }

    #[test]
    fn test_parse_falls_back_to_recent() {
        assert_eq!(RankingStrategy::parse(Some("POPULAR_WEEK")), RankingStrategy::PopularWeek);
        assert_eq!(RankingStrategy::parse(Some("relevance")), RankingStrategy::Relevance);
        assert_eq!(RankingStrategy::parse(Some("hot")), RankingStrategy::Recent);
        assert_eq!(RankingStrategy::parse(None), RankingStrategy::Recent);
    }

    #[test]
    fn test_serialized_names_match_parse() {
        for strategy in [
            RankingStrategy::Recent,
            RankingStrategy::Popular24h,
            RankingStrategy::PopularWeek,
            RankingStrategy::PopularMonth,
            RankingStrategy::Relevance,
        ] {
            let json = serde_json::to_string(&strategy).unwrap();
            assert_eq!(json, format!("\"{}\"", strategy.as_str()));
            assert_eq!(RankingStrategy::parse(Some(strategy.as_str())), strategy);
        }
    }

    #[test]
    fn test_recent_orders_by_creation() {
        let ranked = rank(
            vec![candidate(1, 5, 0, 0, 0.0), candidate(2, 1, 0, 0, 0.0), candidate(3, 3, 0, 0, 0.0)],
            RankingStrategy::Recent,
            &RankContext::new(Utc::now()),
        );
        assert_eq!(ids(&ranked), vec![2, 3, 1]);
    }

    #[test]
    fn test_popular_24h_filters_window_and_sorts_by_popularity() {
        let ranked = rank(
            vec![
                candidate(1, 2, 0, 0, 3.0),
                candidate(2, 30, 0, 0, 99.0),
                candidate(3, 5, 0, 0, 8.0),
            ],
            RankingStrategy::Popular24h,
            &RankContext::new(Utc::now()),
        );
        assert_eq!(ids(&ranked), vec![3, 1]);
    }

    #[test]
    fn test_ties_break_by_creation_then_id() {
        let a = candidate(1, 4, 0, 0, 5.0);
        let mut b = candidate(2, 4, 0, 0, 5.0);
        let c = candidate(3, 1, 0, 0, 5.0);
        b.post.created_at = a.post.created_at;

        let ranked = rank(vec![a, b, c], RankingStrategy::PopularWeek, &RankContext::new(Utc::now()));
        assert_eq!(ids(&ranked), vec![3, 2, 1]);
    }

    #[test]
    fn test_relevance_prefers_engagement_and_freshness() {
        let ctx = RankContext::new(Utc::now());
        let fresh = candidate(1, 0, 0, 0, 0.0);
        let old = candidate(2, 24 * 365, 0, 0, 0.0);

        assert!(relevance_score(&fresh, &ctx) > relevance_score(&old, &ctx));
        assert!((relevance_score(&fresh, &ctx) - 24.0).abs() < 0.01);

        let engaged = candidate(3, 24, 2, 1, 0.0);
        // 2*2 + 1*3 + 24/(1+1)
        assert!((relevance_score(&engaged, &ctx) - 19.0).abs() < 0.01);
    }

    #[test]
    fn test_relevance_boost_for_preferred_tags() {
        let mut ctx = RankContext::new(Utc::now());
        ctx.boost_tags = vec![Category::Art];

        let mut tagged = candidate(1, 48, 0, 0, 0.0);
        tagged.tags = vec![Category::Art, Category::Music];
        let plain = candidate(2, 48, 0, 0, 0.0);

        let with_boost = relevance_score(&tagged, &ctx);
        let without = relevance_score(&plain, &ctx);
        assert!((with_boost - without - 10.0).abs() < 1e-9);

        let ranked = rank(vec![plain, tagged], RankingStrategy::Relevance, &ctx);
        assert_eq!(ids(&ranked), vec![1, 2]);
    }

    #[test]
    fn test_rank_is_deterministic() {
        let ctx = RankContext::new(Utc::now());
        let input = vec![
            candidate(1, 3, 4, 1, 2.0),
            candidate(2, 3, 1, 4, 2.0),
            candidate(3, 10, 9, 0, 2.0),
        ];
        let first = rank(input.clone(), RankingStrategy::Relevance, &ctx);
        let second = rank(input, RankingStrategy::Relevance, &ctx);
        assert_eq!(first, second);
    }
}

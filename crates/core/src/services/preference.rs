//! Preference engine: tag affinities and preferred creators.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use pulse_common::AppResult;
use pulse_db::entities::interaction_event::{self, CONTENT_TYPE_TAG};
use pulse_db::entities::post_tag::Category;
use pulse_db::repositories::{InteractionRepository, LikeRepository};
use serde::Serialize;
use tracing::debug;

use super::query_filter::validate_user_id;

/// Snapshot of what a user gravitates towards. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    pub user_id: i64,
    /// Summed tag-level interaction scores inside the window.
    pub tag_affinities: BTreeMap<Category, f64>,
    /// Creators by like count desc, creator ID asc.
    pub preferred_creators: Vec<i64>,
    pub computed_at: DateTime<Utc>,
}

impl UserPreferences {
    /// The `n` highest-affinity tags, ties broken by tag name.
    #[must_use]
    pub fn top_tags(&self, n: usize) -> Vec<Category> {
        let mut tags: Vec<(Category, f64)> =
            self.tag_affinities.iter().map(|(t, s)| (*t, *s)).collect();
        tags.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));
        tags.into_iter().take(n).map(|(t, _)| t).collect()
    }
}

/// Sum tag-level event scores per tag for events at or after `cutoff`.
///
/// Events that are not tag-level or whose tag is unknown are ignored.
#[must_use]
pub fn aggregate_affinities(
    events: &[interaction_event::Model],
    cutoff: DateTime<Utc>,
) -> BTreeMap<Category, f64> {
    let mut affinities = BTreeMap::new();
    for event in events {
        if event.content_type != CONTENT_TYPE_TAG || event.created_at < cutoff {
            continue;
        }
        let Some(tag) = event.content_meta.as_deref().and_then(Category::parse) else {
            continue;
        };
        *affinities.entry(tag).or_insert(0.0) += event.score;
    }
    affinities
}

/// Preference service for business logic.
#[derive(Clone)]
pub struct PreferenceService {
    interaction_repo: InteractionRepository,
    like_repo: LikeRepository,
    window_days: i64,
    creator_limit: u64,
}

impl PreferenceService {
    /// Create a new preference service.
    #[must_use]
    pub const fn new(
        interaction_repo: InteractionRepository,
        like_repo: LikeRepository,
        window_days: i64,
        creator_limit: u64,
    ) -> Self {
        Self {
            interaction_repo,
            like_repo,
            window_days,
            creator_limit,
        }
    }

    /// Compute preferences for a user from scratch.
    pub async fn compute(&self, user_id: i64) -> AppResult<UserPreferences> {
        self.compute_at(user_id, Utc::now()).await
    }

    /// Compute preferences relative to `now`.
    pub async fn compute_at(&self, user_id: i64, now: DateTime<Utc>) -> AppResult<UserPreferences> {
        validate_user_id(user_id)?;

        let cutoff = now - Duration::days(self.window_days);
        let events = self
            .interaction_repo
            .tag_events_since(user_id, cutoff.into())
            .await?;
        let tag_affinities = aggregate_affinities(&events, cutoff);

        let preferred_creators = self
            .like_repo
            .top_liked_creators(user_id, self.creator_limit)
            .await?
            .into_iter()
            .map(|c| c.creator_id)
            .collect::<Vec<_>>();

        debug!(
            user_id,
            tags = tag_affinities.len(),
            creators = preferred_creators.len(),
            "Computed user preferences"
        );

        Ok(UserPreferences {
            user_id,
            tag_affinities,
            preferred_creators,
            computed_at: now,
        })
    }
}

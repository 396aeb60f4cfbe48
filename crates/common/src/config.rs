//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Ranking and discovery tuning.
    #[serde(default)]
    pub ranking: RankingConfig,
    /// Background maintenance configuration.
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Seconds to wait when opening or acquiring a connection.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Seconds an idle connection stays in the pool.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Log every statement at debug level.
    #[serde(default)]
    pub log_statements: bool,
}

/// Ranking, pagination and personalization settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RankingConfig {
    /// Page size used when a request omits or exceeds the limit.
    #[serde(default = "default_limit")]
    pub default_limit: u64,
    /// Largest accepted page size.
    #[serde(default = "default_max_limit")]
    pub max_limit: u64,
    /// Maximum number of candidates materialized per request.
    #[serde(default = "default_candidate_cap")]
    pub candidate_cap: u64,
    /// Size of the "recommended for you" pool.
    #[serde(default = "default_recommend_page_size")]
    pub recommend_page_size: u64,
    /// Additive relevance bonus for posts carrying a preferred tag.
    #[serde(default = "default_relevance_boost")]
    pub relevance_boost: f64,
    /// How many of the user's highest-affinity tags receive the boost.
    #[serde(default = "default_boost_tag_count")]
    pub boost_tag_count: usize,
    /// Maximum recency bonus in the relevance formula (fresh posts).
    #[serde(default = "default_recency_weight")]
    pub recency_weight: f64,
    /// Weight of shares in the popularity score.
    #[serde(default)]
    pub share_weight: f64,
    /// Lookback window for tag affinities, in days.
    #[serde(default = "default_preference_window_days")]
    pub preference_window_days: i64,
    /// Number of preferred creators kept per user.
    #[serde(default = "default_preferred_creator_limit")]
    pub preferred_creator_limit: u64,
    /// Minimum posts for a tag to qualify as trending.
    #[serde(default = "default_min_trending_posts")]
    pub min_trending_posts: i64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            candidate_cap: default_candidate_cap(),
            recommend_page_size: default_recommend_page_size(),
            relevance_boost: default_relevance_boost(),
            boost_tag_count: default_boost_tag_count(),
            recency_weight: default_recency_weight(),
            share_weight: 0.0,
            preference_window_days: default_preference_window_days(),
            preferred_creator_limit: default_preferred_creator_limit(),
            min_trending_posts: default_min_trending_posts(),
        }
    }
}

/// Background maintenance configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MaintenanceConfig {
    /// Whether the maintenance scheduler runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Interaction events older than this are purged.
    #[serde(default = "default_retention_days")]
    pub interaction_retention_days: i64,
    /// Seconds between purge runs.
    #[serde(default = "default_purge_interval_secs")]
    pub purge_interval_secs: u64,
    /// Seconds between full metrics recomputes.
    #[serde(default = "default_recompute_interval_secs")]
    pub recompute_interval_secs: u64,
    /// Posts refreshed per recompute batch.
    #[serde(default = "default_recompute_batch_size")]
    pub recompute_batch_size: u64,
    /// Upper bound on a single maintenance run, in seconds.
    #[serde(default = "default_time_box_secs")]
    pub time_box_secs: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interaction_retention_days: default_retention_days(),
            purge_interval_secs: default_purge_interval_secs(),
            recompute_interval_secs: default_recompute_interval_secs(),
            recompute_batch_size: default_recompute_batch_size(),
            time_box_secs: default_time_box_secs(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    50
}

const fn default_min_connections() -> u32 {
    5
}

const fn default_connect_timeout_secs() -> u64 {
    10
}

const fn default_idle_timeout_secs() -> u64 {
    600
}

const fn default_limit() -> u64 {
    20
}

const fn default_max_limit() -> u64 {
    100
}

const fn default_candidate_cap() -> u64 {
    1000
}

const fn default_recommend_page_size() -> u64 {
    30
}

const fn default_relevance_boost() -> f64 {
    10.0
}

const fn default_boost_tag_count() -> usize {
    3
}

const fn default_recency_weight() -> f64 {
    24.0
}

const fn default_preference_window_days() -> i64 {
    30
}

const fn default_preferred_creator_limit() -> u64 {
    10
}

const fn default_min_trending_posts() -> i64 {
    3
}

const fn default_true() -> bool {
    true
}

const fn default_retention_days() -> i64 {
    90
}

const fn default_purge_interval_secs() -> u64 {
    3600
}

const fn default_recompute_interval_secs() -> u64 {
    900
}

const fn default_recompute_batch_size() -> u64 {
    500
}

const fn default_time_box_secs() -> u64 {
    60
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `PULSE_ENV`)
    /// 3. Environment variables with `PULSE_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("PULSE_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("PULSE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("PULSE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ranking_defaults() {
        let ranking = RankingConfig::default();
        assert_eq!(ranking.default_limit, 20);
        assert_eq!(ranking.max_limit, 100);
        assert_eq!(ranking.recommend_page_size, 30);
        assert_eq!(ranking.relevance_boost, 10.0);
        assert_eq!(ranking.share_weight, 0.0);
        assert_eq!(ranking.min_trending_posts, 3);
    }

    #[test]
    fn test_deserialize_minimal_config() {
        let source = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [database]
                url = "postgres://localhost/pulse"

                [ranking]
                candidate_cap = 250
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();

        let config: Config = source.try_deserialize().unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.database.max_connections, 50);
        assert_eq!(config.database.connect_timeout_secs, 10);
        assert!(!config.database.log_statements);
        assert_eq!(config.ranking.candidate_cap, 250);
        assert_eq!(config.ranking.default_limit, 20);
        assert!(config.maintenance.enabled);
        assert_eq!(config.maintenance.interaction_retention_days, 90);
    }
}

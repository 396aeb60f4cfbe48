//! Periodic maintenance: interaction retention and metrics recompute.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use pulse_common::config::MaintenanceConfig;
use pulse_common::{AppResult, get_metrics};
use tokio::time::interval;

use super::interaction::InteractionService;
use super::post_metrics::{PostMetricsService, RecomputeReport};

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between interaction purges (default: 1 hour).
    pub purge_interval: Duration,
    /// Interval between full metrics recomputes (default: 15 minutes).
    pub recompute_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            purge_interval: Duration::from_secs(3600),
            recompute_interval: Duration::from_secs(900),
        }
    }
}

impl From<&MaintenanceConfig> for SchedulerConfig {
    fn from(config: &MaintenanceConfig) -> Self {
        Self {
            purge_interval: Duration::from_secs(config.purge_interval_secs.max(1)),
            recompute_interval: Duration::from_secs(config.recompute_interval_secs.max(1)),
        }
    }
}

/// Executor for scheduled maintenance jobs.
#[async_trait::async_trait]
pub trait MaintenanceExecutor: Send + Sync {
    /// Delete interaction events past retention. Returns rows removed.
    async fn purge_interactions(&self) -> AppResult<u64>;

    /// Refresh every post's metrics within the time box.
    async fn recompute_metrics(&self) -> AppResult<RecomputeReport>;
}

/// Maintenance jobs backed by the interaction and metrics services.
#[derive(Clone)]
pub struct MaintenanceService {
    interactions: InteractionService,
    post_metrics: PostMetricsService,
    config: MaintenanceConfig,
}

impl MaintenanceService {
    /// Create a new maintenance service.
    #[must_use]
    pub const fn new(
        interactions: InteractionService,
        post_metrics: PostMetricsService,
        config: MaintenanceConfig,
    ) -> Self {
        Self {
            interactions,
            post_metrics,
            config,
        }
    }
}

#[async_trait::async_trait]
impl MaintenanceExecutor for MaintenanceService {
    async fn purge_interactions(&self) -> AppResult<u64> {
        let cutoff = Utc::now() - chrono::Duration::days(self.config.interaction_retention_days);
        self.interactions.purge(cutoff).await
    }

    async fn recompute_metrics(&self) -> AppResult<RecomputeReport> {
        let deadline = Instant::now() + Duration::from_secs(self.config.time_box_secs);
        let report = self
            .post_metrics
            .recompute_all(self.config.recompute_batch_size, deadline)
            .await?;

        if report.time_boxed {
            get_metrics().record_time_boxed();
        }
        Ok(report)
    }
}

/// Run the maintenance jobs on their intervals. Each job runs in its own task.
pub async fn run_scheduler<E: MaintenanceExecutor + 'static>(config: SchedulerConfig, executor: Arc<E>) {
    let executor_purge = executor.clone();
    let executor_recompute = executor;

    let purge_interval = config.purge_interval;
    let recompute_interval = config.recompute_interval;

    // Spawn interaction purge task
    tokio::spawn(async move {
        let mut interval = interval(purge_interval);
        loop {
            interval.tick().await;
            match executor_purge.purge_interactions().await {
                Ok(count) => {
                    if count > 0 {
                        tracing::info!(count, "Purged expired interaction events");
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to purge interaction events");
                }
            }
        }
    });

    // Spawn metrics recompute task
    tokio::spawn(async move {
        let mut interval = interval(recompute_interval);
        loop {
            interval.tick().await;
            match executor_recompute.recompute_metrics().await {
                Ok(report) => {
                    if report.time_boxed {
                        tracing::warn!(
                            refreshed = report.refreshed,
                            failed = report.failed,
                            "Metrics recompute stopped at its time box"
                        );
                    } else {
                        tracing::info!(
                            refreshed = report.refreshed,
                            failed = report.failed,
                            "Recomputed post metrics"
                        );
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to recompute post metrics");
                }
            }
        }
    });
}

//! Metrics collection for pulse.
//!
//! Counters for the request-serving paths (search, discovery, recommendation),
//! the interaction log, and background maintenance.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Global metrics instance.
static METRICS: std::sync::OnceLock<Arc<Metrics>> = std::sync::OnceLock::new();

/// Get the global metrics instance.
pub fn get_metrics() -> &'static Arc<Metrics> {
    METRICS.get_or_init(|| Arc::new(Metrics::new()))
}

/// Initialize global metrics with custom instance.
pub fn init_metrics(metrics: Arc<Metrics>) -> Result<(), Arc<Metrics>> {
    METRICS.set(metrics)
}

/// Application metrics collector.
#[derive(Debug)]
pub struct Metrics {
    // === Request Metrics ===
    /// Total HTTP requests received
    pub http_requests_total: AtomicU64,
    /// HTTP requests by status code category (2xx, 4xx, 5xx)
    pub http_requests_2xx: AtomicU64,
    pub http_requests_4xx: AtomicU64,
    pub http_requests_5xx: AtomicU64,
    /// Total request latency in microseconds
    pub http_request_latency_us_total: AtomicU64,

    // === Database Metrics ===
    /// Backing-store errors surfaced to callers
    pub db_errors_total: AtomicU64,

    // === Feed Metrics ===
    /// Search requests served
    pub searches_total: AtomicU64,
    /// Total search time in microseconds
    pub search_time_us_total: AtomicU64,
    /// Discovery feeds composed
    pub discoveries_total: AtomicU64,
    /// "Recommended for you" feeds composed
    pub recommendations_total: AtomicU64,
    /// Requests rejected by validation
    pub validation_failures_total: AtomicU64,
    /// Enrichment steps skipped after a failure
    pub partial_results_total: AtomicU64,

    // === Signal Metrics ===
    /// Interaction events appended (including tag fan-out)
    pub interactions_recorded: AtomicU64,
    /// Post metrics refreshes completed
    pub metrics_refreshes: AtomicU64,
    /// Post metrics refreshes that failed
    pub metrics_refresh_failures: AtomicU64,

    // === Maintenance Metrics ===
    /// Interaction events removed by retention purge
    pub interactions_purged: AtomicU64,
    /// Maintenance runs that hit their time box
    pub maintenance_time_boxed: AtomicU64,
}

impl Metrics {
    /// Create a new metrics instance with all counters at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            http_requests_total: AtomicU64::new(0),
            http_requests_2xx: AtomicU64::new(0),
            http_requests_4xx: AtomicU64::new(0),
            http_requests_5xx: AtomicU64::new(0),
            http_request_latency_us_total: AtomicU64::new(0),

            db_errors_total: AtomicU64::new(0),

            searches_total: AtomicU64::new(0),
            search_time_us_total: AtomicU64::new(0),
            discoveries_total: AtomicU64::new(0),
            recommendations_total: AtomicU64::new(0),
            validation_failures_total: AtomicU64::new(0),
            partial_results_total: AtomicU64::new(0),

            interactions_recorded: AtomicU64::new(0),
            metrics_refreshes: AtomicU64::new(0),
            metrics_refresh_failures: AtomicU64::new(0),

            interactions_purged: AtomicU64::new(0),
            maintenance_time_boxed: AtomicU64::new(0),
        }
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, status_code: u16, latency: Duration) {
        self.http_requests_total.fetch_add(1, Ordering::Relaxed);

        match status_code {
            200..=299 => self.http_requests_2xx.fetch_add(1, Ordering::Relaxed),
            400..=499 => self.http_requests_4xx.fetch_add(1, Ordering::Relaxed),
            500..=599 => self.http_requests_5xx.fetch_add(1, Ordering::Relaxed),
            _ => 0,
        };

        self.http_request_latency_us_total
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
    }

    /// Record a search.
    pub fn record_search(&self, duration: Duration) {
        self.searches_total.fetch_add(1, Ordering::Relaxed);
        self.search_time_us_total
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Record a composed discovery feed.
    pub fn record_discovery(&self) {
        self.discoveries_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a composed recommendation feed.
    pub fn record_recommendation(&self) {
        self.recommendations_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request rejected by validation.
    pub fn record_validation_failure(&self) {
        self.validation_failures_total
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Record a skipped enrichment step.
    pub fn record_partial_result(&self) {
        self.partial_results_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a backing-store error.
    pub fn record_db_error(&self) {
        self.db_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record appended interaction events.
    pub fn record_interactions(&self, count: u64) {
        self.interactions_recorded
            .fetch_add(count, Ordering::Relaxed);
    }

    /// Record a metrics refresh outcome.
    pub fn record_metrics_refresh(&self, success: bool) {
        if success {
            self.metrics_refreshes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.metrics_refresh_failures
                .fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record purged interaction events.
    pub fn record_purge(&self, rows: u64) {
        self.interactions_purged.fetch_add(rows, Ordering::Relaxed);
    }

    /// Record a maintenance run that stopped at its time box.
    pub fn record_time_boxed(&self) {
        self.maintenance_time_boxed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all metrics.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            http_requests_total: self.http_requests_total.load(Ordering::Relaxed),
            http_requests_2xx: self.http_requests_2xx.load(Ordering::Relaxed),
            http_requests_4xx: self.http_requests_4xx.load(Ordering::Relaxed),
            http_requests_5xx: self.http_requests_5xx.load(Ordering::Relaxed),
            http_request_latency_avg_us: self.average_latency_us(),

            db_errors_total: self.db_errors_total.load(Ordering::Relaxed),

            searches_total: self.searches_total.load(Ordering::Relaxed),
            search_avg_time_us: self.average_search_time_us(),
            discoveries_total: self.discoveries_total.load(Ordering::Relaxed),
            recommendations_total: self.recommendations_total.load(Ordering::Relaxed),
            validation_failures_total: self.validation_failures_total.load(Ordering::Relaxed),
            partial_results_total: self.partial_results_total.load(Ordering::Relaxed),

            interactions_recorded: self.interactions_recorded.load(Ordering::Relaxed),
            metrics_refreshes: self.metrics_refreshes.load(Ordering::Relaxed),
            metrics_refresh_failures: self.metrics_refresh_failures.load(Ordering::Relaxed),

            interactions_purged: self.interactions_purged.load(Ordering::Relaxed),
            maintenance_time_boxed: self.maintenance_time_boxed.load(Ordering::Relaxed),
        }
    }

    /// Calculate average HTTP request latency.
    fn average_latency_us(&self) -> u64 {
        let total = self.http_request_latency_us_total.load(Ordering::Relaxed);
        let count = self.http_requests_total.load(Ordering::Relaxed);
        if count > 0 { total / count } else { 0 }
    }

    /// Calculate average search time.
    fn average_search_time_us(&self) -> u64 {
        let total = self.search_time_us_total.load(Ordering::Relaxed);
        let count = self.searches_total.load(Ordering::Relaxed);
        if count > 0 { total / count } else { 0 }
    }

    /// Export metrics in Prometheus format.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let mut output = String::new();

        let mut counter = |name: &str, help: &str, value: u64| {
            output.push_str(&format!("# HELP pulse_{name} {help}\n"));
            output.push_str(&format!("# TYPE pulse_{name} counter\n"));
            output.push_str(&format!("pulse_{name} {value}\n"));
        };

        counter("http_requests_total", "Total HTTP requests", snapshot.http_requests_total);
        counter("db_errors_total", "Backing store errors", snapshot.db_errors_total);
        counter("searches_total", "Search requests served", snapshot.searches_total);
        counter("discoveries_total", "Discovery feeds composed", snapshot.discoveries_total);
        counter(
            "recommendations_total",
            "Recommendation feeds composed",
            snapshot.recommendations_total,
        );
        counter(
            "validation_failures_total",
            "Requests rejected by validation",
            snapshot.validation_failures_total,
        );
        counter(
            "partial_results_total",
            "Enrichment steps skipped",
            snapshot.partial_results_total,
        );
        counter(
            "interactions_recorded",
            "Interaction events appended",
            snapshot.interactions_recorded,
        );
        counter("metrics_refreshes", "Post metrics refreshes", snapshot.metrics_refreshes);
        counter(
            "metrics_refresh_failures",
            "Failed post metrics refreshes",
            snapshot.metrics_refresh_failures,
        );
        counter(
            "interactions_purged",
            "Interaction events purged",
            snapshot.interactions_purged,
        );

        output.push_str("# HELP pulse_http_requests_by_status HTTP requests by status\n");
        output.push_str("# TYPE pulse_http_requests_by_status counter\n");
        output.push_str(&format!(
            "pulse_http_requests_by_status{{status=\"2xx\"}} {}\n",
            snapshot.http_requests_2xx
        ));
        output.push_str(&format!(
            "pulse_http_requests_by_status{{status=\"4xx\"}} {}\n",
            snapshot.http_requests_4xx
        ));
        output.push_str(&format!(
            "pulse_http_requests_by_status{{status=\"5xx\"}} {}\n",
            snapshot.http_requests_5xx
        ));

        output.push_str("# HELP pulse_search_avg_time_us Average search time\n");
        output.push_str("# TYPE pulse_search_avg_time_us gauge\n");
        output.push_str(&format!(
            "pulse_search_avg_time_us {}\n",
            snapshot.search_avg_time_us
        ));

        output
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of all metrics at a point in time.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    // HTTP
    pub http_requests_total: u64,
    pub http_requests_2xx: u64,
    pub http_requests_4xx: u64,
    pub http_requests_5xx: u64,
    pub http_request_latency_avg_us: u64,

    // Database
    pub db_errors_total: u64,

    // Feeds
    pub searches_total: u64,
    pub search_avg_time_us: u64,
    pub discoveries_total: u64,
    pub recommendations_total: u64,
    pub validation_failures_total: u64,
    pub partial_results_total: u64,

    // Signals
    pub interactions_recorded: u64,
    pub metrics_refreshes: u64,
    pub metrics_refresh_failures: u64,

    // Maintenance
    pub interactions_purged: u64,
    pub maintenance_time_boxed: u64,
}

/// Timer guard for measuring operation duration.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    #[must_use]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration since timer start.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

//! Pulse server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use pulse_api::{AppState, app};
use pulse_common::{Config, IdGenerator};
use pulse_core::{
    DiscoveryService, InteractionService, MaintenanceService, PostMetricsService,
    PreferenceService, SchedulerConfig, SearchService, TagTrendService, run_scheduler,
};
use pulse_db::repositories::{
    CommentRepository, InteractionRepository, LikeRepository, PostMetricsRepository,
    PostRepository, UserRepository,
};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pulse=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting pulse server...");

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Connect to database
    let db = Arc::new(pulse_db::init(&config.database).await?);
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    pulse_db::migrate(&db).await?;
    info!("Migrations completed");

    // Repositories
    let post_repo = PostRepository::new(Arc::clone(&db));
    let user_repo = UserRepository::new(Arc::clone(&db));
    let like_repo = LikeRepository::new(Arc::clone(&db));
    let comment_repo = CommentRepository::new(Arc::clone(&db));
    let interaction_repo = InteractionRepository::new(Arc::clone(&db));
    let metrics_repo = PostMetricsRepository::new(Arc::clone(&db));

    // Services
    let ranking = config.ranking.clone();
    let post_metrics_service = PostMetricsService::new(
        post_repo.clone(),
        interaction_repo.clone(),
        like_repo.clone(),
        comment_repo,
        metrics_repo.clone(),
        ranking.share_weight,
    );
    let preference_service = PreferenceService::new(
        interaction_repo.clone(),
        like_repo.clone(),
        ranking.preference_window_days,
        ranking.preferred_creator_limit,
    );
    let search_service = SearchService::new(
        post_repo.clone(),
        user_repo,
        post_metrics_service.clone(),
        preference_service.clone(),
        ranking.clone(),
    );
    let discovery_service = DiscoveryService::new(
        search_service.clone(),
        post_repo.clone(),
        like_repo,
        interaction_repo.clone(),
        metrics_repo,
        ranking.recommend_page_size,
    );
    let interaction_service = InteractionService::new(
        interaction_repo,
        post_repo.clone(),
        post_metrics_service.clone(),
        IdGenerator::new(),
    );
    let tag_trend_service = TagTrendService::new(post_repo, ranking.min_trending_posts);

    // Start background maintenance
    if config.maintenance.enabled {
        let maintenance = Arc::new(MaintenanceService::new(
            interaction_service.clone(),
            post_metrics_service,
            config.maintenance.clone(),
        ));
        run_scheduler(SchedulerConfig::from(&config.maintenance), maintenance).await;
        info!(
            retention_days = config.maintenance.interaction_retention_days,
            "Maintenance scheduler started"
        );
    } else {
        info!("Maintenance scheduler disabled");
    }

    let state = AppState {
        search_service,
        discovery_service,
        interaction_service,
        preference_service,
        tag_trend_service,
    };

    // Start server with graceful shutdown
    let host: std::net::IpAddr = config
        .server
        .host
        .parse()
        .context("invalid server host")?;
    let addr = SocketAddr::from((host, config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

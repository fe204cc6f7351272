mod api;
mod middleware;
mod runner;
mod scheduler;

use std::sync::Arc;

use catsync_harvester::{CircuitBreaker, Harvester, SearchTransport, SyncService};
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, AppState},
    middleware::{AuthState, RateLimits},
    runner::SyncContext,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = catsync_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    // Fail fast on a bad categories file instead of at the first scheduled tick.
    let categories = catsync_core::load_categories(&config.categories_path)?;
    tracing::info!(
        enabled = categories.enabled().len(),
        path = %config.categories_path.display(),
        "categories loaded"
    );

    let pool = catsync_db::connect_pool_from_config(&config).await?;
    catsync_db::run_migrations(&pool).await?;

    let transport = SearchTransport::new(config.harvest.remote.clone())?;
    let breaker = Arc::new(CircuitBreaker::new(config.harvest.breaker.clone()));
    let harvester = Harvester::new(transport, breaker, &config.harvest);
    let sync = SyncService::new(harvester, catsync_db::PgSnapshotStore::new(pool.clone()));

    let ctx = SyncContext {
        pool,
        sync: Arc::new(sync),
        categories_path: Arc::new(config.categories_path.clone()),
    };

    let _scheduler = scheduler::build_scheduler(ctx.clone(), &config.sync_cron).await?;

    let auth = AuthState::from_env(matches!(
        config.env,
        catsync_core::Environment::Development
    ))?;
    let app = build_app(AppState { ctx }, auth, RateLimits::default());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, env = %config.env, "catsync server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}

use calmpath::config::ServiceConfig;
use calmpath::db::{seed, PgStore};
use calmpath::engine::Engine;
use calmpath::middleware::{rate_limit_middleware, RateLimiter};
use calmpath::state::{AppState, SharedState};
use calmpath::store::memory::MemoryStore;
use calmpath::web;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServiceConfig::from_env();

    let engine = match config.database_url.as_deref() {
        Some(database_url) => {
            tracing::info!("Connecting to database...");
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(database_url)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to connect to database: {}", e);
                    e
                })?;
            tracing::info!("Database connection established");

            tracing::info!("Running database migrations...");
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to run database migrations: {}", e);
                    e
                })?;
            tracing::info!("Database migrations completed");

            seed::seed_catalog(&pool).await?;
            Engine::new(Arc::new(PgStore::new(pool)), config.engine.clone())
        }
        None => {
            tracing::warn!("DATABASE_URL not set, keeping all state in memory");
            let store = MemoryStore::with_catalog(seed::default_catalog());
            Engine::new(Arc::new(store), config.engine.clone())
        }
    };

    let shared: SharedState = Arc::new(AppState {
        engine: Arc::new(engine),
    });
    let limiter = RateLimiter::per_minute(config.rate_limit_per_minute);

    let scheduler = JobScheduler::new().await?;

    // Mode expiry and alert regeneration, 03:00 UTC
    let shared_for_sweep = shared.clone();
    scheduler
        .add(Job::new_async("0 0 3 * * *", move |_uuid, _l| {
            let state = shared_for_sweep.clone();
            Box::pin(async move {
                tracing::info!("Starting daily sweep...");
                match state.engine.run_daily_sweep(chrono::Utc::now()).await {
                    Ok(processed) => tracing::info!("Daily sweep processed {} users", processed),
                    Err(e) => tracing::error!("Daily sweep failed: {}", e),
                }
            })
        })?)
        .await?;

    let limiter_for_cleanup = limiter.clone();
    scheduler
        .add(Job::new_async("0 0 * * * *", move |_uuid, _l| {
            let limiter = limiter_for_cleanup.clone();
            Box::pin(async move {
                limiter.cleanup().await;
            })
        })?)
        .await?;

    scheduler.start().await?;
    tracing::info!("Scheduler started:");
    tracing::info!("  - Daily sweep: 03:00 UTC");
    tracing::info!("  - Rate limiter cleanup: hourly");

    let app = web::routes(shared)
        .layer(axum::middleware::from_fn_with_state(
            limiter,
            rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

//! Store replenishment server

use std::{net::SocketAddr, sync::Arc, time::Duration};

use replenishment_backend::{
    create_app,
    ledger::PgOrderLedger,
    services::PgOfferSource,
    snapshots::SnapshotCache,
    AppState, Config,
};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "replenishment_backend=debug,shared=info,tower_http=debug,sqlx=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!("Starting store replenishment server");
    tracing::info!("Environment: {}", config.environment);

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database.url)
        .await?;

    tracing::info!("Database connection established");

    // Run migrations in development
    if config.environment == "development" {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&db_pool).await?;
        tracing::info!("Migrations completed");
    }

    let snapshots = SnapshotCache::new(&config.snapshots, config.snapshots.source_options()?);
    // Warm the cache so a broken export shows up in the startup log
    for source in &snapshots.status().sources {
        match &source.error {
            Some(error) => tracing::warn!(source = %source.source, %error, "snapshot not loaded"),
            None => tracing::info!(source = %source.source, path = %source.path, "snapshot ready"),
        }
    }

    // Create application state
    let state = AppState {
        ledger: Arc::new(PgOrderLedger::new(db_pool.clone())),
        offers: Arc::new(PgOfferSource::new(db_pool.clone())),
        snapshots: Arc::new(snapshots),
        db: db_pool,
        config: Arc::new(config.clone()),
    };

    // Build application
    let app = create_app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

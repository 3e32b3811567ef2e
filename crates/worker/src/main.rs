use std::sync::Arc;

use cirrus_db::store::PgTaskStore;
use cirrus_worker::config::WorkerConfig;
use cirrus_worker::provider::PgTenantProvider;
use cirrus_worker::runner::TaskRunner;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cirrus_worker=debug,cirrus_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env();

    let pool = cirrus_db::create_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    cirrus_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database connection established");

    let runner = TaskRunner::new(
        Arc::new(PgTaskStore::new(pool.clone())),
        Arc::new(PgTenantProvider::new(pool)),
    )
    .with_poll_interval(config.poll_interval)
    .with_batch_size(config.batch_size);

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
        }
        shutdown.cancel();
    });

    runner.run(cancel).await;
    tracing::info!("Worker stopped");
}

//! Encore API server.
//!
//! Serves the ticket-ordering HTTP surface and runs the result consumer for
//! the lifetime of the process.
//!
//! # Usage
//!
//! ```bash
//! # Start infrastructure (PostgreSQL, Redis, Kafka)
//! docker compose up -d
//!
//! # Run the API server
//! cargo run --bin encore-api
//! ```

use encore_api::consumer::ResultConsumer;
use encore_api::routes::build_router;
use encore_api::{AppState, PendingResults};
use encore_cache::RedisTtlCache;
use encore_core::Config;
use encore_kafka::{TicketProducer, TopicManager};
use encore_postgres::PostgresEntityStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,encore=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Encore API server...");

    let config = Config::from_env();
    info!(
        address = %config.server.bind_addr(),
        brokers = %config.kafka.bootstrap_servers,
        order_timeout_secs = config.server.order_timeout,
        "Configuration loaded"
    );

    let pool = encore_postgres::connect(&config.database).await?;
    let store = Arc::new(PostgresEntityStore::new(pool));

    let cache = Arc::new(RedisTtlCache::connect(&config.redis.url()).await?);

    let producer = Arc::new(TicketProducer::new(
        &config.kafka.bootstrap_servers,
        config.kafka.send_timeout(),
    )?);
    let topics = Arc::new(TopicManager::new(
        &config.kafka.bootstrap_servers,
        config.kafka.replication_factor,
    )?);

    let pending = Arc::new(PendingResults::new());
    let (shutdown_tx, _) = broadcast::channel(1);

    let consumer = ResultConsumer::new(
        config.kafka.bootstrap_servers.clone(),
        pending.clone(),
        cache.clone(),
        config.redis.entry_ttl(),
        shutdown_tx.subscribe(),
    );
    let consumer_handle = consumer.spawn();

    let state = AppState {
        store,
        cache,
        producer,
        topics,
        pending,
        order_timeout: config.server.order_wait(),
        cache_ttl: config.redis.entry_ttl(),
    };

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.server.bind_addr()).await?;

    info!("Encore API server is running; press Ctrl+C to shut down");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped, shutting down background tasks...");
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(Duration::from_secs(10), consumer_handle).await {
        Ok(Ok(())) => info!("Result consumer stopped gracefully"),
        Ok(Err(e)) => warn!(error = %e, "Result consumer task failed"),
        Err(_) => warn!("Result consumer shutdown timed out"),
    }

    info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    use tokio::signal;

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
        () = ctrl_c => info!("Received Ctrl+C signal"),
        () = terminate => info!("Received SIGTERM signal"),
    }
}

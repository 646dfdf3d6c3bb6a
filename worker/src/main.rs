//! Reservation worker process.
//!
//! One consumer-group member per replica: the broker assigns partitions so
//! each zone is owned by exactly one live worker. The process runs two
//! cooperating tasks - the consume loop and the batch persister - and
//! drains both on shutdown.
//!
//! # Usage
//!
//! ```bash
//! # Start infrastructure (PostgreSQL, Redis, Kafka)
//! docker compose up -d
//!
//! # Run a worker replica
//! cargo run --bin encore-worker
//! ```

use encore_cache::RedisTtlCache;
use encore_core::store::ReservedTicket;
use encore_core::Config;
use encore_kafka::TicketProducer;
use encore_postgres::PostgresEntityStore;
use encore_worker::{AdmissionLedger, BatchPersister, OrderProcessor, ReservationWorker};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Capacity of the pending queue between the consume loop and the batch
/// persister. Bounded so a dead database eventually applies backpressure to
/// consumption instead of growing the heap.
const PENDING_QUEUE_CAPACITY: usize = 10_000;

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

    info!("Starting reservation worker...");

    let config = Config::from_env();
    info!(
        brokers = %config.kafka.bootstrap_servers,
        group = %config.kafka.consumer_group,
        batch_size = config.worker.batch_size,
        batch_timeout_secs = config.worker.batch_timeout,
        "Configuration loaded"
    );

    let pool = encore_postgres::connect(&config.database).await?;
    let store = Arc::new(PostgresEntityStore::new(pool));

    let cache = Arc::new(RedisTtlCache::connect(&config.redis.url()).await?);

    let producer = Arc::new(TicketProducer::new(
        &config.kafka.bootstrap_servers,
        config.kafka.send_timeout(),
    )?);

    let (batch_tx, batch_rx) = mpsc::channel::<ReservedTicket>(PENDING_QUEUE_CAPACITY);
    let (shutdown_tx, _) = broadcast::channel(1);

    let persister = BatchPersister::new(
        batch_rx,
        store.clone(),
        config.worker.batch_size,
        config.worker.batch_window(),
        shutdown_tx.subscribe(),
    );
    let persister_handle = persister.spawn();

    let admission = Arc::new(AdmissionLedger::new());
    let processor = OrderProcessor::new(
        store,
        cache,
        admission.clone(),
        batch_tx,
        config.redis.entry_ttl(),
    );

    let worker = ReservationWorker::new(
        &config.kafka.bootstrap_servers,
        &config.kafka.consumer_group,
        producer,
        processor,
        admission,
        shutdown_tx.subscribe(),
    )?;
    let worker_handle = worker.spawn();

    info!("Reservation worker is running; press Ctrl+C to shut down");

    shutdown_signal().await;

    info!("Shutting down gracefully...");
    let _ = shutdown_tx.send(());

    // The consume loop goes first so the pending queue stops growing, then
    // the persister drains what is left.
    for (name, handle) in [("worker", worker_handle), ("batch persister", persister_handle)] {
        match tokio::time::timeout(Duration::from_secs(10), handle).await {
            Ok(Ok(())) => info!(task = name, "Task stopped gracefully"),
            Ok(Err(e)) => warn!(task = name, error = %e, "Task failed"),
            Err(_) => warn!(task = name, "Task shutdown timed out"),
        }
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

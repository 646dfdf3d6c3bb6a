//! Time/size-triggered batch persistence of accepted reservations.
//!
//! The persister owns the consuming end of the pending queue and runs as a
//! separate task from the consume loop, so a slow or failing database never
//! blocks message processing. A batch is flushed when it reaches
//! `batch_size` records or when the batch window elapses with records
//! pending; a failed commit keeps the slice and retries on the next tick.

use encore_core::store::{EntityStore, ReservedTicket};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Attempts to land the final batch during shutdown before giving up.
const FINAL_FLUSH_ATTEMPTS: u32 = 3;

/// Background task draining the pending queue into bulk store commits.
pub struct BatchPersister {
    rx: mpsc::Receiver<ReservedTicket>,
    store: Arc<dyn EntityStore>,
    batch_size: usize,
    batch_timeout: Duration,
    shutdown: broadcast::Receiver<()>,
}

impl BatchPersister {
    /// Create a persister draining `rx` into `store`.
    #[must_use]
    pub fn new(
        rx: mpsc::Receiver<ReservedTicket>,
        store: Arc<dyn EntityStore>,
        batch_size: usize,
        batch_timeout: Duration,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            rx,
            store,
            batch_size,
            batch_timeout,
            shutdown,
        }
    }

    /// Spawn the persister as a background task.
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run until the shutdown signal fires or the queue closes, then drain
    /// and perform a final flush.
    pub async fn run(mut self) {
        info!(
            batch_size = self.batch_size,
            batch_timeout_secs = self.batch_timeout.as_secs(),
            "Batch persister started"
        );

        let mut pending: Vec<ReservedTicket> = Vec::new();
        let mut tick = tokio::time::interval(self.batch_timeout);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    info!("Batch persister received shutdown signal");
                    break;
                }
                received = self.rx.recv() => {
                    match received {
                        Some(record) => {
                            pending.push(record);
                            if pending.len() >= self.batch_size {
                                self.flush(&mut pending).await;
                                tick.reset();
                            }
                        }
                        None => {
                            info!("Pending queue closed");
                            break;
                        }
                    }
                }
                _ = tick.tick() => {
                    if !pending.is_empty() {
                        self.flush(&mut pending).await;
                    }
                }
            }
        }

        // Accepted records still in flight belong to this process: the
        // offsets behind them are already committed, so they must land now.
        while let Ok(record) = self.rx.try_recv() {
            pending.push(record);
        }

        for attempt in 1..=FINAL_FLUSH_ATTEMPTS {
            if pending.is_empty() {
                break;
            }
            self.flush(&mut pending).await;
            if !pending.is_empty() && attempt < FINAL_FLUSH_ATTEMPTS {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        }

        if pending.is_empty() {
            info!("Batch persister stopped");
        } else {
            error!(
                remaining = pending.len(),
                "Batch persister stopped with unpersisted reservations"
            );
        }
    }

    async fn flush(&self, pending: &mut Vec<ReservedTicket>) {
        if pending.is_empty() {
            return;
        }

        match self.store.persist_reservations(pending).await {
            Ok(inserted) => {
                debug!(batch = pending.len(), inserted = inserted, "Batch flushed");
                pending.clear();
            }
            Err(e) => {
                error!(
                    batch = pending.len(),
                    error = %e,
                    "Batch commit failed; retrying on next tick"
                );
            }
        }
    }
}

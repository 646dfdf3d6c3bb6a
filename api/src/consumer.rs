//! Background consumer of result events.
//!
//! Every API process runs one of these for its whole lifetime. It holds a
//! regex subscription over all `ticket-events-*` topics with a throwaway
//! consumer group, so each process sees every result regardless of which
//! replica produced the order. For each decoded [`TicketResultEvent`] it
//! does two independent things:
//!
//! 1. Deposit the payload into the correlator, waking a waiting handler.
//! 2. On success, write the `TicketDetail` into the TTL cache under the
//!    ticket id, so a later `GET /tickets/{id}` replays it without a
//!    database hit (the client may have timed out before the result came).
//!
//! The loop is subscribe-process-reconnect: a broken subscription is
//! retried after a delay, and the task exits on the shutdown signal.

use crate::correlator::PendingResults;
use encore_core::cache::{self, CachedValue, TtlCache};
use encore_core::events::TicketResultEvent;
use rdkafka::message::Message;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Result-consumer task for one API process.
pub struct ResultConsumer {
    brokers: String,
    pending: Arc<PendingResults>,
    cache: Arc<dyn TtlCache>,
    cache_ttl: Duration,
    shutdown: broadcast::Receiver<()>,
    retry_delay: Duration,
}

impl ResultConsumer {
    /// Create a consumer task over the given correlator and cache.
    #[must_use]
    pub fn new(
        brokers: impl Into<String>,
        pending: Arc<PendingResults>,
        cache: Arc<dyn TtlCache>,
        cache_ttl: Duration,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            brokers: brokers.into(),
            pending,
            cache,
            cache_ttl,
            shutdown,
            retry_delay: Duration::from_secs(5),
        }
    }

    /// Spawn the consumer as a background task.
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run the subscribe-process-reconnect loop until shutdown.
    pub async fn run(mut self) {
        info!("Result consumer started");

        loop {
            let consumer = match encore_kafka::result_consumer(&self.brokers) {
                Ok(consumer) => consumer,
                Err(e) => {
                    error!(
                        error = %e,
                        "Failed to subscribe to result topics, retrying in {:?}",
                        self.retry_delay
                    );
                    tokio::select! {
                        _ = self.shutdown.recv() => break,
                        () = tokio::time::sleep(self.retry_delay) => continue,
                    }
                }
            };

            let stopped = self.process(&consumer).await;
            if stopped {
                break;
            }

            warn!(
                "Result stream interrupted, resubscribing in {:?}",
                self.retry_delay
            );
            tokio::time::sleep(self.retry_delay).await;
        }

        info!("Result consumer stopped");
    }

    /// Process messages until shutdown (returns `true`) or a fatal stream
    /// error (returns `false`, caller resubscribes).
    async fn process(&mut self, consumer: &rdkafka::consumer::StreamConsumer) -> bool {
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    info!("Result consumer received shutdown signal");
                    return true;
                }
                received = consumer.recv() => {
                    match received {
                        Ok(message) => {
                            let Some(payload) = message.payload() else {
                                warn!(topic = message.topic(), "Result record has no payload");
                                continue;
                            };
                            match serde_json::from_slice::<TicketResultEvent>(payload) {
                                Ok(result) => self.handle_result(result).await,
                                Err(e) => {
                                    warn!(
                                        topic = message.topic(),
                                        offset = message.offset(),
                                        error = %e,
                                        "Undecodable result record"
                                    );
                                }
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "Error receiving result");
                            return false;
                        }
                    }
                }
            }
        }
    }

    async fn handle_result(&self, result: TicketResultEvent) {
        tracing::debug!(
            ticket_id = %result.ticket_id,
            status = ?result.status,
            "Result received"
        );

        let replay = result
            .is_success()
            .then(|| result.ticket_data.clone())
            .flatten();
        let ticket_id = result.ticket_id;

        self.pending.deposit(result);

        // Cached independently of any waiter: the client may already have
        // timed out, and the next GET must still find the ticket.
        if let Some(detail) = replay {
            let key = ticket_id.to_string();
            if let Err(e) = cache::write_value(
                self.cache.as_ref(),
                &key,
                &CachedValue::TicketDetail(detail),
                self.cache_ttl,
            )
            .await
            {
                warn!(ticket_id = %ticket_id, error = %e, "Failed to cache result for replay");
            }
        }
    }
}

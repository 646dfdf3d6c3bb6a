//! Order validation and the worker's consume loop.
//!
//! [`OrderProcessor`] holds the per-message algorithm and is independent of
//! the broker, so tests drive it directly against in-memory seams.
//! [`ReservationWorker`] wraps it with the Kafka consume loop, result
//! production and offset commits.

use crate::admission::AdmissionLedger;
use encore_core::cache::{self, CachedValue, TtlCache};
use encore_core::entities::{ConcertDetail, Zone};
use encore_core::events::{TicketOrderEvent, TicketResultEvent, SOLD_OUT_ERROR};
use encore_core::store::{EntityStore, ReservedTicket, StoreError};
use encore_core::types::{ConcertId, ZoneId};
use encore_kafka::TicketProducer;
use rdkafka::consumer::{CommitMode, Consumer, ConsumerContext, Rebalance, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::ClientContext;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

/// Message carried to the buyer alongside a success result.
const RESERVED_MESSAGE: &str = "Ticket validated and reserved";

/// Errors that end processing of a single order with a `failed` result.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// The entity store failed while validating the order.
    #[error("storage failure: {0}")]
    Store(#[from] StoreError),

    /// The pending queue is closed; the reservation cannot be accepted.
    #[error("pending queue closed")]
    QueueClosed,
}

/// The per-message reservation algorithm.
///
/// For each decoded order: snapshot the zone and concert (cache first,
/// store on miss), run the admission check, hand the accepted record to the
/// batch persister, reflect the seat in the cached zone, and report the
/// verdict. Cache trouble is logged and degraded around, never fatal to an
/// order; store trouble fails the order.
pub struct OrderProcessor {
    store: Arc<dyn EntityStore>,
    cache: Arc<dyn TtlCache>,
    admission: Arc<AdmissionLedger>,
    batch_tx: mpsc::Sender<ReservedTicket>,
    cache_ttl: Duration,
}

impl OrderProcessor {
    /// Create a processor over the given seams.
    #[must_use]
    pub fn new(
        store: Arc<dyn EntityStore>,
        cache: Arc<dyn TtlCache>,
        admission: Arc<AdmissionLedger>,
        batch_tx: mpsc::Sender<ReservedTicket>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            admission,
            batch_tx,
            cache_ttl,
        }
    }

    /// Judge one order and produce its result event.
    ///
    /// `offset` is the broker offset of the order's record on its partition.
    pub async fn handle_order(&self, order: &TicketOrderEvent, offset: i64) -> TicketResultEvent {
        match self.try_reserve(order, offset).await {
            Ok(result) => result,
            Err(e) => {
                error!(
                    ticket_id = %order.ticket_id,
                    zone_id = %order.zone_id,
                    error = %e,
                    "Order processing failed"
                );
                TicketResultEvent::failed(order, e.to_string())
            }
        }
    }

    async fn try_reserve(
        &self,
        order: &TicketOrderEvent,
        offset: i64,
    ) -> Result<TicketResultEvent, WorkerError> {
        let Some(zone) = self.zone_snapshot(&order.zone_id).await? else {
            return Ok(TicketResultEvent::failed(
                order,
                format!("Zone {} not found", order.zone_id),
            ));
        };

        if zone.concert_id != order.concert_id {
            return Ok(TicketResultEvent::failed(
                order,
                format!(
                    "Zone {} does not belong to concert {}",
                    order.zone_id, order.concert_id
                ),
            ));
        }

        let Some(concert) = self.concert_snapshot(&zone.concert_id).await? else {
            return Ok(TicketResultEvent::failed(
                order,
                format!("Concert {} not found", zone.concert_id),
            ));
        };

        if !self
            .admission
            .admit(&order.zone_id, offset, zone.zone_capacity)
        {
            return Ok(TicketResultEvent::failed(order, SOLD_OUT_ERROR));
        }

        let detail = encore_core::dto::TicketDetail::from_snapshot(
            order.ticket_id,
            &zone,
            &concert.concert,
            chrono::Utc::now(),
        );

        self.batch_tx
            .send(ReservedTicket {
                ticket_id: order.ticket_id,
                zone_id: order.zone_id.clone(),
            })
            .await
            .map_err(|_| WorkerError::QueueClosed)?;

        self.reflect_seat_taken(zone).await;

        info!(
            ticket_id = %order.ticket_id,
            zone_id = %order.zone_id,
            offset = offset,
            "Order accepted"
        );

        Ok(TicketResultEvent::success(detail, RESERVED_MESSAGE))
    }

    /// Zone snapshot: cache first, store on miss (warming the cache).
    async fn zone_snapshot(&self, zone_id: &ZoneId) -> Result<Option<Zone>, StoreError> {
        match cache::read_value(self.cache.as_ref(), zone_id.as_str()).await {
            Ok(Some(CachedValue::Zone(zone))) => return Ok(Some(zone)),
            Ok(_) => {}
            Err(e) => warn!(zone_id = %zone_id, error = %e, "Zone cache read failed"),
        }

        let Some(zone) = self.store.zone(zone_id).await? else {
            return Ok(None);
        };

        self.write_cache(zone_id.as_str(), CachedValue::Zone(zone.clone()))
            .await;
        Ok(Some(zone))
    }

    /// Concert snapshot: cache first, store on miss (warming the cache).
    async fn concert_snapshot(
        &self,
        concert_id: &ConcertId,
    ) -> Result<Option<ConcertDetail>, StoreError> {
        match cache::read_value(self.cache.as_ref(), concert_id.as_str()).await {
            Ok(Some(CachedValue::Concert(concert))) => return Ok(Some(concert)),
            Ok(_) => {}
            Err(e) => warn!(concert_id = %concert_id, error = %e, "Concert cache read failed"),
        }

        let Some(concert) = self.store.concert(concert_id).await? else {
            return Ok(None);
        };

        self.write_cache(concert_id.as_str(), CachedValue::Concert(concert.clone()))
            .await;
        Ok(Some(concert))
    }

    /// Refresh the cached zone after a seat was taken. The authoritative
    /// decrement happens at batch commit; the cache is refreshed here so
    /// the next order sees the seat gone.
    async fn reflect_seat_taken(&self, mut zone: Zone) {
        zone.available_seats = (zone.available_seats - 1).max(0);
        zone.updated_at = chrono::Utc::now();
        let key = zone.id.as_str().to_string();
        self.write_cache(&key, CachedValue::Zone(zone)).await;
    }

    async fn write_cache(&self, key: &str, value: CachedValue) {
        if let Err(e) = cache::write_value(self.cache.as_ref(), key, &value, self.cache_ttl).await {
            warn!(key = %key, error = %e, "Cache write failed");
        }
    }
}

/// Consumer context that resets admission state when partition ownership
/// changes: a counter carried across a rebalance could miss acceptances
/// made by the interim owner of the partition.
pub struct WorkerContext {
    admission: Arc<AdmissionLedger>,
}

impl WorkerContext {
    /// Create a context resetting the given ledger on rebalance.
    #[must_use]
    pub const fn new(admission: Arc<AdmissionLedger>) -> Self {
        Self { admission }
    }
}

impl ClientContext for WorkerContext {}

impl ConsumerContext for WorkerContext {
    fn pre_rebalance(&self, rebalance: &Rebalance<'_>) {
        match rebalance {
            Rebalance::Assign(partitions) => {
                info!(partitions = partitions.count(), "Partitions assigned");
            }
            Rebalance::Revoke(partitions) => {
                info!(partitions = partitions.count(), "Partitions revoked");
            }
            Rebalance::Error(e) => {
                warn!(error = %e, "Rebalance error");
            }
        }
        self.admission.reset();
    }
}

/// The worker's consume loop: decode, process, publish the verdict, commit.
pub struct ReservationWorker {
    consumer: StreamConsumer<WorkerContext>,
    producer: Arc<TicketProducer>,
    processor: OrderProcessor,
    shutdown: broadcast::Receiver<()>,
}

impl ReservationWorker {
    /// Wire up a worker from its parts.
    ///
    /// # Errors
    ///
    /// Returns [`encore_kafka::BusError`] if the consumer cannot be created
    /// or subscribed.
    pub fn new(
        brokers: &str,
        group_id: &str,
        producer: Arc<TicketProducer>,
        processor: OrderProcessor,
        admission: Arc<AdmissionLedger>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<Self, encore_kafka::BusError> {
        let consumer =
            encore_kafka::order_consumer(brokers, group_id, WorkerContext::new(admission))?;

        Ok(Self {
            consumer,
            producer,
            processor,
            shutdown,
        })
    }

    /// Spawn the consume loop as a background task.
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run until the shutdown signal fires.
    pub async fn run(mut self) {
        info!("Reservation worker started");

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    info!("Reservation worker received shutdown signal");
                    break;
                }
                received = self.consumer.recv() => {
                    match received {
                        Ok(message) => self.handle_message(&message).await,
                        Err(e) => {
                            error!(error = %e, "Error receiving order; retrying");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    }
                }
            }
        }

        info!("Reservation worker stopped");
    }

    async fn handle_message(&self, message: &BorrowedMessage<'_>) {
        let Some(payload) = message.payload() else {
            warn!(
                topic = message.topic(),
                offset = message.offset(),
                "Order record has no payload"
            );
            self.commit(message);
            return;
        };

        let order: TicketOrderEvent = match serde_json::from_slice(payload) {
            Ok(order) => order,
            Err(e) => {
                warn!(
                    topic = message.topic(),
                    offset = message.offset(),
                    error = %e,
                    "Undecodable order record"
                );
                self.commit(message);
                return;
            }
        };

        let result = self
            .processor
            .handle_order(&order, message.offset())
            .await;

        // The result rides the same partition number the order arrived on,
        // which is the zone's partition on the event topic.
        if let Err(e) = self
            .producer
            .produce_result(&result, message.partition())
            .await
        {
            // The accepted record stays in the batch buffer regardless; a
            // lost result event only costs the client a timeout, the seat
            // accounting is unaffected.
            error!(
                ticket_id = %order.ticket_id,
                error = %e,
                "Failed to publish result"
            );
        }

        // Commit point: the accepted record is in the batch buffer (or the
        // order was rejected). Earlier offsets were handled the same way.
        self.commit(message);
    }

    fn commit(&self, message: &BorrowedMessage<'_>) {
        if let Err(e) = self.consumer.commit_message(message, CommitMode::Async) {
            warn!(
                topic = message.topic(),
                partition = message.partition(),
                offset = message.offset(),
                error = %e,
                "Failed to commit offset (record may be redelivered)"
            );
        }
    }
}

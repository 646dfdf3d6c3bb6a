//! The producing side of the order pipeline.
//!
//! One [`TicketProducer`] serves both directions: the API publishes
//! [`TicketOrderEvent`]s to the concert's order topic, and the worker
//! publishes [`TicketResultEvent`]s to the concert's event topic. In both
//! cases the record key is the zone id and the partition is computed
//! explicitly from the zone's `zone_number` - key hashing is never relied
//! on for placement.

use crate::error::BusError;
use crate::topics::{event_topic, order_topic};
use encore_core::events::{TicketOrderEvent, TicketResultEvent};
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use serde::Serialize;
use std::time::Duration;

/// JSON producer for order and result records.
///
/// Configured for durability over latency: `acks=all`, bounded broker-side
/// retries with backoff, and a blocking send-and-wait bounded by the
/// configured timeout. A successful return means the broker acknowledged
/// the record.
pub struct TicketProducer {
    producer: FutureProducer,
    timeout: Duration,
}

impl TicketProducer {
    /// Create a producer against the given brokers.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::ConnectionFailed`] if the producer cannot be
    /// created.
    pub fn new(brokers: &str, timeout: Duration) -> Result<Self, BusError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("acks", "all")
            .set("retries", "3")
            .set("retry.backoff.ms", "100")
            .set("message.timeout.ms", timeout.as_millis().to_string())
            .create()
            .map_err(|e| BusError::ConnectionFailed(format!("Failed to create producer: {e}")))?;

        tracing::info!(brokers = %brokers, timeout_ms = timeout.as_millis(), "Ticket producer created");

        Ok(Self { producer, timeout })
    }

    /// Publish an order to the concert's order topic on the zone's partition.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::PublishFailed`] if the broker does not
    /// acknowledge within the timeout, [`BusError::Encode`] if the record
    /// cannot be serialized.
    pub async fn produce_order(
        &self,
        order: &TicketOrderEvent,
        partition: i32,
    ) -> Result<(), BusError> {
        let topic = order_topic(&order.concert_id);
        self.send_json(&topic, order.zone_id.as_str(), partition, order)
            .await
    }

    /// Publish a result to the concert's event topic on the zone's partition.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::PublishFailed`] if the broker does not
    /// acknowledge within the timeout, [`BusError::Encode`] if the record
    /// cannot be serialized.
    pub async fn produce_result(
        &self,
        result: &TicketResultEvent,
        partition: i32,
    ) -> Result<(), BusError> {
        let topic = event_topic(&result.concert_id);
        self.send_json(&topic, result.zone_id.as_str(), partition, result)
            .await
    }

    async fn send_json<T: Serialize>(
        &self,
        topic: &str,
        key: &str,
        partition: i32,
        value: &T,
    ) -> Result<(), BusError> {
        let payload = serde_json::to_vec(value).map_err(|e| BusError::Encode(e.to_string()))?;

        let record = FutureRecord::to(topic)
            .payload(&payload)
            .key(key)
            .partition(partition);

        match self.producer.send(record, Timeout::After(self.timeout)).await {
            Ok((partition, offset)) => {
                tracing::debug!(
                    topic = %topic,
                    partition = partition,
                    offset = offset,
                    key = %key,
                    "Record published"
                );
                Ok(())
            }
            Err((kafka_error, _)) => {
                tracing::error!(
                    topic = %topic,
                    partition = partition,
                    error = %kafka_error,
                    "Failed to publish record"
                );
                Err(BusError::PublishFailed {
                    topic: topic.to_string(),
                    reason: kafka_error.to_string(),
                })
            }
        }
    }
}

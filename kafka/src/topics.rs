//! Per-concert topic layout and provisioning.
//!
//! Topic names derive from the concert id; the partition count of both
//! topics equals the concert's `num_zones` and is fixed once provisioned.

use crate::error::BusError;
use encore_core::types::ConcertId;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::types::RDKafkaErrorCode;
use std::collections::HashSet;
use std::sync::Mutex;

/// Prefix of every order topic.
pub const ORDER_TOPIC_PREFIX: &str = "ticket-orders-";

/// Prefix of every result topic.
pub const EVENT_TOPIC_PREFIX: &str = "ticket-events-";

/// Regex subscription pattern matching every concert's order topic.
pub const ORDER_TOPIC_PATTERN: &str = "^ticket-orders-.*";

/// Regex subscription pattern matching every concert's result topic.
pub const EVENT_TOPIC_PATTERN: &str = "^ticket-events-.*";

/// Name of the order topic for a concert.
#[must_use]
pub fn order_topic(concert_id: &ConcertId) -> String {
    format!("{ORDER_TOPIC_PREFIX}{concert_id}")
}

/// Name of the result topic for a concert.
#[must_use]
pub fn event_topic(concert_id: &ConcertId) -> String {
    format!("{EVENT_TOPIC_PREFIX}{concert_id}")
}

/// Partition assignment for a zone.
///
/// Explicit, never left to key hashing: the single-writer-per-zone guarantee
/// depends on every producer computing the same partition for a zone.
#[must_use]
pub const fn partition_for(zone_number: i32) -> i32 {
    zone_number - 1
}

/// Provisions and tracks per-concert topic pairs.
///
/// Provisioning is idempotent: an already-existing topic is success. Each
/// manager remembers the concerts it has confirmed this process, so the
/// admin round-trip happens once per concert per process; reconciliation is
/// lazy, on the first order an API process sees for a concert.
pub struct TopicManager {
    admin: AdminClient<DefaultClientContext>,
    replication: i32,
    provisioned: Mutex<HashSet<ConcertId>>,
}

impl TopicManager {
    /// Create a topic manager against the given brokers.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::ConnectionFailed`] if the admin client cannot be
    /// created.
    pub fn new(brokers: &str, replication: i32) -> Result<Self, BusError> {
        let admin: AdminClient<DefaultClientContext> = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .create()
            .map_err(|e| {
                BusError::ConnectionFailed(format!("Failed to create admin client: {e}"))
            })?;

        Ok(Self {
            admin,
            replication,
            provisioned: Mutex::new(HashSet::new()),
        })
    }

    /// Create the concert's order and event topics, each with `num_zones`
    /// partitions.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::ProvisionFailed`] for any failure other than the
    /// topic already existing.
    pub async fn provision(&self, concert_id: &ConcertId, num_zones: i32) -> Result<(), BusError> {
        let order = order_topic(concert_id);
        let event = event_topic(concert_id);
        let topics = [
            NewTopic::new(&order, num_zones, TopicReplication::Fixed(self.replication)),
            NewTopic::new(&event, num_zones, TopicReplication::Fixed(self.replication)),
        ];

        let results = self
            .admin
            .create_topics(&topics, &AdminOptions::new())
            .await
            .map_err(|e| BusError::ProvisionFailed {
                topic: order.clone(),
                reason: e.to_string(),
            })?;

        for result in results {
            match result {
                Ok(topic) => {
                    tracing::info!(topic = %topic, partitions = num_zones, "Topic created");
                }
                Err((topic, RDKafkaErrorCode::TopicAlreadyExists)) => {
                    tracing::debug!(topic = %topic, "Topic already exists");
                }
                Err((topic, code)) => {
                    tracing::error!(topic = %topic, error = %code, "Failed to create topic");
                    return Err(BusError::ProvisionFailed {
                        topic,
                        reason: code.to_string(),
                    });
                }
            }
        }

        self.mark_provisioned(concert_id);
        Ok(())
    }

    /// Provision the concert's topics unless this process already has.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::ProvisionFailed`] if provisioning is attempted
    /// and fails.
    pub async fn ensure_provisioned(
        &self,
        concert_id: &ConcertId,
        num_zones: i32,
    ) -> Result<(), BusError> {
        if self.is_provisioned(concert_id) {
            return Ok(());
        }
        self.provision(concert_id, num_zones).await
    }

    /// Whether this process has already confirmed the concert's topics.
    #[must_use]
    pub fn is_provisioned(&self, concert_id: &ConcertId) -> bool {
        self.provisioned
            .lock()
            .map(|set| set.contains(concert_id))
            .unwrap_or(false)
    }

    fn mark_provisioned(&self, concert_id: &ConcertId) {
        if let Ok(mut set) = self.provisioned.lock() {
            set.insert(concert_id.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_names_embed_the_concert_id() {
        let concert = ConcertId::new("con_1a2b3c4d");
        assert_eq!(order_topic(&concert), "ticket-orders-con_1a2b3c4d");
        assert_eq!(event_topic(&concert), "ticket-events-con_1a2b3c4d");
    }

    #[test]
    fn zone_numbers_map_to_zero_based_partitions() {
        assert_eq!(partition_for(1), 0);
        assert_eq!(partition_for(4), 3);
    }

    #[test]
    fn patterns_match_generated_names() {
        let concert = ConcertId::new("con_x");
        assert!(order_topic(&concert).starts_with(ORDER_TOPIC_PREFIX));
        assert!(event_topic(&concert).starts_with(EVENT_TOPIC_PREFIX));
    }
}

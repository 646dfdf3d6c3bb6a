//! Consumer construction for the two sides of the pipeline.
//!
//! Two consumer profiles exist and they are deliberately different:
//!
//! - **Order consumers** (reservation workers) share a consumer group so the
//!   broker assigns each partition - and therefore each zone - to exactly
//!   one live worker. Offsets are committed manually by the worker, after
//!   the accepted record is safely in its batch buffer.
//! - **Result consumers** (API processes) each use a throwaway group id so
//!   every process receives every result; offsets are auto-committed and
//!   never matter, because results are correlated in memory and replayed
//!   from the cache.
//!
//! Both subscribe by regex so topics provisioned for new concerts are picked
//! up on the next metadata refresh without a restart.

use crate::error::BusError;
use crate::topics::{EVENT_TOPIC_PATTERN, ORDER_TOPIC_PATTERN};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, ConsumerContext, StreamConsumer};
use uuid::Uuid;

/// Interval at which regex subscriptions learn about new concert topics.
const METADATA_REFRESH_MS: &str = "30000";

/// Create a worker consumer subscribed to every order topic.
///
/// The group id is shared by all worker replicas; partition ownership within
/// the group is what serializes per-zone processing. The supplied context
/// receives rebalance callbacks so the worker can reset per-zone admission
/// state when ownership moves.
///
/// # Errors
///
/// Returns [`BusError::ConnectionFailed`] if the consumer cannot be created
/// and [`BusError::SubscriptionFailed`] if the subscription is rejected.
pub fn order_consumer<C>(
    brokers: &str,
    group_id: &str,
    context: C,
) -> Result<StreamConsumer<C>, BusError>
where
    C: ConsumerContext + 'static,
{
    let consumer: StreamConsumer<C> = ClientConfig::new()
        .set("bootstrap.servers", brokers)
        .set("group.id", group_id)
        .set("enable.auto.commit", "false")
        .set("auto.offset.reset", "earliest")
        .set("session.timeout.ms", "6000")
        .set("enable.partition.eof", "false")
        .set("topic.metadata.refresh.interval.ms", METADATA_REFRESH_MS)
        .create_with_context(context)
        .map_err(|e| BusError::ConnectionFailed(format!("Failed to create consumer: {e}")))?;

    consumer
        .subscribe(&[ORDER_TOPIC_PATTERN])
        .map_err(|e| BusError::SubscriptionFailed {
            pattern: ORDER_TOPIC_PATTERN.to_string(),
            reason: e.to_string(),
        })?;

    tracing::info!(
        group = %group_id,
        pattern = ORDER_TOPIC_PATTERN,
        manual_commit = true,
        "Order consumer subscribed"
    );

    Ok(consumer)
}

/// Create an API-side consumer subscribed to every result topic.
///
/// Each call mints a unique group id: result fan-out must reach every API
/// process, not be load-balanced across them.
///
/// # Errors
///
/// Returns [`BusError::ConnectionFailed`] if the consumer cannot be created
/// and [`BusError::SubscriptionFailed`] if the subscription is rejected.
pub fn result_consumer(brokers: &str) -> Result<StreamConsumer, BusError> {
    let group_id = format!("ticket-results-{}", Uuid::new_v4());

    let consumer: StreamConsumer = ClientConfig::new()
        .set("bootstrap.servers", brokers)
        .set("group.id", &group_id)
        .set("enable.auto.commit", "true")
        .set("auto.offset.reset", "latest")
        .set("session.timeout.ms", "6000")
        .set("enable.partition.eof", "false")
        .set("topic.metadata.refresh.interval.ms", METADATA_REFRESH_MS)
        .create()
        .map_err(|e| BusError::ConnectionFailed(format!("Failed to create consumer: {e}")))?;

    consumer
        .subscribe(&[EVENT_TOPIC_PATTERN])
        .map_err(|e| BusError::SubscriptionFailed {
            pattern: EVENT_TOPIC_PATTERN.to_string(),
            reason: e.to_string(),
        })?;

    tracing::info!(
        group = %group_id,
        pattern = EVENT_TOPIC_PATTERN,
        "Result consumer subscribed"
    );

    Ok(consumer)
}

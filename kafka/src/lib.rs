//! Kafka plumbing for the Encore ticket-ordering core.
//!
//! Every concert owns a pair of topics, each with one partition per zone:
//!
//! ```text
//!              ticket-orders-<concert>                ticket-events-<concert>
//!             ┌────────────────────────┐             ┌────────────────────────┐
//!  API ──────▶│ p0  p1  p2 … (per zone)│──▶ worker ──▶│ p0  p1  p2 … (per zone)│──▶ every API
//!             └────────────────────────┘             └────────────────────────┘
//! ```
//!
//! A zone's traffic is pinned to partition `zone_number - 1`. Because a
//! partition has at most one live consumer within a consumer group, all seat
//! decisions for a zone are serialized by the broker itself - no application
//! lock is held anywhere on the order path.
//!
//! This crate owns the topic layout ([`topics`]), the producing side
//! ([`producer`]) and consumer construction ([`consumer`]). Payloads are
//! JSON with the wire field names defined in `encore-core`.
//!
//! # Delivery semantics
//!
//! - Orders are produced with `acks=all` and a blocking send-and-wait, so a
//!   `true` from the producer means the broker has the record.
//! - The worker group commits offsets manually, after an accepted order is
//!   safely in the batch buffer. Redelivery after a crash is absorbed by
//!   ticket-id dedup in storage.
//! - Result consumers use a throwaway group per process: every API replica
//!   sees every result.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod consumer;
pub mod error;
pub mod producer;
pub mod topics;

pub use consumer::{order_consumer, result_consumer};
pub use error::BusError;
pub use producer::TicketProducer;
pub use topics::{event_topic, order_topic, partition_for, TopicManager};

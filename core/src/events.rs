//! In-flight bus events.
//!
//! Two record kinds cross the bus, both serialized as JSON objects:
//!
//! - [`TicketOrderEvent`] - produced at the API boundary onto the concert's
//!   order topic, consumed by exactly one reservation worker.
//! - [`TicketResultEvent`] - produced by the worker onto the concert's event
//!   topic, consumed by every API process's result consumer.
//!
//! Field names are the wire contract and must not drift; a worker and an
//! API server deployed at different versions still have to agree.

use crate::dto::TicketDetail;
use crate::types::{ConcertId, TicketId, ZoneId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable error phrase for an exhausted zone.
///
/// Clients and the HTTP mapping key off this substring, so it must not be
/// reworded.
pub const SOLD_OUT_ERROR: &str = "No available seats in this zone";

/// Lifecycle status carried by an order record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Submitted, not yet processed by a worker
    Pending,
}

/// Outcome status carried by a result record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    /// Seat reserved; `ticket_data` is populated
    Success,
    /// Order rejected; `error` explains why
    Failed,
}

/// An order submitted by a buyer, in flight from the API to a worker.
///
/// Never persisted: it exists only on the order topic, keyed by zone id and
/// pinned to the zone's partition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TicketOrderEvent {
    /// Ticket id minted for this order
    pub ticket_id: TicketId,
    /// Requested zone
    pub zone_id: ZoneId,
    /// Concert the zone is expected to belong to
    pub concert_id: ConcertId,
    /// Submission time
    pub timestamp: DateTime<Utc>,
    /// Always `pending` at submission
    pub status: OrderStatus,
}

impl TicketOrderEvent {
    /// Create a fresh order record stamped with the current time.
    #[must_use]
    pub fn new(ticket_id: TicketId, zone_id: ZoneId, concert_id: ConcertId) -> Self {
        Self {
            ticket_id,
            zone_id,
            concert_id,
            timestamp: Utc::now(),
            status: OrderStatus::Pending,
        }
    }
}

/// The worker's verdict on an order, in flight from a worker to every API
/// process.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TicketResultEvent {
    /// Ticket id of the order this result answers
    pub ticket_id: TicketId,
    /// Zone the order targeted
    pub zone_id: ZoneId,
    /// Concert the zone belongs to
    pub concert_id: ConcertId,
    /// Success or failure
    pub status: ResultStatus,
    /// Human-readable note on success
    pub message: Option<String>,
    /// Failure reason; stable substrings drive the HTTP mapping
    pub error: Option<String>,
    /// The reserved ticket, present on success
    pub ticket_data: Option<TicketDetail>,
    /// Time the verdict was produced
    pub timestamp: DateTime<Utc>,
}

impl TicketResultEvent {
    /// Build a success result carrying the reserved ticket.
    #[must_use]
    pub fn success(ticket_data: TicketDetail, message: impl Into<String>) -> Self {
        Self {
            ticket_id: ticket_data.id,
            zone_id: ticket_data.zone_id.clone(),
            concert_id: ticket_data.concert_id.clone(),
            status: ResultStatus::Success,
            message: Some(message.into()),
            error: None,
            ticket_data: Some(ticket_data),
            timestamp: Utc::now(),
        }
    }

    /// Build a failure result for the given order.
    #[must_use]
    pub fn failed(order: &TicketOrderEvent, error: impl Into<String>) -> Self {
        Self {
            ticket_id: order.ticket_id,
            zone_id: order.zone_id.clone(),
            concert_id: order.concert_id.clone(),
            status: ResultStatus::Failed,
            message: None,
            error: Some(error.into()),
            ticket_data: None,
            timestamp: Utc::now(),
        }
    }

    /// Whether this result confirms a reservation.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.status, ResultStatus::Success)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn order_event_wire_fields() {
        let order = TicketOrderEvent::new(
            TicketId::new(),
            ZoneId::new("zon_c1_1"),
            ConcertId::new("con_abc"),
        );
        let value = serde_json::to_value(&order).unwrap();
        let object = value.as_object().unwrap();

        for field in ["ticket_id", "zone_id", "concert_id", "timestamp", "status"] {
            assert!(object.contains_key(field), "missing wire field {field}");
        }
        assert_eq!(object["status"], "pending");
        assert_eq!(object["zone_id"], "zon_c1_1");
    }

    #[test]
    fn failed_result_carries_error_and_null_payload() {
        let order = TicketOrderEvent::new(
            TicketId::new(),
            ZoneId::new("zon_c1_1"),
            ConcertId::new("con_abc"),
        );
        let result = TicketResultEvent::failed(&order, "No available seats in this zone");

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["error"], "No available seats in this zone");
        assert!(value["ticket_data"].is_null());
        assert_eq!(value["ticket_id"], order.ticket_id.to_string());
    }
}

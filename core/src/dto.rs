//! Reply DTOs returned to buyers.

use crate::entities::{Concert, Zone};
use crate::types::{ConcertId, TicketId, ZoneId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The denormalized ticket view a buyer receives once a reservation is
/// confirmed, and the payload cached for result replay.
///
/// Concert and zone fields are snapshotted at reservation time; there is no
/// object graph to traverse afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TicketDetail {
    /// Ticket identifier
    pub id: TicketId,
    /// Zone the seat belongs to
    pub zone_id: ZoneId,
    /// Concert the zone belongs to
    pub concert_id: ConcertId,
    /// Reservation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
    /// Concert name at reservation time
    pub concert_name: String,
    /// Concert description at reservation time
    pub concert_description: Option<String>,
    /// Price paid for the seat
    pub price: f64,
    /// Zone name at reservation time
    pub zone_name: String,
    /// Zone description at reservation time
    pub zone_description: Option<String>,
}

impl TicketDetail {
    /// Build the detail payload from a zone and concert snapshot.
    #[must_use]
    pub fn from_snapshot(
        ticket_id: TicketId,
        zone: &Zone,
        concert: &Concert,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ticket_id,
            zone_id: zone.id.clone(),
            concert_id: zone.concert_id.clone(),
            created_at: now,
            updated_at: now,
            concert_name: concert.name.clone(),
            concert_description: concert.description.clone(),
            price: zone.price,
            zone_name: zone.name.clone(),
            zone_description: zone.description.clone(),
        }
    }
}

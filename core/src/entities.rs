//! Persisted entities: venues, concerts, zones and tickets.
//!
//! The object graph is strictly parent→child: a venue hosts concerts, a
//! concert owns its zones, a zone owns its tickets. Children carry an
//! explicit foreign key back to their parent; there are no cyclic in-memory
//! references, and detail views denormalize at read time instead of
//! traversing a graph.

use crate::types::{ConcertId, TicketId, VenueId, ZoneId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A venue that hosts concerts. Mutated only through admin paths.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    /// Venue identifier
    pub id: VenueId,
    /// Display name
    pub name: String,
    /// Physical location
    pub location: String,
    /// Total venue capacity across all configurations
    pub capacity: i32,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// A concert held at a venue.
///
/// `num_zones` is immutable once the concert's topic pair has been
/// provisioned: it fixes the partition count of both topics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Concert {
    /// Concert identifier
    pub id: ConcertId,
    /// Hosting venue
    pub venue_id: VenueId,
    /// Display name
    pub name: String,
    /// Doors-open time
    pub start_time: DateTime<Utc>,
    /// End time
    pub end_time: DateTime<Utc>,
    /// Number of zones, and therefore partitions per topic
    pub num_zones: i32,
    /// Free-form description
    pub description: Option<String>,
    /// Location hint shown to buyers
    pub location: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// A concert together with its zones, eagerly attached.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConcertDetail {
    /// The concert row
    #[serde(flatten)]
    pub concert: Concert,
    /// All zones of the concert, ordered by `zone_number`
    pub zones: Vec<Zone>,
}

/// A seating zone within a concert.
///
/// Invariants: `0 <= available_seats <= zone_capacity`, and `zone_number`
/// is unique within the concert and lies in `1..=concert.num_zones`.
/// `zone_number` determines the partition all of this zone's traffic lands
/// on, which is what serializes seat decisions per zone.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    /// Zone identifier
    pub id: ZoneId,
    /// Owning concert
    pub concert_id: ConcertId,
    /// Display name (e.g. "VIP", "General")
    pub name: String,
    /// Ticket price for this zone
    pub price: f64,
    /// Total seats in the zone
    pub zone_capacity: i32,
    /// Seats still available
    pub available_seats: i32,
    /// One-based position of the zone within its concert
    pub zone_number: i32,
    /// Free-form description
    pub description: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Zone {
    /// Whether at least one seat remains according to this snapshot.
    #[must_use]
    pub const fn has_available_seats(&self) -> bool {
        self.available_seats > 0
    }
}

/// A sold ticket. Created only by the batch persister; each row implies
/// exactly one seat consumed from its zone.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    /// Ticket identifier (minted at the API boundary)
    pub id: TicketId,
    /// Zone the seat belongs to
    pub zone_id: ZoneId,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

//! Fixture builders shared by worker and API tests.

use chrono::{Duration, Utc};
use encore_core::entities::{Concert, Venue, Zone};
use encore_core::types::{ConcertId, VenueId, ZoneId};

/// A venue with the given id.
#[must_use]
pub fn venue(id: &str) -> Venue {
    let now = Utc::now();
    Venue {
        id: VenueId::new(id),
        name: format!("{id} hall"),
        location: "Test City".to_string(),
        capacity: 10_000,
        created_at: now,
        updated_at: now,
    }
}

/// A concert with the given id, venue and zone count, starting tomorrow.
#[must_use]
pub fn concert(id: &str, venue_id: &str, num_zones: i32) -> Concert {
    let now = Utc::now();
    Concert {
        id: ConcertId::new(id),
        venue_id: VenueId::new(venue_id),
        name: format!("{id} live"),
        start_time: now + Duration::days(1),
        end_time: now + Duration::days(1) + Duration::hours(3),
        num_zones,
        description: Some("test concert".to_string()),
        location: Some("Main stage".to_string()),
        created_at: now,
        updated_at: now,
    }
}

/// A zone with full availability.
#[must_use]
pub fn zone(id: &str, concert_id: &str, zone_number: i32, capacity: i32, price: f64) -> Zone {
    let now = Utc::now();
    Zone {
        id: ZoneId::new(id),
        concert_id: ConcertId::new(concert_id),
        name: format!("Zone {zone_number}"),
        price,
        zone_capacity: capacity,
        available_seats: capacity,
        zone_number,
        description: None,
        created_at: now,
        updated_at: now,
    }
}

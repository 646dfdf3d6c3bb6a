//! In-memory [`EntityStore`] double.

use async_trait::async_trait;
use chrono::Utc;
use encore_core::dto::TicketDetail;
use encore_core::entities::{Concert, ConcertDetail, Ticket, Venue, Zone};
use encore_core::store::{EntityStore, ReservedTicket, StoreError};
use encore_core::types::{ConcertId, TicketId, VenueId, ZoneId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct StoreInner {
    venues: HashMap<VenueId, Venue>,
    concerts: HashMap<ConcertId, Concert>,
    zones: HashMap<ZoneId, Zone>,
    tickets: HashMap<TicketId, Ticket>,
}

/// Hash-map-backed entity store.
///
/// Seat accounting mirrors the production transaction: a redelivered ticket
/// id neither inserts a second row nor decrements the zone twice. The
/// `fail_next_persists` knob makes the next N `persist_reservations` calls
/// fail, for exercising the batch persister's retry loop.
#[derive(Default)]
pub struct InMemoryEntityStore {
    inner: Mutex<StoreInner>,
    persist_failures: AtomicUsize,
}

impl InMemoryEntityStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a venue.
    pub fn insert_venue(&self, venue: Venue) {
        self.lock().venues.insert(venue.id.clone(), venue);
    }

    /// Seed a concert.
    pub fn insert_concert(&self, concert: Concert) {
        self.lock().concerts.insert(concert.id.clone(), concert);
    }

    /// Seed a zone.
    pub fn insert_zone(&self, zone: Zone) {
        self.lock().zones.insert(zone.id.clone(), zone);
    }

    /// Make the next `count` calls to `persist_reservations` fail.
    pub fn fail_next_persists(&self, count: usize) {
        self.persist_failures.store(count, Ordering::SeqCst);
    }

    /// Number of persisted ticket rows.
    #[must_use]
    pub fn ticket_count(&self) -> usize {
        self.lock().tickets.len()
    }

    /// Current `available_seats` of a zone, if it exists.
    #[must_use]
    pub fn available_seats(&self, zone_id: &ZoneId) -> Option<i32> {
        self.lock().zones.get(zone_id).map(|z| z.available_seats)
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn concert(&self, id: &ConcertId) -> Result<Option<ConcertDetail>, StoreError> {
        let inner = self.lock();
        let Some(concert) = inner.concerts.get(id).cloned() else {
            return Ok(None);
        };

        let mut zones: Vec<Zone> = inner
            .zones
            .values()
            .filter(|z| &z.concert_id == id)
            .cloned()
            .collect();
        zones.sort_by_key(|z| z.zone_number);

        Ok(Some(ConcertDetail { concert, zones }))
    }

    async fn zone(&self, id: &ZoneId) -> Result<Option<Zone>, StoreError> {
        Ok(self.lock().zones.get(id).cloned())
    }

    async fn ticket_detail(&self, id: &TicketId) -> Result<Option<TicketDetail>, StoreError> {
        let inner = self.lock();
        let Some(ticket) = inner.tickets.get(id) else {
            return Ok(None);
        };
        let zone = inner
            .zones
            .get(&ticket.zone_id)
            .ok_or_else(|| StoreError::Backend("dangling zone reference".to_string()))?;
        let concert = inner
            .concerts
            .get(&zone.concert_id)
            .ok_or_else(|| StoreError::Backend("dangling concert reference".to_string()))?;

        let mut detail = TicketDetail::from_snapshot(ticket.id, zone, concert, ticket.created_at);
        detail.updated_at = ticket.updated_at;
        Ok(Some(detail))
    }

    async fn tickets_by_concert(&self, id: &ConcertId) -> Result<Vec<Ticket>, StoreError> {
        let inner = self.lock();
        let zone_ids: Vec<ZoneId> = inner
            .zones
            .values()
            .filter(|z| &z.concert_id == id)
            .map(|z| z.id.clone())
            .collect();

        let mut tickets: Vec<Ticket> = inner
            .tickets
            .values()
            .filter(|t| zone_ids.contains(&t.zone_id))
            .cloned()
            .collect();
        tickets.sort_by_key(|t| t.created_at);
        Ok(tickets)
    }

    async fn tickets_by_zone(&self, id: &ZoneId) -> Result<Vec<Ticket>, StoreError> {
        let mut tickets: Vec<Ticket> = self
            .lock()
            .tickets
            .values()
            .filter(|t| &t.zone_id == id)
            .cloned()
            .collect();
        tickets.sort_by_key(|t| t.created_at);
        Ok(tickets)
    }

    async fn persist_reservations(&self, batch: &[ReservedTicket]) -> Result<u64, StoreError> {
        if batch.is_empty() {
            return Ok(0);
        }

        if self
            .persist_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::Backend(
                "injected persistence failure".to_string(),
            ));
        }

        let mut inner = self.lock();
        let now = Utc::now();
        let mut inserted = 0u64;

        for record in batch {
            if inner.tickets.contains_key(&record.ticket_id) {
                continue;
            }
            inner.tickets.insert(
                record.ticket_id,
                Ticket {
                    id: record.ticket_id,
                    zone_id: record.zone_id.clone(),
                    created_at: now,
                    updated_at: now,
                },
            );
            if let Some(zone) = inner.zones.get_mut(&record.zone_id) {
                zone.available_seats = (zone.available_seats - 1).max(0);
                zone.updated_at = now;
            }
            inserted += 1;
        }

        Ok(inserted)
    }
}

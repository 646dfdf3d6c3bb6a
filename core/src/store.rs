//! The entity store seam.
//!
//! The core is agnostic to the relational backend: the worker and the API
//! speak to storage only through [`EntityStore`]. Production binds this to
//! PostgreSQL; tests substitute an in-memory double.

use crate::dto::TicketDetail;
use crate::entities::{ConcertDetail, Ticket, Zone};
use crate::types::{ConcertId, TicketId, ZoneId};
use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by an entity store implementation.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// The backend rejected or failed the operation.
    #[error("storage failure: {0}")]
    Backend(String),
}

/// An accepted reservation queued for batch persistence.
///
/// The batch persister turns each of these into one `tickets` row and one
/// seat decremented from the zone, in a single transaction per batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReservedTicket {
    /// Ticket id minted at the API boundary
    pub ticket_id: TicketId,
    /// Zone the seat was taken from
    pub zone_id: ZoneId,
}

/// Read/write access to the persisted entities.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Fetch a concert with its zone list eagerly attached.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backend fails.
    async fn concert(&self, id: &ConcertId) -> Result<Option<ConcertDetail>, StoreError>;

    /// Fetch a zone by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backend fails.
    async fn zone(&self, id: &ZoneId) -> Result<Option<Zone>, StoreError>;

    /// Fetch the denormalized detail view for a persisted ticket.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backend fails.
    async fn ticket_detail(&self, id: &TicketId) -> Result<Option<TicketDetail>, StoreError>;

    /// List all tickets sold for a concert.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backend fails.
    async fn tickets_by_concert(&self, id: &ConcertId) -> Result<Vec<Ticket>, StoreError>;

    /// List all tickets sold for a zone.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backend fails.
    async fn tickets_by_zone(&self, id: &ZoneId) -> Result<Vec<Ticket>, StoreError>;

    /// Persist a batch of accepted reservations.
    ///
    /// Inserts one ticket row per record and decrements each zone's
    /// `available_seats` by the number of rows *actually* inserted for it,
    /// all inside one transaction. Re-submitting a ticket id is a no-op for
    /// both the row and the seat count, which is what makes redelivered
    /// messages safe.
    ///
    /// Returns the number of rows inserted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the transaction fails; the caller
    /// is expected to retry the whole batch.
    async fn persist_reservations(&self, batch: &[ReservedTicket]) -> Result<u64, StoreError>;
}

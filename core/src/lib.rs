//! Core domain model for the Encore ticket-ordering system.
//!
//! This crate holds everything the deployable processes share but that does
//! not touch a concrete backend:
//!
//! - **Identifiers and entities**: [`types`], [`entities`] - venues, concerts,
//!   zones and tickets as they exist in storage.
//! - **Wire events**: [`events`] - the order and result records exchanged over
//!   the message bus, serialized as JSON.
//! - **Reply DTO**: [`dto::TicketDetail`] - the denormalized payload a buyer
//!   receives when a reservation is confirmed.
//! - **Seams**: [`store::EntityStore`] and [`cache::TtlCache`] - the traits
//!   behind which PostgreSQL and Redis live in production, and in-memory
//!   doubles live in tests.
//! - **Configuration**: [`config::Config`] - environment-driven settings for
//!   both the API and worker processes.
//!
//! # Serialization guarantees
//!
//! The bus payloads and cached blobs in this crate are the contract between
//! independently deployed processes. Field names follow the wire format
//! exactly; cached blobs carry a `_cached_type` discriminator so a replayed
//! ticket can be told apart from a cached zone snapshot.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod dto;
pub mod entities;
pub mod events;
pub mod store;
pub mod types;

pub use cache::{CacheError, CachedValue, TtlCache};
pub use config::Config;
pub use dto::TicketDetail;
pub use entities::{Concert, ConcertDetail, Ticket, Venue, Zone};
pub use events::{OrderStatus, ResultStatus, TicketOrderEvent, TicketResultEvent};
pub use store::{EntityStore, ReservedTicket, StoreError};
pub use types::{ConcertId, TicketId, VenueId, ZoneId};

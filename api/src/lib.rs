//! The Encore API process: the synchronous face of an asynchronous pipeline.
//!
//! A `POST /tickets/` handler publishes the order onto the bus and then
//! *waits* - the client gets the final verdict (the reserved ticket, a
//! sold-out rejection, or a timeout) in one HTTP round trip even though the
//! decision is made by a worker on the other side of the broker.
//!
//! ```text
//!  client ──POST──▶ handler ──order──▶ bus ──▶ worker
//!                      │                          │
//!                      ▼                          ▼
//!               correlator slot ◀──result── event topics
//!                      │
//!  client ◀──200/400/408── handler
//! ```
//!
//! Three pieces make that work, all process-local:
//!
//! - [`correlator::PendingResults`] - ticket-id → waiter slot map.
//! - [`consumer::ResultConsumer`] - a background task subscribed to every
//!   concert's event topic; it completes waiters and caches results for
//!   replay.
//! - The handlers in [`tickets`] - validation, order production, the
//!   bounded wait, and replay reads.
//!
//! Cross-replica correlation needs no coordination: every API process
//! subscribes to every event topic, so whichever replica produced an order
//! also sees its result.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod consumer;
pub mod correlator;
pub mod error;
pub mod health;
pub mod routes;
pub mod state;
pub mod tickets;

pub use correlator::PendingResults;
pub use error::AppError;
pub use state::AppState;

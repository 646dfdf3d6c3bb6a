//! The reservation worker: the consuming half of the order pipeline.
//!
//! One worker replica runs one consumer-group member. The broker hands each
//! partition - and therefore each zone - to exactly one live replica, so
//! everything in this crate processes a given zone's orders strictly in
//! partition order, with no locks.
//!
//! # Per-message flow
//!
//! ```text
//! order topic ──▶ decode ──▶ zone/concert snapshot (cache → store)
//!                     │
//!                     ▼
//!              admission check (per-zone counter, seeded from offset)
//!                     │ accepted
//!                     ▼
//!              pending queue ──▶ batch persister ──▶ PostgreSQL (bulk)
//!                     │
//!                     ▼
//!              cached seat decrement ──▶ result topic (success/failed)
//! ```
//!
//! The batch persister runs as its own task so a slow database never stalls
//! message consumption; a failed commit keeps the slice and retries on the
//! next tick. Offsets are committed after the accepted record is in the
//! batch buffer.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod admission;
pub mod batch;
pub mod processor;

pub use admission::AdmissionLedger;
pub use batch::BatchPersister;
pub use processor::{OrderProcessor, ReservationWorker, WorkerError};

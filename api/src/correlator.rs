//! The pending-result correlator.
//!
//! Maps an in-flight ticket id to either a waiter (the handler arrived
//! first) or a deposited payload (the result arrived first). Both races are
//! legal and both deliver:
//!
//! ```text
//! handler first:  await_result installs Waiting ─▶ deposit sends ─▶ handler wakes
//! result first:   deposit installs Ready ─▶ await_result consumes immediately
//! ```
//!
//! The payload is single-consumer. A slot is always removed when its
//! awaiter exits, and `Ready` slots whose awaiter already gave up are swept
//! once the map grows past a threshold - a late result stays replayable
//! from the TTL cache, so sweeping loses nothing.

use encore_core::events::TicketResultEvent;
use encore_core::types::TicketId;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::debug;

/// Map size above which stale `Ready` slots are swept on deposit.
const SWEEP_THRESHOLD: usize = 1024;

/// Age after which an unconsumed `Ready` slot is considered abandoned.
const STALE_AFTER: Duration = Duration::from_secs(300);

enum Slot {
    /// A handler is waiting for the result.
    Waiting(oneshot::Sender<TicketResultEvent>),
    /// The result arrived before any waiter.
    Ready(Box<TicketResultEvent>, Instant),
}

/// Process-local ticket-id → waiter/payload map.
#[derive(Default)]
pub struct PendingResults {
    slots: Mutex<HashMap<TicketId, Slot>>,
}

impl PendingResults {
    /// Create an empty correlator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a result: wake the waiter if one is installed, otherwise
    /// park the payload for a waiter that has not arrived yet.
    pub fn deposit(&self, result: TicketResultEvent) {
        let mut slots = self.lock();

        if slots.len() >= SWEEP_THRESHOLD {
            Self::sweep_stale(&mut slots);
        }

        match slots.remove(&result.ticket_id) {
            Some(Slot::Waiting(tx)) => {
                if let Err(unclaimed) = tx.send(result) {
                    // The waiter timed out between our remove and its
                    // cleanup; park the payload so a raced GET can still
                    // consume it.
                    slots.insert(
                        unclaimed.ticket_id,
                        Slot::Ready(Box::new(unclaimed), Instant::now()),
                    );
                }
            }
            _ => {
                slots.insert(
                    result.ticket_id,
                    Slot::Ready(Box::new(result), Instant::now()),
                );
            }
        }
    }

    /// Wait for the result of `ticket_id`, bounded by `timeout`.
    ///
    /// Returns `None` on expiry, or immediately if another waiter already
    /// holds the slot (a client retry bug: the payload is single-consumer).
    pub async fn await_result(
        &self,
        ticket_id: TicketId,
        timeout: Duration,
    ) -> Option<TicketResultEvent> {
        let rx = {
            let mut slots = self.lock();
            match slots.remove(&ticket_id) {
                Some(Slot::Ready(result, _)) => return Some(*result),
                Some(Slot::Waiting(tx)) => {
                    slots.insert(ticket_id, Slot::Waiting(tx));
                    debug!(ticket_id = %ticket_id, "Second concurrent awaiter for ticket");
                    return None;
                }
                None => {
                    let (tx, rx) = oneshot::channel();
                    slots.insert(ticket_id, Slot::Waiting(tx));
                    rx
                }
            }
        };

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => Some(result),
            Ok(Err(_)) | Err(_) => {
                // Reclaim the slot. If the deposit raced the expiry, the
                // payload is sitting there Ready and still belongs to us.
                let mut slots = self.lock();
                match slots.remove(&ticket_id) {
                    Some(Slot::Ready(result, _)) => Some(*result),
                    _ => None,
                }
            }
        }
    }

    /// Number of live slots (waiters and parked payloads).
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no slots are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sweep_stale(slots: &mut HashMap<TicketId, Slot>) {
        let now = Instant::now();
        let before = slots.len();
        slots.retain(|_, slot| match slot {
            Slot::Waiting(_) => true,
            Slot::Ready(_, deposited_at) => now.duration_since(*deposited_at) < STALE_AFTER,
        });
        let swept = before - slots.len();
        if swept > 0 {
            debug!(swept = swept, remaining = slots.len(), "Swept stale result slots");
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TicketId, Slot>> {
        match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

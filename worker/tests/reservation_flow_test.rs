//! Reservation worker flow tests.
//!
//! Drives the per-message algorithm and the batch persister against the
//! in-memory store and cache, covering capacity bursts, validation
//! failures, redelivery and batch retry.
//!
//! Run with: `cargo test --test reservation_flow_test`

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use encore_core::cache::{self, CachedValue};
use encore_core::events::{ResultStatus, TicketOrderEvent, SOLD_OUT_ERROR};
use encore_core::store::{EntityStore, ReservedTicket};
use encore_core::types::{ConcertId, TicketId, ZoneId};
use encore_testing::{fixtures, InMemoryEntityStore, InMemoryTtlCache};
use encore_worker::{AdmissionLedger, BatchPersister, OrderProcessor};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

const CACHE_TTL: Duration = Duration::from_secs(3600);

struct Harness {
    store: Arc<InMemoryEntityStore>,
    cache: Arc<InMemoryTtlCache>,
    processor: OrderProcessor,
    batch_rx: mpsc::Receiver<ReservedTicket>,
}

/// One concert (`con_1`, two zones) with zone capacities 3 and 100.
fn harness() -> Harness {
    let store = Arc::new(InMemoryEntityStore::new());
    store.insert_venue(fixtures::venue("ven_1"));
    store.insert_concert(fixtures::concert("con_1", "ven_1", 2));
    store.insert_zone(fixtures::zone("zon_1", "con_1", 1, 3, 55.0));
    store.insert_zone(fixtures::zone("zon_2", "con_1", 2, 100, 30.0));

    let cache = Arc::new(InMemoryTtlCache::new());
    let (batch_tx, batch_rx) = mpsc::channel(1024);
    let processor = OrderProcessor::new(
        store.clone(),
        cache.clone(),
        Arc::new(AdmissionLedger::new()),
        batch_tx,
        CACHE_TTL,
    );

    Harness {
        store,
        cache,
        processor,
        batch_rx,
    }
}

fn order(zone: &str, concert: &str) -> TicketOrderEvent {
    TicketOrderEvent::new(TicketId::new(), ZoneId::new(zone), ConcertId::new(concert))
}

#[tokio::test]
async fn burst_beyond_capacity_admits_exactly_capacity_in_order() {
    let mut h = harness();

    // Capacity 3, burst of 5: first three succeed in submission order, the
    // remaining two fail with the capacity phrasing.
    let orders: Vec<_> = (0..5).map(|_| order("zon_1", "con_1")).collect();
    let mut results = Vec::new();
    for (offset, o) in orders.iter().enumerate() {
        results.push(h.processor.handle_order(o, offset as i64).await);
    }

    for (i, result) in results.iter().take(3).enumerate() {
        assert_eq!(result.status, ResultStatus::Success, "order {i}");
        assert_eq!(result.ticket_id, orders[i].ticket_id);
        let detail = result.ticket_data.as_ref().expect("success carries detail");
        assert_eq!(detail.price, 55.0);
        assert_eq!(detail.zone_id, ZoneId::new("zon_1"));
    }
    for result in results.iter().skip(3) {
        assert_eq!(result.status, ResultStatus::Failed);
        assert_eq!(result.error.as_deref(), Some(SOLD_OUT_ERROR));
        assert!(result.ticket_data.is_none());
    }

    // Exactly the accepted orders reached the pending queue, FIFO.
    for expected in orders.iter().take(3) {
        let queued = h.batch_rx.recv().await.expect("queued record");
        assert_eq!(queued.ticket_id, expected.ticket_id);
    }
    assert!(h.batch_rx.try_recv().is_err());
}

#[tokio::test]
async fn mismatched_concert_is_rejected() {
    let mut h = harness();
    h.store.insert_concert(fixtures::concert("con_2", "ven_1", 1));

    let result = h.processor.handle_order(&order("zon_1", "con_2"), 0).await;

    assert_eq!(result.status, ResultStatus::Failed);
    assert!(result.error.as_deref().unwrap().contains("does not belong"));
    assert!(h.batch_rx.try_recv().is_err());
}

#[tokio::test]
async fn unknown_zone_is_rejected() {
    let mut h = harness();

    let result = h.processor.handle_order(&order("zon_x", "con_1"), 0).await;

    assert_eq!(result.status, ResultStatus::Failed);
    assert!(result.error.as_deref().unwrap().contains("not found"));
    assert!(h.batch_rx.try_recv().is_err());
}

#[tokio::test]
async fn accepted_order_refreshes_the_cached_zone() {
    let mut h = harness();

    let result = h.processor.handle_order(&order("zon_1", "con_1"), 0).await;
    assert_eq!(result.status, ResultStatus::Success);
    let _ = h.batch_rx.recv().await;

    // The authoritative row is untouched until the batch lands, but the
    // cached snapshot already shows the seat gone.
    let cached = cache::read_value(h.cache.as_ref(), "zon_1")
        .await
        .unwrap()
        .expect("zone cached");
    match cached {
        CachedValue::Zone(zone) => assert_eq!(zone.available_seats, 2),
        other => panic!("unexpected cached value: {other:?}"),
    }
    assert_eq!(h.store.available_seats(&ZoneId::new("zon_1")), Some(3));
}

#[tokio::test]
async fn admission_survives_redelivery_without_over_admitting() {
    let h = harness();

    // Three deliveries at offsets 0..=2 fill the zone.
    for offset in 0..3 {
        let result = h
            .processor
            .handle_order(&order("zon_1", "con_1"), offset)
            .await;
        assert_eq!(result.status, ResultStatus::Success);
    }

    // A replacement worker re-observes the partition from offset 3 after a
    // crash: nothing further may be admitted.
    let (batch_tx, _batch_rx2) = mpsc::channel(16);
    let replacement = OrderProcessor::new(
        h.store.clone(),
        h.cache.clone(),
        Arc::new(AdmissionLedger::new()),
        batch_tx,
        CACHE_TTL,
    );
    let result = replacement.handle_order(&order("zon_1", "con_1"), 3).await;
    assert_eq!(result.status, ResultStatus::Failed);
    assert_eq!(result.error.as_deref(), Some(SOLD_OUT_ERROR));

    drop(h.batch_rx);
}

#[tokio::test]
async fn batch_persister_flushes_on_size() {
    let store = Arc::new(InMemoryEntityStore::new());
    store.insert_concert(fixtures::concert("con_1", "ven_1", 1));
    store.insert_zone(fixtures::zone("zon_1", "con_1", 1, 10, 20.0));

    let (batch_tx, batch_rx) = mpsc::channel(64);
    let (shutdown_tx, _) = broadcast::channel(1);
    let persister = BatchPersister::new(
        batch_rx,
        store.clone(),
        2,
        Duration::from_secs(3600), // never trigger by time
        shutdown_tx.subscribe(),
    );
    let handle = persister.spawn();

    for _ in 0..2 {
        batch_tx
            .send(ReservedTicket {
                ticket_id: TicketId::new(),
                zone_id: ZoneId::new("zon_1"),
            })
            .await
            .unwrap();
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(store.ticket_count(), 2);
    assert_eq!(store.available_seats(&ZoneId::new("zon_1")), Some(8));

    drop(batch_tx);
    let _ = shutdown_tx.send(());
    handle.await.unwrap();
}

#[tokio::test]
async fn batch_persister_flushes_on_timeout() {
    let store = Arc::new(InMemoryEntityStore::new());
    store.insert_concert(fixtures::concert("con_1", "ven_1", 1));
    store.insert_zone(fixtures::zone("zon_1", "con_1", 1, 10, 20.0));

    let (batch_tx, batch_rx) = mpsc::channel(64);
    let (shutdown_tx, _) = broadcast::channel(1);
    let persister = BatchPersister::new(
        batch_rx,
        store.clone(),
        100, // never trigger by size
        Duration::from_millis(50),
        shutdown_tx.subscribe(),
    );
    let handle = persister.spawn();

    batch_tx
        .send(ReservedTicket {
            ticket_id: TicketId::new(),
            zone_id: ZoneId::new("zon_1"),
        })
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(store.ticket_count(), 1);

    drop(batch_tx);
    let _ = shutdown_tx.send(());
    handle.await.unwrap();
}

#[tokio::test]
async fn failed_commit_is_retried_with_no_double_persist() {
    let store = Arc::new(InMemoryEntityStore::new());
    store.insert_concert(fixtures::concert("con_1", "ven_1", 1));
    store.insert_zone(fixtures::zone("zon_1", "con_1", 1, 10, 20.0));
    store.fail_next_persists(1);

    let (batch_tx, batch_rx) = mpsc::channel(64);
    let (shutdown_tx, _) = broadcast::channel(1);
    let persister = BatchPersister::new(
        batch_rx,
        store.clone(),
        100,
        Duration::from_millis(50),
        shutdown_tx.subscribe(),
    );
    let handle = persister.spawn();

    let ticket_id = TicketId::new();
    batch_tx
        .send(ReservedTicket {
            ticket_id,
            zone_id: ZoneId::new("zon_1"),
        })
        .await
        .unwrap();

    // First tick fails and retains the slice; a later tick lands it once.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(store.ticket_count(), 1);
    assert_eq!(store.available_seats(&ZoneId::new("zon_1")), Some(9));

    drop(batch_tx);
    let _ = shutdown_tx.send(());
    handle.await.unwrap();
}

#[tokio::test]
async fn shutdown_drains_pending_records() {
    let store = Arc::new(InMemoryEntityStore::new());
    store.insert_concert(fixtures::concert("con_1", "ven_1", 1));
    store.insert_zone(fixtures::zone("zon_1", "con_1", 1, 10, 20.0));

    let (batch_tx, batch_rx) = mpsc::channel(64);
    let (shutdown_tx, _) = broadcast::channel(1);
    let persister = BatchPersister::new(
        batch_rx,
        store.clone(),
        100,
        Duration::from_secs(3600),
        shutdown_tx.subscribe(),
    );
    let handle = persister.spawn();

    for _ in 0..5 {
        batch_tx
            .send(ReservedTicket {
                ticket_id: TicketId::new(),
                zone_id: ZoneId::new("zon_1"),
            })
            .await
            .unwrap();
    }

    // Stop before any trigger fired: the final drain must land everything.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let _ = shutdown_tx.send(());
    handle.await.unwrap();

    assert_eq!(store.ticket_count(), 5);
    assert_eq!(store.available_seats(&ZoneId::new("zon_1")), Some(5));
}

#[tokio::test]
async fn redelivered_ticket_id_persists_once() {
    let store = Arc::new(InMemoryEntityStore::new());
    store.insert_concert(fixtures::concert("con_1", "ven_1", 1));
    store.insert_zone(fixtures::zone("zon_1", "con_1", 1, 10, 20.0));

    let ticket_id = TicketId::new();
    let record = ReservedTicket {
        ticket_id,
        zone_id: ZoneId::new("zon_1"),
    };

    // Same ticket id submitted twice, as after a redelivery between enqueue
    // and commit: one row, one seat.
    let first = store.persist_reservations(&[record.clone()]).await.unwrap();
    let second = store.persist_reservations(&[record]).await.unwrap();

    assert_eq!(first, 1);
    assert_eq!(second, 0);
    assert_eq!(store.ticket_count(), 1);
    assert_eq!(store.available_seats(&ZoneId::new("zon_1")), Some(9));
}

#[tokio::test]
async fn zones_process_independently() {
    let h = harness();

    // Fill zone 1 (capacity 3), then zone 2 keeps admitting.
    for offset in 0..4 {
        let _ = h
            .processor
            .handle_order(&order("zon_1", "con_1"), offset)
            .await;
    }
    let result = h.processor.handle_order(&order("zon_2", "con_1"), 0).await;
    assert_eq!(result.status, ResultStatus::Success);

    drop(h.batch_rx);
}

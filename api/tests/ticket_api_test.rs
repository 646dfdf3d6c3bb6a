//! Ticket endpoint tests.
//!
//! Exercises the handlers directly against the in-memory store and cache.
//! The order-producing happy path needs a live broker and worker and is
//! covered by deployment tests; everything the handler decides on its own
//! (validation, replay, list reads, result mapping) is covered here.
//!
//! Run with: `cargo test --test ticket_api_test`

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use encore_api::tickets::{self, CreateTicketRequest};
use encore_api::{AppState, PendingResults};
use encore_core::cache::{self, CachedValue, TtlCache};
use encore_core::dto::TicketDetail;
use encore_core::events::SOLD_OUT_ERROR;
use encore_core::store::{EntityStore, ReservedTicket};
use encore_core::types::{ConcertId, TicketId, ZoneId};
use encore_kafka::{TicketProducer, TopicManager};
use encore_testing::{fixtures, InMemoryEntityStore, InMemoryTtlCache};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    store: Arc<InMemoryEntityStore>,
    cache: Arc<InMemoryTtlCache>,
    state: AppState,
}

/// State wired to in-memory seams. The producer and topic manager point at
/// an unused local address; no test below reaches the produce path.
fn harness() -> Harness {
    let store = Arc::new(InMemoryEntityStore::new());
    store.insert_venue(fixtures::venue("ven_1"));
    store.insert_concert(fixtures::concert("con_1", "ven_1", 2));
    store.insert_zone(fixtures::zone("zon_1", "con_1", 1, 3, 55.0));
    store.insert_zone(fixtures::zone("zon_2", "con_1", 2, 100, 30.0));

    let cache = Arc::new(InMemoryTtlCache::new());
    let producer =
        Arc::new(TicketProducer::new("localhost:9092", Duration::from_secs(1)).unwrap());
    let topics = Arc::new(TopicManager::new("localhost:9092", 1).unwrap());

    let state = AppState {
        store: store.clone(),
        cache: cache.clone(),
        producer,
        topics,
        pending: Arc::new(PendingResults::new()),
        order_timeout: Duration::from_millis(100),
        cache_ttl: Duration::from_secs(3600),
    };

    Harness {
        store,
        cache,
        state,
    }
}

fn sample_detail(ticket_id: TicketId) -> TicketDetail {
    let zone = fixtures::zone("zon_1", "con_1", 1, 3, 55.0);
    let concert = fixtures::concert("con_1", "ven_1", 2);
    TicketDetail::from_snapshot(ticket_id, &zone, &concert, chrono::Utc::now())
}

#[tokio::test]
async fn create_rejects_unknown_zone_with_404() {
    let h = harness();

    let err = tickets::create_ticket(
        State(h.state),
        Json(CreateTicketRequest {
            zone_id: ZoneId::new("zon_missing"),
            concert_id: ConcertId::new("con_1"),
        }),
    )
    .await
    .expect_err("must reject");

    assert_eq!(err.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_rejects_mismatched_concert_with_400() {
    let h = harness();
    h.store.insert_concert(fixtures::concert("con_2", "ven_1", 1));

    let err = tickets::create_ticket(
        State(h.state),
        Json(CreateTicketRequest {
            zone_id: ZoneId::new("zon_1"),
            concert_id: ConcertId::new("con_2"),
        }),
    )
    .await
    .expect_err("must reject");

    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    assert!(err.to_string().contains("does not belong"));
}

#[tokio::test]
async fn create_rejects_sold_out_zone_with_400() {
    let h = harness();
    let mut sold_out = fixtures::zone("zon_1", "con_1", 1, 10, 40.0);
    sold_out.available_seats = 0;
    h.store.insert_zone(sold_out);

    let err = tickets::create_ticket(
        State(h.state),
        Json(CreateTicketRequest {
            zone_id: ZoneId::new("zon_1"),
            concert_id: ConcertId::new("con_1"),
        }),
    )
    .await
    .expect_err("must reject");

    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    assert!(err.to_string().contains(SOLD_OUT_ERROR));
}

#[tokio::test]
async fn get_ticket_replays_from_cache_without_a_store_row() {
    let h = harness();

    // The result consumer deposited this after the client's POST timed out;
    // no database row exists yet.
    let ticket_id = TicketId::new();
    cache::write_value(
        h.cache.as_ref(),
        &ticket_id.to_string(),
        &CachedValue::TicketDetail(sample_detail(ticket_id)),
        Duration::from_secs(3600),
    )
    .await
    .unwrap();

    let Json(detail) = tickets::get_ticket(State(h.state), Path(*ticket_id.as_uuid()))
        .await
        .expect("cache replay");

    assert_eq!(detail.id, ticket_id);
    assert_eq!(detail.zone_name, "Zone 1");
}

#[tokio::test]
async fn get_ticket_falls_back_to_the_store_and_warms_the_cache() {
    let h = harness();

    let ticket_id = TicketId::new();
    h.store
        .persist_reservations(&[ReservedTicket {
            ticket_id,
            zone_id: ZoneId::new("zon_1"),
        }])
        .await
        .unwrap();

    let Json(detail) = tickets::get_ticket(State(h.state), Path(*ticket_id.as_uuid()))
        .await
        .expect("store fallback");
    assert_eq!(detail.id, ticket_id);
    assert_eq!(detail.price, 55.0);

    // Second read hits the warmed cache entry.
    let cached = h.cache.get(&ticket_id.to_string()).await.unwrap();
    assert!(cached.is_some());
}

#[tokio::test]
async fn get_ticket_returns_404_when_nowhere() {
    let h = harness();

    let err = tickets::get_ticket(State(h.state), Path(*TicketId::new().as_uuid()))
        .await
        .expect_err("missing everywhere");
    assert_eq!(err.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn a_cached_zone_is_never_served_as_a_ticket() {
    let h = harness();

    // A zone snapshot cached under a key that collides with the requested
    // ticket id must not be replayed as a TicketDetail.
    let ticket_id = TicketId::new();
    cache::write_value(
        h.cache.as_ref(),
        &ticket_id.to_string(),
        &CachedValue::Zone(fixtures::zone("zon_1", "con_1", 1, 3, 55.0)),
        Duration::from_secs(3600),
    )
    .await
    .unwrap();

    let err = tickets::get_ticket(State(h.state), Path(*ticket_id.as_uuid()))
        .await
        .expect_err("tag mismatch must fall through to the store");
    assert_eq!(err.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_endpoints_return_404_on_empty_and_rows_otherwise() {
    let h = harness();

    let err = tickets::tickets_by_concert(State(h.state.clone()), Path("con_1".to_string()))
        .await
        .expect_err("no tickets yet");
    assert_eq!(err.status(), StatusCode::NOT_FOUND);

    h.store
        .persist_reservations(&[
            ReservedTicket {
                ticket_id: TicketId::new(),
                zone_id: ZoneId::new("zon_1"),
            },
            ReservedTicket {
                ticket_id: TicketId::new(),
                zone_id: ZoneId::new("zon_2"),
            },
        ])
        .await
        .unwrap();

    let Json(by_concert) =
        tickets::tickets_by_concert(State(h.state.clone()), Path("con_1".to_string()))
            .await
            .expect("two tickets");
    assert_eq!(by_concert.len(), 2);

    let Json(by_zone) = tickets::tickets_by_zone(State(h.state), Path("zon_1".to_string()))
        .await
        .expect("one ticket");
    assert_eq!(by_zone.len(), 1);
    assert_eq!(by_zone[0].zone_id, ZoneId::new("zon_1"));
}

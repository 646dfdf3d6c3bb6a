//! Ticket endpoints.
//!
//! - `POST /tickets/` - submit an order and wait for the verdict.
//! - `GET /tickets/{id}` - replay from the TTL cache, fall back to storage.
//! - `GET /tickets/concert/{id}`, `GET /tickets/zone/{id}` - list reads.
//!
//! The POST handler validates against the freshest snapshot it can get
//! cheaply (cache first, store on miss) and rejects before producing when
//! the zone is missing, belongs to another concert, or is already sold out.
//! Everything that passes validation is decided by the reservation worker;
//! the handler just waits for the result to come back around.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use encore_core::cache::{self, CachedValue};
use encore_core::dto::TicketDetail;
use encore_core::entities::{ConcertDetail, Ticket, Zone};
use encore_core::events::{ResultStatus, TicketOrderEvent, SOLD_OUT_ERROR};
use encore_core::types::{ConcertId, TicketId, ZoneId};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

/// Request body for `POST /tickets/`.
#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    /// Zone to reserve a seat in
    pub zone_id: ZoneId,
    /// Concert the zone is expected to belong to
    pub concert_id: ConcertId,
}

/// Submit a ticket order and wait for the reservation verdict.
///
/// Publishes a [`TicketOrderEvent`] onto the concert's order topic at the
/// zone's partition, then blocks on the correlator until the worker's
/// result arrives or the wait times out.
///
/// # Errors
///
/// - 404 if the zone does not exist.
/// - 400 if the zone belongs to a different concert, is sold out, or the
///   worker rejects the order.
/// - 408 if no result arrives within the configured wait; a late result is
///   still cached and served by `GET /tickets/{id}`.
/// - 500 if the order cannot be produced or the worker reports a runtime
///   failure.
pub async fn create_ticket(
    State(state): State<AppState>,
    Json(request): Json<CreateTicketRequest>,
) -> Result<Json<TicketDetail>, AppError> {
    let zone = zone_snapshot(&state, &request.zone_id)
        .await?
        .ok_or_else(|| AppError::not_found("Zone", &request.zone_id))?;

    if zone.concert_id != request.concert_id {
        return Err(AppError::bad_request(format!(
            "Zone {} does not belong to concert {}",
            request.zone_id, request.concert_id
        )));
    }

    if !zone.has_available_seats() {
        return Err(AppError::bad_request(SOLD_OUT_ERROR));
    }

    let concert = concert_snapshot(&state, &zone.concert_id)
        .await?
        .ok_or_else(|| AppError::not_found("Concert", &zone.concert_id))?;

    // Reconcile the concert's topic pair lazily. Provisioning trouble is
    // not fatal here: if the topics already exist the order still flows,
    // and if they don't the produce below fails loudly.
    if let Err(e) = state
        .topics
        .ensure_provisioned(&zone.concert_id, concert.concert.num_zones)
        .await
    {
        warn!(concert_id = %zone.concert_id, error = %e, "Topic provisioning failed");
    }

    let ticket_id = TicketId::new();
    let order = TicketOrderEvent::new(
        ticket_id,
        request.zone_id.clone(),
        request.concert_id.clone(),
    );
    let partition = encore_kafka::partition_for(zone.zone_number);

    state
        .producer
        .produce_order(&order, partition)
        .await
        .map_err(|e| {
            AppError::internal("Failed to submit ticket order").with_source(anyhow::Error::new(e))
        })?;

    info!(
        ticket_id = %ticket_id,
        zone_id = %request.zone_id,
        partition = partition,
        "Order submitted; awaiting result"
    );

    let result = state
        .pending
        .await_result(ticket_id, state.order_timeout)
        .await
        .ok_or_else(|| AppError::timeout("Timed out waiting for the reservation result"))?;

    match result.status {
        ResultStatus::Success => result
            .ticket_data
            .map(Json)
            .ok_or_else(|| AppError::internal("Success result is missing ticket data")),
        ResultStatus::Failed => Err(AppError::from_failed_result(&result)),
    }
}

/// Fetch one ticket, replaying from the TTL cache when the worker's result
/// is still warm, otherwise reading through to storage.
///
/// # Errors
///
/// Returns 404 if the ticket exists in neither the cache nor storage.
pub async fn get_ticket(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TicketDetail>, AppError> {
    let ticket_id = TicketId::from_uuid(id);
    let key = ticket_id.to_string();

    match cache::read_value(state.cache.as_ref(), &key).await {
        Ok(Some(CachedValue::TicketDetail(detail))) => return Ok(Json(detail)),
        Ok(_) => {}
        Err(e) => warn!(ticket_id = %ticket_id, error = %e, "Ticket cache read failed"),
    }

    let detail = state
        .store
        .ticket_detail(&ticket_id)
        .await?
        .ok_or_else(|| AppError::not_found("Ticket", ticket_id))?;

    if let Err(e) = cache::write_value(
        state.cache.as_ref(),
        &key,
        &CachedValue::TicketDetail(detail.clone()),
        state.cache_ttl,
    )
    .await
    {
        warn!(ticket_id = %ticket_id, error = %e, "Ticket cache write failed");
    }

    Ok(Json(detail))
}

/// List all tickets sold for a concert.
///
/// # Errors
///
/// Returns 404 when the concert has no tickets.
pub async fn tickets_by_concert(
    State(state): State<AppState>,
    Path(concert_id): Path<String>,
) -> Result<Json<Vec<Ticket>>, AppError> {
    let tickets = state
        .store
        .tickets_by_concert(&ConcertId::new(concert_id))
        .await?;

    if tickets.is_empty() {
        return Err(AppError::not_found_message(
            "No tickets found for this concert",
        ));
    }
    Ok(Json(tickets))
}

/// List all tickets sold for a zone.
///
/// # Errors
///
/// Returns 404 when the zone has no tickets.
pub async fn tickets_by_zone(
    State(state): State<AppState>,
    Path(zone_id): Path<String>,
) -> Result<Json<Vec<Ticket>>, AppError> {
    let tickets = state.store.tickets_by_zone(&ZoneId::new(zone_id)).await?;

    if tickets.is_empty() {
        return Err(AppError::not_found_message("No tickets found for this zone"));
    }
    Ok(Json(tickets))
}

/// Zone snapshot: cache first, store on miss (warming the cache).
async fn zone_snapshot(state: &AppState, zone_id: &ZoneId) -> Result<Option<Zone>, AppError> {
    match cache::read_value(state.cache.as_ref(), zone_id.as_str()).await {
        Ok(Some(CachedValue::Zone(zone))) => return Ok(Some(zone)),
        Ok(_) => {}
        Err(e) => warn!(zone_id = %zone_id, error = %e, "Zone cache read failed"),
    }

    let Some(zone) = state.store.zone(zone_id).await? else {
        return Ok(None);
    };

    warm_cache(state, zone_id.as_str(), CachedValue::Zone(zone.clone())).await;
    Ok(Some(zone))
}

/// Concert snapshot: cache first, store on miss (warming the cache).
async fn concert_snapshot(
    state: &AppState,
    concert_id: &ConcertId,
) -> Result<Option<ConcertDetail>, AppError> {
    match cache::read_value(state.cache.as_ref(), concert_id.as_str()).await {
        Ok(Some(CachedValue::Concert(concert))) => return Ok(Some(concert)),
        Ok(_) => {}
        Err(e) => warn!(concert_id = %concert_id, error = %e, "Concert cache read failed"),
    }

    let Some(concert) = state.store.concert(concert_id).await? else {
        return Ok(None);
    };

    warm_cache(
        state,
        concert_id.as_str(),
        CachedValue::Concert(concert.clone()),
    )
    .await;
    Ok(Some(concert))
}

async fn warm_cache(state: &AppState, key: &str, value: CachedValue) {
    if let Err(e) = cache::write_value(state.cache.as_ref(), key, &value, state.cache_ttl).await {
        warn!(key = %key, error = %e, "Cache write failed");
    }
}

//! `PostgreSQL` implementation of the entity store.
//!
//! The store is deliberately narrow: the hot path needs exactly one write
//! operation ([`EntityStore::persist_reservations`]) and a handful of reads.
//! Everything else about the relational surface (admin CRUD, reporting)
//! belongs to external collaborators.
//!
//! # Batch commit semantics
//!
//! `persist_reservations` runs one transaction per batch:
//!
//! 1. Bulk-insert the ticket rows via `UNNEST`, with
//!    `ON CONFLICT (id) DO NOTHING` so a redelivered order cannot create a
//!    second row.
//! 2. Decrement each zone's `available_seats` by the number of rows that
//!    were *actually* inserted for it, clamped at zero.
//!
//! Counting only inserted rows keeps seat accounting idempotent under
//! redelivery, not just the rows themselves.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use encore_core::config::DatabaseConfig;
use encore_core::dto::TicketDetail;
use encore_core::entities::{Concert, ConcertDetail, Ticket, Zone};
use encore_core::store::{EntityStore, ReservedTicket, StoreError};
use encore_core::types::{ConcertId, TicketId, VenueId, ZoneId};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

/// Connect a pool and run the embedded migrations.
///
/// # Errors
///
/// Returns [`StoreError::Backend`] if the connection or a migration fails.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await
        .map_err(|e| StoreError::Backend(format!("Failed to connect: {e}")))?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| StoreError::Backend(format!("Migration failed: {e}")))?;

    tracing::info!(max_connections = config.max_connections, "Database connected");
    Ok(pool)
}

/// `PostgreSQL`-backed [`EntityStore`].
#[derive(Clone)]
pub struct PostgresEntityStore {
    pool: PgPool,
}

impl PostgresEntityStore {
    /// Wrap an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Access the underlying pool, e.g. for readiness checks.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(sqlx::FromRow)]
struct ZoneRow {
    id: String,
    concert_id: String,
    name: String,
    price: f64,
    zone_capacity: i32,
    available_seats: i32,
    zone_number: i32,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ZoneRow> for Zone {
    fn from(row: ZoneRow) -> Self {
        Self {
            id: ZoneId::new(row.id),
            concert_id: ConcertId::new(row.concert_id),
            name: row.name,
            price: row.price,
            zone_capacity: row.zone_capacity,
            available_seats: row.available_seats,
            zone_number: row.zone_number,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ConcertRow {
    id: String,
    venue_id: String,
    name: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    num_zones: i32,
    description: Option<String>,
    location: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ConcertRow> for Concert {
    fn from(row: ConcertRow) -> Self {
        Self {
            id: ConcertId::new(row.id),
            venue_id: VenueId::new(row.venue_id),
            name: row.name,
            start_time: row.start_time,
            end_time: row.end_time,
            num_zones: row.num_zones,
            description: row.description,
            location: row.location,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TicketRow {
    id: Uuid,
    zone_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TicketRow> for Ticket {
    fn from(row: TicketRow) -> Self {
        Self {
            id: TicketId::from_uuid(row.id),
            zone_id: ZoneId::new(row.zone_id),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TicketDetailRow {
    id: Uuid,
    zone_id: String,
    concert_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    concert_name: String,
    concert_description: Option<String>,
    price: f64,
    zone_name: String,
    zone_description: Option<String>,
}

impl From<TicketDetailRow> for TicketDetail {
    fn from(row: TicketDetailRow) -> Self {
        Self {
            id: TicketId::from_uuid(row.id),
            zone_id: ZoneId::new(row.zone_id),
            concert_id: ConcertId::new(row.concert_id),
            created_at: row.created_at,
            updated_at: row.updated_at,
            concert_name: row.concert_name,
            concert_description: row.concert_description,
            price: row.price,
            zone_name: row.zone_name,
            zone_description: row.zone_description,
        }
    }
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

#[async_trait]
impl EntityStore for PostgresEntityStore {
    async fn concert(&self, id: &ConcertId) -> Result<Option<ConcertDetail>, StoreError> {
        let concert: Option<ConcertRow> = sqlx::query_as(
            "SELECT id, venue_id, name, start_time, end_time, num_zones,
                    description, location, created_at, updated_at
             FROM concerts WHERE id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        let Some(concert) = concert else {
            return Ok(None);
        };

        let zones: Vec<ZoneRow> = sqlx::query_as(
            "SELECT id, concert_id, name, price, zone_capacity, available_seats,
                    zone_number, description, created_at, updated_at
             FROM zones WHERE concert_id = $1 ORDER BY zone_number",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(Some(ConcertDetail {
            concert: concert.into(),
            zones: zones.into_iter().map(Zone::from).collect(),
        }))
    }

    async fn zone(&self, id: &ZoneId) -> Result<Option<Zone>, StoreError> {
        let row: Option<ZoneRow> = sqlx::query_as(
            "SELECT id, concert_id, name, price, zone_capacity, available_seats,
                    zone_number, description, created_at, updated_at
             FROM zones WHERE id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        Ok(row.map(Zone::from))
    }

    async fn ticket_detail(&self, id: &TicketId) -> Result<Option<TicketDetail>, StoreError> {
        let row: Option<TicketDetailRow> = sqlx::query_as(
            "SELECT t.id, t.zone_id, z.concert_id, t.created_at, t.updated_at,
                    c.name AS concert_name, c.description AS concert_description,
                    z.price, z.name AS zone_name, z.description AS zone_description
             FROM tickets t
             JOIN zones z ON z.id = t.zone_id
             JOIN concerts c ON c.id = z.concert_id
             WHERE t.id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        Ok(row.map(TicketDetail::from))
    }

    async fn tickets_by_concert(&self, id: &ConcertId) -> Result<Vec<Ticket>, StoreError> {
        let rows: Vec<TicketRow> = sqlx::query_as(
            "SELECT t.id, t.zone_id, t.created_at, t.updated_at
             FROM tickets t
             JOIN zones z ON z.id = t.zone_id
             WHERE z.concert_id = $1
             ORDER BY t.created_at",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(rows.into_iter().map(Ticket::from).collect())
    }

    async fn tickets_by_zone(&self, id: &ZoneId) -> Result<Vec<Ticket>, StoreError> {
        let rows: Vec<TicketRow> = sqlx::query_as(
            "SELECT id, zone_id, created_at, updated_at
             FROM tickets WHERE zone_id = $1
             ORDER BY created_at",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(rows.into_iter().map(Ticket::from).collect())
    }

    async fn persist_reservations(&self, batch: &[ReservedTicket]) -> Result<u64, StoreError> {
        if batch.is_empty() {
            return Ok(0);
        }

        let ids: Vec<Uuid> = batch.iter().map(|t| *t.ticket_id.as_uuid()).collect();
        let zone_ids: Vec<String> = batch
            .iter()
            .map(|t| t.zone_id.as_str().to_string())
            .collect();

        let mut tx = self.pool.begin().await.map_err(backend)?;

        // Rows lost to the conflict clause were already persisted by an
        // earlier delivery and must not decrement seats again.
        let inserted: Vec<(String,)> = sqlx::query_as(
            "INSERT INTO tickets (id, zone_id, created_at, updated_at)
             SELECT id, zone_id, NOW(), NOW()
             FROM UNNEST($1::uuid[], $2::text[]) AS pending (id, zone_id)
             ON CONFLICT (id) DO NOTHING
             RETURNING zone_id",
        )
        .bind(&ids)
        .bind(&zone_ids)
        .fetch_all(&mut *tx)
        .await
        .map_err(backend)?;

        let mut per_zone: HashMap<String, i32> = HashMap::new();
        for (zone_id,) in &inserted {
            *per_zone.entry(zone_id.clone()).or_insert(0) += 1;
        }

        for (zone_id, count) in &per_zone {
            sqlx::query(
                "UPDATE zones
                 SET available_seats = GREATEST(available_seats - $2, 0),
                     updated_at = NOW()
                 WHERE id = $1",
            )
            .bind(zone_id)
            .bind(count)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }

        tx.commit().await.map_err(backend)?;

        tracing::info!(
            batch = batch.len(),
            inserted = inserted.len(),
            zones = per_zone.len(),
            "Reservation batch persisted"
        );

        Ok(inserted.len() as u64)
    }
}

//! `PostgreSQL` storage backend for the Queueline engine.
//!
//! Implements the `queueline-core` storage traits on top of sqlx. The atomic
//! units the traits document map onto database primitives:
//!
//! - admission is one transaction: a guarded `UPDATE .. RETURNING` on the
//!   occupancy counter (the last-slot race resolves inside the database)
//!   plus the ticket insert and its `CREATED` event
//! - a status transition is one transaction: the compare-and-swap on the
//!   `status` column, the event append and, for terminal edges that free a
//!   slot, the guarded occupancy decrement; if any piece misses, the
//!   transaction rolls back and nothing is applied
//!
//! The schema lives in `schema.sql` at the crate root; apply it before
//! connecting.
//!
//! # Example
//!
//! ```ignore
//! use queueline_postgres::PostgresQueueStore;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresQueueStore::connect("postgres://localhost/queueline", 8).await?;
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use queueline_core::error::StoreError;
use queueline_core::store::{
    AdmitOutcome, BranchDirectory, EventLog, TicketStore, TransitionOutcome,
};
use queueline_core::types::{
    BranchId, BranchSnapshot, DateRange, EventId, Priority, QueueEvent, QueueTicket, ServiceType,
    StaffId, TicketFilter, TicketId, TicketStatus,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{QueryBuilder, Row};
use std::str::FromStr;
use uuid::Uuid;

const TICKET_COLUMNS: &str = "id, branch_id, service_type, customer_name, customer_phone, \
     customer_email, priority, status, issued_at, called_at, served_at, completed_at, \
     cancelled_at, no_show_at";

/// `PostgreSQL`-backed branch directory, ticket store and event log.
#[derive(Clone)]
pub struct PostgresQueueStore {
    pool: PgPool,
}

impl PostgresQueueStore {
    /// Wraps an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a new pool to `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] when the database is unreachable.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(store_error)?;
        tracing::info!(max_connections, "connected to postgres");
        Ok(Self::new(pool))
    }

    /// The underlying pool, for schema setup in operational tooling.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Registers (or replaces) a branch capacity record.
    ///
    /// Branch master data is owned by the external Branch service; this is
    /// the seam through which provisioning and the demo server seed it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    pub async fn register_branch(&self, snapshot: BranchSnapshot) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO queue_branches (id, max_capacity, occupied, is_operational)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                max_capacity = EXCLUDED.max_capacity,
                occupied = EXCLUDED.occupied,
                is_operational = EXCLUDED.is_operational
            ",
        )
        .bind(*snapshot.branch_id.as_uuid())
        .bind(i64::from(snapshot.max_capacity))
        .bind(i64::from(snapshot.occupied))
        .bind(snapshot.is_operational)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(())
    }
}

#[async_trait]
impl BranchDirectory for PostgresQueueStore {
    async fn branch(&self, branch_id: BranchId) -> Result<Option<BranchSnapshot>, StoreError> {
        let row = sqlx::query(
            "SELECT id, max_capacity, occupied, is_operational FROM queue_branches WHERE id = $1",
        )
        .bind(*branch_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        row.map(|row| branch_from_row(&row)).transpose()
    }
}

#[async_trait]
impl TicketStore for PostgresQueueStore {
    async fn admit(
        &self,
        ticket: QueueTicket,
        created: QueueEvent,
    ) -> Result<AdmitOutcome, StoreError> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        // The guard in the WHERE clause makes the increment atomic: of two
        // callers racing for the last free slot, only one matches. The
        // ticket insert rides in the same transaction, so a failure after
        // the increment rolls the slot back with it.
        let row = sqlx::query(
            r"
            UPDATE queue_branches
            SET occupied = occupied + 1
            WHERE id = $1 AND is_operational AND occupied < max_capacity
            RETURNING id, max_capacity, occupied, is_operational
            ",
        )
        .bind(*ticket.branch_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(store_error)?;

        let Some(row) = row else {
            // No row matched: classify why and apply nothing.
            let branch = sqlx::query(
                "SELECT id, max_capacity, occupied, is_operational \
                 FROM queue_branches WHERE id = $1",
            )
            .bind(*ticket.branch_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(store_error)?
            .map(|row| branch_from_row(&row))
            .transpose()?;
            tx.rollback().await.map_err(store_error)?;
            return match branch {
                None => Ok(AdmitOutcome::BranchNotFound),
                Some(branch) if !branch.is_operational => Ok(AdmitOutcome::NotOperational),
                Some(_) => Ok(AdmitOutcome::Full),
            };
        };
        let snapshot = branch_from_row(&row)?;

        sqlx::query(
            r"
            INSERT INTO queue_tickets (
                id, branch_id, service_type, customer_name, customer_phone,
                customer_email, priority, status, issued_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(*ticket.id.as_uuid())
        .bind(*ticket.branch_id.as_uuid())
        .bind(ticket.service_type.as_str())
        .bind(&ticket.customer_name)
        .bind(&ticket.customer_phone)
        .bind(&ticket.customer_email)
        .bind(i16::from(ticket.priority.level()))
        .bind(ticket.status.as_str())
        .bind(ticket.issued_at)
        .execute(&mut *tx)
        .await
        .map_err(store_error)?;

        insert_event(&mut tx, &created).await?;
        tx.commit().await.map_err(store_error)?;
        Ok(AdmitOutcome::Admitted(snapshot))
    }

    async fn ticket(&self, ticket_id: TicketId) -> Result<Option<QueueTicket>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {TICKET_COLUMNS} FROM queue_tickets WHERE id = $1"
        ))
        .bind(*ticket_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        row.map(|row| ticket_from_row(&row)).transpose()
    }

    async fn transition(
        &self,
        ticket_id: TicketId,
        expected: TicketStatus,
        target: TicketStatus,
        event: QueueEvent,
        release_slot: bool,
    ) -> Result<TransitionOutcome, StoreError> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        // CAS on the status column; COALESCE keeps an already-stamped
        // timestamp on re-entry into a previously visited state.
        let update = timestamp_column(target).map_or_else(
            || {
                format!(
                    "UPDATE queue_tickets SET status = $1 \
                     WHERE id = $2 AND status = $3 RETURNING {TICKET_COLUMNS}"
                )
            },
            |column| {
                format!(
                    "UPDATE queue_tickets SET status = $1, {column} = COALESCE({column}, $4) \
                     WHERE id = $2 AND status = $3 RETURNING {TICKET_COLUMNS}"
                )
            },
        );

        let mut query = sqlx::query(&update)
            .bind(target.as_str())
            .bind(*ticket_id.as_uuid())
            .bind(expected.as_str());
        if timestamp_column(target).is_some() {
            query = query.bind(event.event_time);
        }
        let row = query.fetch_optional(&mut *tx).await.map_err(store_error)?;

        let Some(row) = row else {
            // Lost the swap; report the fresh status so the caller can
            // re-validate.
            let current: Option<String> =
                sqlx::query_scalar("SELECT status FROM queue_tickets WHERE id = $1")
                    .bind(*ticket_id.as_uuid())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(store_error)?;
            tx.rollback().await.map_err(store_error)?;
            return match current {
                Some(status) => Ok(TransitionOutcome::Conflict(parse_status(&status)?)),
                None => Ok(TransitionOutcome::NotFound),
            };
        };

        let ticket = ticket_from_row(&row)?;
        insert_event(&mut tx, &event).await?;

        // The slot comes back in the same transaction as the swap, so the
        // release happens exactly once and never outlives a failed swap.
        if release_slot {
            let released = sqlx::query(
                r"
                UPDATE queue_branches
                SET occupied = occupied - 1
                WHERE id = $1 AND occupied > 0
                RETURNING id
                ",
            )
            .bind(*ticket.branch_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(store_error)?;

            if released.is_none() {
                tx.rollback().await.map_err(store_error)?;
                return Ok(TransitionOutcome::Underflow);
            }
        }

        tx.commit().await.map_err(store_error)?;
        Ok(TransitionOutcome::Applied(ticket))
    }

    async fn list(&self, filter: &TicketFilter) -> Result<Vec<QueueTicket>, StoreError> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT {TICKET_COLUMNS} FROM queue_tickets WHERE 1=1"));

        if let Some(branch_id) = filter.branch_id {
            builder.push(" AND branch_id = ").push_bind(*branch_id.as_uuid());
        }
        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(service_type) = &filter.service_type {
            builder
                .push(" AND service_type = ")
                .push_bind(service_type.as_str().to_string());
        }
        if let Some(start) = filter.range.start {
            builder.push(" AND issued_at >= ").push_bind(start);
        }
        if let Some(end) = filter.range.end {
            builder.push(" AND issued_at < ").push_bind(end);
        }
        builder.push(" ORDER BY priority DESC, issued_at ASC, id ASC");

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;
        rows.iter().map(ticket_from_row).collect()
    }
}

#[async_trait]
impl EventLog for PostgresQueueStore {
    async fn events_for_ticket(&self, ticket_id: TicketId) -> Result<Vec<QueueEvent>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT id, ticket_id, event_type, event_time, staff_id, notes
            FROM queue_events
            WHERE ticket_id = $1
            ORDER BY event_time ASC, id ASC
            ",
        )
        .bind(*ticket_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        rows.iter().map(event_from_row).collect()
    }

    async fn events_for_branch(
        &self,
        branch_id: BranchId,
        range: &DateRange,
    ) -> Result<Vec<QueueEvent>, StoreError> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "SELECT e.id, e.ticket_id, e.event_type, e.event_time, e.staff_id, e.notes \
             FROM queue_events e \
             JOIN queue_tickets t ON t.id = e.ticket_id \
             WHERE t.branch_id = ",
        );
        builder.push_bind(*branch_id.as_uuid());
        if let Some(start) = range.start {
            builder.push(" AND e.event_time >= ").push_bind(start);
        }
        if let Some(end) = range.end {
            builder.push(" AND e.event_time < ").push_bind(end);
        }
        builder.push(" ORDER BY e.event_time ASC, e.id ASC");

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;
        rows.iter().map(event_from_row).collect()
    }
}

// ============================================================================
// Row Mapping & Error Classification
// ============================================================================

async fn insert_event(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    event: &QueueEvent,
) -> Result<(), StoreError> {
    sqlx::query(
        r"
        INSERT INTO queue_events (id, ticket_id, event_type, event_time, staff_id, notes)
        VALUES ($1, $2, $3, $4, $5, $6)
        ",
    )
    .bind(*event.id.as_uuid())
    .bind(*event.ticket_id.as_uuid())
    .bind(event.event_type.as_str())
    .bind(event.event_time)
    .bind(event.staff_id.map(|id| *id.as_uuid()))
    .bind(&event.notes)
    .execute(&mut **tx)
    .await
    .map_err(store_error)?;
    Ok(())
}

/// Timestamp column stamped when a ticket enters `status`. `WAITING` has no
/// own column; `issued_at` is written at insert.
const fn timestamp_column(status: TicketStatus) -> Option<&'static str> {
    match status {
        TicketStatus::Waiting => None,
        TicketStatus::Called => Some("called_at"),
        TicketStatus::Serving => Some("served_at"),
        TicketStatus::Completed => Some("completed_at"),
        TicketStatus::Cancelled => Some("cancelled_at"),
        TicketStatus::NoShow => Some("no_show_at"),
    }
}

fn parse_status(raw: &str) -> Result<TicketStatus, StoreError> {
    TicketStatus::from_str(raw)
        .map_err(|_| StoreError::Corrupted(format!("unknown status '{raw}' in queue_tickets")))
}

fn branch_from_row(row: &PgRow) -> Result<BranchSnapshot, StoreError> {
    let max_capacity: i64 = row.try_get("max_capacity").map_err(store_error)?;
    let occupied: i64 = row.try_get("occupied").map_err(store_error)?;
    Ok(BranchSnapshot {
        branch_id: BranchId::from_uuid(row.try_get("id").map_err(store_error)?),
        max_capacity: u32::try_from(max_capacity)
            .map_err(|_| StoreError::Corrupted(format!("negative max_capacity {max_capacity}")))?,
        occupied: u32::try_from(occupied)
            .map_err(|_| StoreError::Corrupted(format!("negative occupancy {occupied}")))?,
        is_operational: row.try_get("is_operational").map_err(store_error)?,
    })
}

fn ticket_from_row(row: &PgRow) -> Result<QueueTicket, StoreError> {
    let service_type: String = row.try_get("service_type").map_err(store_error)?;
    let status: String = row.try_get("status").map_err(store_error)?;
    let priority: i16 = row.try_get("priority").map_err(store_error)?;

    Ok(QueueTicket {
        id: TicketId::from_uuid(row.try_get("id").map_err(store_error)?),
        branch_id: BranchId::from_uuid(row.try_get("branch_id").map_err(store_error)?),
        service_type: ServiceType::new(service_type)
            .map_err(|err| StoreError::Corrupted(err.to_string()))?,
        customer_name: row.try_get("customer_name").map_err(store_error)?,
        customer_phone: row.try_get("customer_phone").map_err(store_error)?,
        customer_email: row.try_get("customer_email").map_err(store_error)?,
        priority: Priority::new(
            u8::try_from(priority)
                .map_err(|_| StoreError::Corrupted(format!("priority {priority} out of range")))?,
        ),
        status: parse_status(&status)?,
        issued_at: row.try_get("issued_at").map_err(store_error)?,
        called_at: row.try_get("called_at").map_err(store_error)?,
        served_at: row.try_get("served_at").map_err(store_error)?,
        completed_at: row.try_get("completed_at").map_err(store_error)?,
        cancelled_at: row.try_get("cancelled_at").map_err(store_error)?,
        no_show_at: row.try_get("no_show_at").map_err(store_error)?,
    })
}

fn event_from_row(row: &PgRow) -> Result<QueueEvent, StoreError> {
    let event_type: String = row.try_get("event_type").map_err(store_error)?;
    let staff_id: Option<Uuid> = row.try_get("staff_id").map_err(store_error)?;
    let event_time: DateTime<Utc> = row.try_get("event_time").map_err(store_error)?;

    Ok(QueueEvent {
        id: EventId::from_uuid(row.try_get("id").map_err(store_error)?),
        ticket_id: TicketId::from_uuid(row.try_get("ticket_id").map_err(store_error)?),
        event_type: event_type.parse().map_err(|_| {
            StoreError::Corrupted(format!("unknown event type '{event_type}' in queue_events"))
        })?,
        event_time,
        staff_id: staff_id.map(StaffId::from_uuid),
        notes: row.try_get("notes").map_err(store_error)?,
    })
}

/// Maps sqlx failures onto the domain's two storage buckets: connection and
/// timeout trouble is transient, everything that implies bad data or a bad
/// query is not.
fn store_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => {
            metrics::counter!("queueline_store_transient_errors_total").increment(1);
            StoreError::Unavailable(err.to_string())
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::TypeNotFound { .. } => {
            StoreError::Corrupted(err.to_string())
        }
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Corrupted(err.to_string())
        }
        // Constraint violations surface the CHECK guards in the schema;
        // anything else database-side is treated as retryable.
        _ => StoreError::Unavailable(err.to_string()),
    }
}

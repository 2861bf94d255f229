//! Queue ticket API endpoints.
//!
//! - `POST /tickets` - Issue a ticket against a branch's capacity
//! - `GET /tickets/:id` - Get a single ticket
//! - `GET /tickets/:id/events` - Get a ticket's audit trail
//! - `PATCH /tickets/:id/status` - Apply a lifecycle transition
//! - `GET /tickets/branch/:branch_id` - List a branch's tickets in queue order
//! - `GET /tickets/next/:branch_id` - Peek the next ticket to serve
//! - `GET /tickets/analytics/:branch_id` - Aggregate branch analytics
//!
//! Status and service-type strings are parsed explicitly so malformed input
//! comes back as a 400 with a message, not a framework rejection.

use crate::error::AppError;
use crate::metrics;
use crate::retry::retry_queue_op;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use queueline_core::analytics::TicketAnalytics;
use queueline_core::engine::{IssueTicket, TransitionTicket};
use queueline_core::error::QueueError;
use queueline_core::types::{
    BranchId, DateRange, Priority, QueueEvent, QueueTicket, ServiceType, StaffId, TicketFilter,
    TicketId, TicketStatus,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to issue a new ticket.
#[derive(Debug, Deserialize)]
pub struct IssueTicketRequest {
    /// Branch to queue at
    pub branch_id: Uuid,
    /// Queue partition within the branch
    pub service_type: String,
    /// Optional customer name
    pub customer_name: Option<String>,
    /// Optional customer phone
    pub customer_phone: Option<String>,
    /// Optional customer email
    pub customer_email: Option<String>,
    /// Priority band; omitted means walk-in (lowest)
    pub priority: Option<u8>,
}

/// Request to transition a ticket's status.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    /// Target status (wire form, e.g. `"CALLED"`)
    pub status: String,
    /// Staff member performing the transition
    pub staff_id: Option<Uuid>,
    /// Free-form operator notes for the audit trail
    pub notes: Option<String>,
}

/// Query parameters for branch ticket listings.
#[derive(Debug, Default, Deserialize)]
pub struct ListTicketsQuery {
    /// Restrict to one status (wire form)
    pub status: Option<String>,
    /// Restrict to one service type
    pub service_type: Option<String>,
    /// Inclusive lower bound on `issued_at`
    pub start: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `issued_at`
    pub end: Option<DateTime<Utc>>,
}

/// Query parameters for next-ticket selection.
#[derive(Debug, Default, Deserialize)]
pub struct NextTicketQuery {
    /// Restrict selection to one service type
    pub service_type: Option<String>,
}

/// Query parameters for branch analytics.
#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsQuery {
    /// Inclusive lower bound on `issued_at`
    pub start: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `issued_at`
    pub end: Option<DateTime<Utc>>,
}

/// A ticket as returned over the wire.
#[derive(Debug, Serialize)]
pub struct TicketResponse {
    /// Ticket ID
    pub id: Uuid,
    /// Branch ID
    pub branch_id: Uuid,
    /// Service type
    pub service_type: String,
    /// Customer name
    pub customer_name: Option<String>,
    /// Customer phone
    pub customer_phone: Option<String>,
    /// Customer email
    pub customer_email: Option<String>,
    /// Priority band
    pub priority: u8,
    /// Current status (wire form)
    pub status: TicketStatus,
    /// Issuance timestamp
    pub issued_at: DateTime<Utc>,
    /// First call timestamp
    pub called_at: Option<DateTime<Utc>>,
    /// Service start timestamp
    pub served_at: Option<DateTime<Utc>>,
    /// Completion timestamp
    pub completed_at: Option<DateTime<Utc>>,
    /// Cancellation timestamp
    pub cancelled_at: Option<DateTime<Utc>>,
    /// No-show timestamp
    pub no_show_at: Option<DateTime<Utc>>,
}

impl From<QueueTicket> for TicketResponse {
    fn from(ticket: QueueTicket) -> Self {
        Self {
            id: *ticket.id.as_uuid(),
            branch_id: *ticket.branch_id.as_uuid(),
            service_type: ticket.service_type.as_str().to_string(),
            customer_name: ticket.customer_name,
            customer_phone: ticket.customer_phone,
            customer_email: ticket.customer_email,
            priority: ticket.priority.level(),
            status: ticket.status,
            issued_at: ticket.issued_at,
            called_at: ticket.called_at,
            served_at: ticket.served_at,
            completed_at: ticket.completed_at,
            cancelled_at: ticket.cancelled_at,
            no_show_at: ticket.no_show_at,
        }
    }
}

/// A lifecycle event as returned over the wire.
#[derive(Debug, Serialize)]
pub struct EventResponse {
    /// Event ID
    pub id: Uuid,
    /// Ticket the event belongs to
    pub ticket_id: Uuid,
    /// Event type (wire form)
    pub event_type: String,
    /// When the event happened
    pub event_time: DateTime<Utc>,
    /// Acting staff member, when recorded
    pub staff_id: Option<Uuid>,
    /// Operator notes, when recorded
    pub notes: Option<String>,
}

impl From<QueueEvent> for EventResponse {
    fn from(event: QueueEvent) -> Self {
        Self {
            id: *event.id.as_uuid(),
            ticket_id: *event.ticket_id.as_uuid(),
            event_type: event.event_type.as_str().to_string(),
            event_time: event.event_time,
            staff_id: event.staff_id.map(|id| *id.as_uuid()),
            notes: event.notes,
        }
    }
}

/// Branch ticket listing response.
#[derive(Debug, Serialize)]
pub struct TicketListResponse {
    /// Tickets in queue order
    pub tickets: Vec<TicketResponse>,
    /// Number of tickets returned
    pub total: usize,
}

/// Next-ticket response. `ticket` is null when the queue is empty, which is
/// an ordinary condition, not an error.
#[derive(Debug, Serialize)]
pub struct NextTicketResponse {
    /// The candidate ticket, if any
    pub ticket: Option<TicketResponse>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Issue a new ticket.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/tickets \
///   -H "Content-Type: application/json" \
///   -d '{
///     "branch_id": "550e8400-e29b-41d4-a716-446655440000",
///     "service_type": "teller",
///     "customer_name": "Dana",
///     "priority": 2
///   }'
/// ```
pub async fn issue_ticket(
    State(state): State<AppState>,
    Json(request): Json<IssueTicketRequest>,
) -> Result<(StatusCode, Json<TicketResponse>), AppError> {
    let mut input = IssueTicket::new(BranchId::from_uuid(request.branch_id), &request.service_type)?
        .with_customer(
            request.customer_name,
            request.customer_phone,
            request.customer_email,
        )?;
    if let Some(priority) = request.priority {
        input = input.with_priority(Priority::new(priority));
    }

    let ticket = retry_queue_op(&state.retry, || state.engine.issue_ticket(input.clone()))
        .await
        .inspect_err(|err| {
            if matches!(err, QueueError::CapacityExceeded(_)) {
                metrics::record_rejection("capacity_exceeded");
            }
        })?;

    metrics::record_ticket_issued();
    Ok((StatusCode::CREATED, Json(ticket.into())))
}

/// Get a single ticket by ID.
pub async fn get_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
) -> Result<Json<TicketResponse>, AppError> {
    let ticket_id = TicketId::from_uuid(ticket_id);
    let ticket = retry_queue_op(&state.retry, || state.engine.ticket(ticket_id)).await?;
    Ok(Json(ticket.into()))
}

/// Get a ticket's audit trail, ordered by event time.
pub async fn get_ticket_events(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
) -> Result<Json<Vec<EventResponse>>, AppError> {
    let ticket_id = TicketId::from_uuid(ticket_id);
    let events = retry_queue_op(&state.retry, || state.engine.ticket_events(ticket_id)).await?;
    Ok(Json(events.into_iter().map(EventResponse::from).collect()))
}

/// Apply a lifecycle transition to a ticket.
///
/// # Example
///
/// ```bash
/// curl -X PATCH http://localhost:8080/tickets/660e8400-e29b-41d4-a716-446655440001/status \
///   -H "Content-Type: application/json" \
///   -d '{"status": "CALLED", "staff_id": "770e8400-e29b-41d4-a716-446655440002"}'
/// ```
pub async fn update_ticket_status(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<TicketResponse>, AppError> {
    let target: TicketStatus = request.status.parse()?;
    let input = TransitionTicket::new(TicketId::from_uuid(ticket_id), target)
        .with_staff_id(request.staff_id.map(StaffId::from_uuid))
        .with_notes(request.notes);

    let ticket = retry_queue_op(&state.retry, || state.engine.transition(input.clone()))
        .await
        .inspect_err(|err| {
            if matches!(err, QueueError::IllegalTransition { .. }) {
                metrics::record_rejection("illegal_transition");
            }
        })?;

    metrics::record_transition(&ticket);
    Ok(Json(ticket.into()))
}

/// List a branch's tickets in queue order.
pub async fn list_branch_tickets(
    State(state): State<AppState>,
    Path(branch_id): Path<Uuid>,
    Query(query): Query<ListTicketsQuery>,
) -> Result<Json<TicketListResponse>, AppError> {
    let mut filter = TicketFilter::for_branch(BranchId::from_uuid(branch_id))
        .with_range(DateRange::between(query.start, query.end));
    if let Some(status) = &query.status {
        filter = filter.with_status(status.parse()?);
    }
    if let Some(service_type) = query.service_type {
        filter = filter.with_service_type(ServiceType::new(service_type)?);
    }

    let tickets = retry_queue_op(&state.retry, || state.engine.list_tickets(&filter)).await?;
    let total = tickets.len();
    Ok(Json(TicketListResponse {
        tickets: tickets.into_iter().map(TicketResponse::from).collect(),
        total,
    }))
}

/// Peek the next ticket to serve for a branch.
pub async fn next_ticket(
    State(state): State<AppState>,
    Path(branch_id): Path<Uuid>,
    Query(query): Query<NextTicketQuery>,
) -> Result<Json<NextTicketResponse>, AppError> {
    let branch_id = BranchId::from_uuid(branch_id);
    let service_type = query.service_type.map(ServiceType::new).transpose()?;

    let ticket = retry_queue_op(&state.retry, || {
        state.engine.next_ticket(branch_id, service_type.as_ref())
    })
    .await?;
    Ok(Json(NextTicketResponse {
        ticket: ticket.map(TicketResponse::from),
    }))
}

/// Aggregate analytics for a branch.
pub async fn branch_analytics(
    State(state): State<AppState>,
    Path(branch_id): Path<Uuid>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<TicketAnalytics>, AppError> {
    let branch_id = BranchId::from_uuid(branch_id);
    let range = DateRange::between(query.start, query.end);

    let report = retry_queue_op(&state.retry, || state.engine.analytics(branch_id, &range)).await?;
    Ok(Json(report))
}

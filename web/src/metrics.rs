//! Business metrics for the queue engine.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `queueline_tickets_issued_total` - Tickets issued
//! - `queueline_transitions_total{to}` - Applied transitions by target status
//! - `queueline_rejections_total{reason}` - Rejected operations by reason
//!
//! ## Histograms
//! - `queueline_wait_seconds` - Issuance-to-call wait per called ticket
//! - `queueline_service_seconds` - Service duration per completed ticket

use metrics::{counter, describe_counter, describe_histogram, histogram};
use queueline_core::types::{QueueTicket, TicketStatus};

/// Initialize and register all business metrics descriptions.
///
/// Call once at application startup, before any metrics are recorded.
pub fn register_queue_metrics() {
    describe_counter!(
        "queueline_tickets_issued_total",
        "Total number of tickets issued"
    );
    describe_counter!(
        "queueline_transitions_total",
        "Total applied lifecycle transitions, labelled by target status"
    );
    describe_counter!(
        "queueline_rejections_total",
        "Total rejected operations, labelled by rejection reason"
    );
    describe_histogram!(
        "queueline_wait_seconds",
        "Seconds between ticket issuance and first call"
    );
    describe_histogram!(
        "queueline_service_seconds",
        "Seconds between service start and completion"
    );

    tracing::info!("Queue metrics registered");
}

/// Record a successful issuance
pub fn record_ticket_issued() {
    counter!("queueline_tickets_issued_total").increment(1);
}

/// Record an applied transition, including duration samples where the
/// ticket's timestamps make them available.
pub fn record_transition(ticket: &QueueTicket) {
    counter!(
        "queueline_transitions_total",
        "to" => ticket.status.as_str()
    )
    .increment(1);

    match ticket.status {
        TicketStatus::Called => {
            if let Some(called_at) = ticket.called_at {
                record_seconds("queueline_wait_seconds", ticket.issued_at, called_at);
            }
        }
        TicketStatus::Completed => {
            if let (Some(served_at), Some(completed_at)) = (ticket.served_at, ticket.completed_at) {
                record_seconds("queueline_service_seconds", served_at, completed_at);
            }
        }
        _ => {}
    }
}

/// Record a rejected operation
pub fn record_rejection(reason: &'static str) {
    counter!("queueline_rejections_total", "reason" => reason).increment(1);
}

fn record_seconds(
    name: &'static str,
    from: chrono::DateTime<chrono::Utc>,
    to: chrono::DateTime<chrono::Utc>,
) {
    #[allow(clippy::cast_precision_loss)]
    let seconds = (to - from).num_milliseconds() as f64 / 1000.0;
    if seconds >= 0.0 {
        histogram!(name).record(seconds);
    }
}

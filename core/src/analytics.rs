//! Operational analytics over the ticket history.
//!
//! Read-only aggregation; tolerant of an empty candidate set (zeroed
//! aggregates, never an error). Ticket timestamps are written atomically
//! with their lifecycle events, so aggregating over them is equivalent to
//! replaying the event log.

use crate::error::StoreError;
use crate::store::TicketStore;
use crate::types::{BranchId, DateRange, QueueTicket, TicketFilter, TicketStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Aggregate report for one branch over an optional date range.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketAnalytics {
    /// Tickets issued in the range
    pub total: u64,
    /// Ticket counts per current status
    pub by_status: HashMap<TicketStatus, u64>,
    /// Ticket counts per service type
    pub by_service_type: HashMap<String, u64>,
    /// Mean seconds between issuance and first call, over tickets that went
    /// on to be served; zero when no ticket qualifies
    pub avg_wait_time: f64,
    /// Mean seconds between service start and completion, over completed
    /// tickets; zero when no ticket qualifies
    pub avg_service_time: f64,
}

/// Read-only aggregator over the ticket store.
#[derive(Clone)]
pub struct AnalyticsAggregator {
    tickets: Arc<dyn TicketStore>,
}

impl AnalyticsAggregator {
    /// Creates an aggregator over the given store
    pub fn new(tickets: Arc<dyn TicketStore>) -> Self {
        Self { tickets }
    }

    /// Computes the aggregate report for `branch_id` within `range`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails. An empty candidate set
    /// is not an error.
    pub async fn report(
        &self,
        branch_id: BranchId,
        range: &DateRange,
    ) -> Result<TicketAnalytics, StoreError> {
        let filter = TicketFilter::for_branch(branch_id).with_range(*range);
        let tickets = self.tickets.list(&filter).await?;
        Ok(aggregate(&tickets))
    }
}

fn aggregate(tickets: &[QueueTicket]) -> TicketAnalytics {
    let mut report = TicketAnalytics {
        total: tickets.len() as u64,
        ..TicketAnalytics::default()
    };

    let mut wait = MeanAccumulator::default();
    let mut service = MeanAccumulator::default();

    for ticket in tickets {
        *report.by_status.entry(ticket.status).or_insert(0) += 1;
        *report
            .by_service_type
            .entry(ticket.service_type.as_str().to_string())
            .or_insert(0) += 1;

        // Waits count only for tickets that reached service; a no-show that
        // was called but never served would otherwise skew the mean.
        if ticket.served_at.is_some() {
            if let Some(called_at) = ticket.called_at {
                wait.add(seconds_between(ticket.issued_at, called_at));
            }
        }
        if ticket.status == TicketStatus::Completed {
            if let (Some(served_at), Some(completed_at)) = (ticket.served_at, ticket.completed_at) {
                service.add(seconds_between(served_at, completed_at));
            }
        }
    }

    report.avg_wait_time = wait.mean();
    report.avg_service_time = service.mean();
    report
}

fn seconds_between(from: chrono::DateTime<chrono::Utc>, to: chrono::DateTime<chrono::Utc>) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    {
        (to - from).num_milliseconds() as f64 / 1000.0
    }
}

#[derive(Default)]
struct MeanAccumulator {
    sum: f64,
    count: u32,
}

impl MeanAccumulator {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / f64::from(self.count)
        }
    }
}

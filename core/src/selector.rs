//! Next-ticket selection.
//!
//! A read-only query: pick the ticket to serve next for a branch (optionally
//! narrowed to one service type). The ordering is total and deterministic
//! (two calls against an unchanged candidate set return the same ticket),
//! so callers can display the candidate and then claim it with an explicit
//! `CALLED` transition, which re-validates under the status CAS.

use crate::error::StoreError;
use crate::store::TicketStore;
use crate::types::{BranchId, QueueTicket, ServiceType, TicketFilter, TicketStatus};
use std::cmp::Ordering;
use std::sync::Arc;

/// Total queue order: `priority` descending, `issued_at` ascending (strict
/// FIFO within a priority band), ticket id ascending as the final tiebreak
/// so equal-timestamp tickets still order deterministically.
#[must_use]
pub fn queue_position_cmp(a: &QueueTicket, b: &QueueTicket) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| a.issued_at.cmp(&b.issued_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Read-only selector over the ticket store.
#[derive(Clone)]
pub struct NextTicketSelector {
    tickets: Arc<dyn TicketStore>,
}

impl NextTicketSelector {
    /// Creates a selector over the given store
    pub fn new(tickets: Arc<dyn TicketStore>) -> Self {
        Self { tickets }
    }

    /// The next `WAITING` ticket to serve, or `None` when the queue is empty.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    pub async fn next(
        &self,
        branch_id: BranchId,
        service_type: Option<&ServiceType>,
    ) -> Result<Option<QueueTicket>, StoreError> {
        let mut filter = TicketFilter::for_branch(branch_id).with_status(TicketStatus::Waiting);
        if let Some(service_type) = service_type {
            filter = filter.with_service_type(service_type.clone());
        }
        let candidates = self.tickets.list(&filter).await?;
        Ok(candidates.into_iter().next())
    }
}

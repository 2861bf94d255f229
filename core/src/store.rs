//! Storage traits consumed by the engine.
//!
//! Three seams, mirroring the component boundaries: [`BranchDirectory`] is
//! the read interface to the external Branch collaborator's capacity
//! records, [`TicketStore`] holds ticket rows and owns the occupancy-coupled
//! writes, and [`EventLog`] is the append-only audit read surface.
//!
//! # Atomicity contract
//!
//! Implementations must make each of these a single atomic unit (row lock,
//! transaction, or a process-wide lock for the in-memory backend):
//!
//! - [`TicketStore::admit`]: the occupancy increment, the ticket row and its
//!   `CREATED` event all land together or not at all. Of two callers racing
//!   for the last free slot, exactly one admits.
//! - [`TicketStore::transition`]: the status compare-and-swap, the
//!   first-write-only timestamp, the event append and (when requested) the
//!   occupancy decrement land together. A swap against a stale expected
//!   status applies nothing and reports [`TransitionOutcome::Conflict`]; a
//!   decrement that would underflow applies nothing and reports
//!   [`TransitionOutcome::Underflow`].
//!
//! The occupancy counter is never read-modify-written outside these units,
//! and [`crate::capacity::CapacityGuard`] is the only caller of the
//! occupancy-coupled operations.
//!
//! Outcome enums keep precondition misses (unknown branch, queue full) out
//! of [`StoreError`], which is reserved for real storage failures.

use crate::error::StoreError;
use crate::types::{
    BranchId, BranchSnapshot, DateRange, QueueEvent, QueueTicket, TicketFilter, TicketId,
    TicketStatus,
};
use async_trait::async_trait;

/// Result of an atomic admission (occupancy increment + ticket insert).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdmitOutcome {
    /// Slot reserved and ticket persisted; the snapshot reflects the
    /// post-increment counter
    Admitted(BranchSnapshot),
    /// Branch unknown to the directory; nothing was changed
    BranchNotFound,
    /// Branch exists but is not accepting tickets; nothing was changed
    NotOperational,
    /// `occupied == max_capacity`; nothing was changed
    Full,
}

/// Result of an optimistic status transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The swap won; the updated ticket is returned
    Applied(QueueTicket),
    /// The ticket's status no longer matched the expected value
    Conflict(TicketStatus),
    /// The ticket does not exist
    NotFound,
    /// A slot release was required but the branch is unknown or its counter
    /// was already zero. The whole unit was abandoned, the ticket is
    /// untouched. A broken invariant, so the caller escalates rather than
    /// correcting silently.
    Underflow,
}

/// Read access to branch capacity records.
#[async_trait]
pub trait BranchDirectory: Send + Sync {
    /// Reads the current capacity record for a branch.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    async fn branch(&self, branch_id: BranchId) -> Result<Option<BranchSnapshot>, StoreError>;
}

/// Durable record of tickets, including the occupancy-coupled writes.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Atomically reserves one occupancy slot and persists the ticket with
    /// its `CREATED` event.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupted`] on a duplicate ticket id, and
    /// [`StoreError`] on backend failure; capacity and precondition misses
    /// are reported through [`AdmitOutcome`].
    async fn admit(
        &self,
        ticket: QueueTicket,
        created: QueueEvent,
    ) -> Result<AdmitOutcome, StoreError>;

    /// Reads a single ticket.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    async fn ticket(&self, ticket_id: TicketId) -> Result<Option<QueueTicket>, StoreError>;

    /// Compare-and-swap status update.
    ///
    /// Applies `target` (with its first-write-only timestamp taken from
    /// `event.event_time`) and appends `event`, but only if the stored
    /// status still equals `expected`. When `release_slot` is set, the
    /// branch occupancy decrement commits in the same unit; an underflow
    /// aborts the whole unit.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails; lost races surface as
    /// [`TransitionOutcome::Conflict`].
    async fn transition(
        &self,
        ticket_id: TicketId,
        expected: TicketStatus,
        target: TicketStatus,
        event: QueueEvent,
        release_slot: bool,
    ) -> Result<TransitionOutcome, StoreError>;

    /// Lists tickets matching `filter` in queue order: `priority`
    /// descending, then `issued_at` ascending, then `id` ascending.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    async fn list(&self, filter: &TicketFilter) -> Result<Vec<QueueTicket>, StoreError>;
}

/// Read surface over the append-only event log.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Events for one ticket, ordered by `event_time`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    async fn events_for_ticket(&self, ticket_id: TicketId) -> Result<Vec<QueueEvent>, StoreError>;

    /// Events for all tickets of a branch within `range`, ordered by
    /// `event_time` then event id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    async fn events_for_branch(
        &self,
        branch_id: BranchId,
        range: &DateRange,
    ) -> Result<Vec<QueueEvent>, StoreError>;
}

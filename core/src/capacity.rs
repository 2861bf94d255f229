//! Branch capacity guard.
//!
//! [`CapacityGuard`] is the only component that invokes the store's
//! occupancy-coupled operations, so every change to a branch's counter
//! flows through it. Admission couples the increment to the ticket insert
//! and a transition couples the decrement to the status swap, each inside
//! one storage-level atomic unit. The counter is never read-modify-written
//! from application code and a failed operation applies nothing.

use crate::error::QueueError;
use crate::state_machine;
use crate::store::{AdmitOutcome, TicketStore, TransitionOutcome};
use crate::types::{BranchSnapshot, QueueEvent, QueueTicket, TicketId, TicketStatus};
use std::sync::Arc;

/// Result of a guarded transition attempt.
///
/// The store-level underflow outcome never appears here; the guard turns it
/// into [`QueueError::ConsistencyViolation`] before returning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardedTransition {
    /// The swap won; the updated ticket is returned
    Applied(QueueTicket),
    /// The ticket's status no longer matched the expected value
    Conflict(TicketStatus),
    /// The ticket does not exist
    NotFound,
}

/// Sole owner of branch occupancy mutation.
#[derive(Clone)]
pub struct CapacityGuard {
    tickets: Arc<dyn TicketStore>,
}

impl CapacityGuard {
    /// Creates a guard over the given ticket store
    pub fn new(tickets: Arc<dyn TicketStore>) -> Self {
        Self { tickets }
    }

    /// Atomically reserves one occupancy slot and persists `ticket` with its
    /// `CREATED` event. Either the slot, the row and the event all exist
    /// afterwards or none of them do.
    ///
    /// # Errors
    ///
    /// - [`QueueError::BranchNotFound`] for an unknown branch
    /// - [`QueueError::BranchNotOperational`] when the branch is closed
    /// - [`QueueError::CapacityExceeded`] when `occupied == max_capacity`
    /// - [`QueueError::Storage`] when the store fails
    pub async fn admit(
        &self,
        ticket: QueueTicket,
        created: QueueEvent,
    ) -> Result<BranchSnapshot, QueueError> {
        let branch_id = ticket.branch_id;
        match self.tickets.admit(ticket, created).await? {
            AdmitOutcome::Admitted(snapshot) => {
                tracing::debug!(
                    %branch_id,
                    occupied = snapshot.occupied,
                    max_capacity = snapshot.max_capacity,
                    "capacity slot reserved"
                );
                Ok(snapshot)
            }
            AdmitOutcome::BranchNotFound => Err(QueueError::BranchNotFound(branch_id)),
            AdmitOutcome::NotOperational => Err(QueueError::BranchNotOperational(branch_id)),
            AdmitOutcome::Full => {
                tracing::debug!(%branch_id, "admission rejected, branch at capacity");
                Err(QueueError::CapacityExceeded(branch_id))
            }
        }
    }

    /// Applies a status swap, coupling the occupancy release to it when the
    /// edge takes an occupying ticket to a terminal status.
    ///
    /// The release decision is made from `expected`, which the swap itself
    /// re-validates, so the slot comes back exactly once per ticket
    /// lifetime no matter how the race resolves.
    ///
    /// # Errors
    ///
    /// A release that would underflow the branch counter is a broken
    /// invariant and surfaces as [`QueueError::ConsistencyViolation`]; it is
    /// never silently absorbed. [`QueueError::Storage`] on store failure.
    pub async fn apply_transition(
        &self,
        ticket_id: TicketId,
        expected: TicketStatus,
        target: TicketStatus,
        event: QueueEvent,
    ) -> Result<GuardedTransition, QueueError> {
        let release_slot =
            state_machine::is_terminal(target) && state_machine::is_occupying(expected);

        match self
            .tickets
            .transition(ticket_id, expected, target, event, release_slot)
            .await?
        {
            TransitionOutcome::Applied(ticket) => {
                if release_slot {
                    tracing::debug!(
                        branch_id = %ticket.branch_id,
                        %ticket_id,
                        "capacity slot released"
                    );
                }
                Ok(GuardedTransition::Applied(ticket))
            }
            TransitionOutcome::Conflict(actual) => Ok(GuardedTransition::Conflict(actual)),
            TransitionOutcome::NotFound => Ok(GuardedTransition::NotFound),
            TransitionOutcome::Underflow => {
                tracing::error!(%ticket_id, %target, "occupancy counter would go negative");
                Err(QueueError::ConsistencyViolation(format!(
                    "slot release for ticket {ticket_id} would underflow its branch counter"
                )))
            }
        }
    }
}

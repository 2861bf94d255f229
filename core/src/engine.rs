//! The queue engine facade.
//!
//! Composes the capacity guard, state machine, selector and aggregator into
//! the four public operations: issue a ticket, transition a ticket, select
//! the next ticket, and compute analytics. All storage mutation goes through
//! the atomic units documented on [`crate::store`], so a failed operation
//! applies nothing and no partial application is ever observable.

use crate::analytics::{AnalyticsAggregator, TicketAnalytics};
use crate::capacity::{CapacityGuard, GuardedTransition};
use crate::environment::Clock;
use crate::error::QueueError;
use crate::feed::{TicketFeed, TicketNotice};
use crate::selector::NextTicketSelector;
use crate::state_machine;
use crate::store::{BranchDirectory, EventLog, TicketStore};
use crate::types::{
    BranchId, BranchSnapshot, DateRange, EventType, Priority, QueueEvent, QueueTicket, ServiceType,
    StaffId, TicketFilter, TicketId, TicketStatus,
};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Bound on optimistic-transition retries before the engine reports the
/// race as a conflict. Each retry re-reads and re-validates, so this only
/// triggers under pathological contention on a single ticket.
const MAX_TRANSITION_RACES: u32 = 3;

// ============================================================================
// Operation Inputs
// ============================================================================

/// Validated input for [`QueueEngine::issue_ticket`].
///
/// Construction is the validation boundary: a value of this type is always
/// well-formed, so malformed shapes are rejected before the engine or
/// storage is touched.
#[derive(Clone, Debug)]
pub struct IssueTicket {
    /// Branch whose capacity the ticket will count against
    pub branch_id: BranchId,
    /// Queue partition within the branch
    pub service_type: ServiceType,
    /// Optional customer name
    pub customer_name: Option<String>,
    /// Optional customer phone
    pub customer_phone: Option<String>,
    /// Optional customer email
    pub customer_email: Option<String>,
    /// Priority band; defaults to [`Priority::LOWEST`]
    pub priority: Priority,
}

impl IssueTicket {
    /// Creates an issue request with default priority and no contact info.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidInput`] for an empty `service_type`.
    pub fn new(branch_id: BranchId, service_type: &str) -> Result<Self, QueueError> {
        Ok(Self {
            branch_id,
            service_type: ServiceType::new(service_type)?,
            customer_name: None,
            customer_phone: None,
            customer_email: None,
            priority: Priority::LOWEST,
        })
    }

    /// Attaches contact details. Present-but-empty fields are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidInput`] when a provided field is empty.
    pub fn with_customer(
        mut self,
        name: Option<String>,
        phone: Option<String>,
        email: Option<String>,
    ) -> Result<Self, QueueError> {
        for (field, value) in [
            ("customer_name", &name),
            ("customer_phone", &phone),
            ("customer_email", &email),
        ] {
            if let Some(value) = value {
                if value.trim().is_empty() {
                    return Err(QueueError::InvalidInput(format!(
                        "{field} must not be empty when provided"
                    )));
                }
            }
        }
        self.customer_name = name;
        self.customer_phone = phone;
        self.customer_email = email;
        Ok(self)
    }

    /// Overrides the default priority
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// Input for [`QueueEngine::transition`].
#[derive(Clone, Debug)]
pub struct TransitionTicket {
    /// Ticket to transition
    pub ticket_id: TicketId,
    /// Requested target status
    pub target: TicketStatus,
    /// Staff member performing the transition, when known
    pub staff_id: Option<StaffId>,
    /// Free-form operator notes recorded on the event
    pub notes: Option<String>,
}

impl TransitionTicket {
    /// Creates a transition request without staff attribution or notes
    #[must_use]
    pub const fn new(ticket_id: TicketId, target: TicketStatus) -> Self {
        Self {
            ticket_id,
            target,
            staff_id: None,
            notes: None,
        }
    }

    /// Attaches the acting staff member
    #[must_use]
    pub const fn with_staff_id(mut self, staff_id: Option<StaffId>) -> Self {
        self.staff_id = staff_id;
        self
    }

    /// Attaches operator notes
    #[must_use]
    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Facade over the queue ticket lifecycle and branch capacity engine.
#[derive(Clone)]
pub struct QueueEngine {
    tickets: Arc<dyn TicketStore>,
    events: Arc<dyn EventLog>,
    branches: Arc<dyn BranchDirectory>,
    capacity: CapacityGuard,
    selector: NextTicketSelector,
    analytics: AnalyticsAggregator,
    feed: TicketFeed,
    clock: Arc<dyn Clock>,
}

impl QueueEngine {
    /// Wires an engine over the given storage seams
    pub fn new(
        tickets: Arc<dyn TicketStore>,
        events: Arc<dyn EventLog>,
        branches: Arc<dyn BranchDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            selector: NextTicketSelector::new(tickets.clone()),
            analytics: AnalyticsAggregator::new(tickets.clone()),
            capacity: CapacityGuard::new(tickets.clone()),
            feed: TicketFeed::default(),
            tickets,
            events,
            branches,
            clock,
        }
    }

    /// Issues a new ticket into the queue.
    ///
    /// Admission is one storage-level atomic unit: the capacity slot, the
    /// `WAITING` ticket row and its `CREATED` event all commit together or
    /// not at all, so a failed issuance leaves no trace.
    ///
    /// # Errors
    ///
    /// Propagates [`CapacityGuard::admit`] errors and storage failures.
    pub async fn issue_ticket(&self, input: IssueTicket) -> Result<QueueTicket, QueueError> {
        let now = self.clock.now();
        let ticket = QueueTicket {
            id: TicketId::new(),
            branch_id: input.branch_id,
            service_type: input.service_type,
            customer_name: input.customer_name,
            customer_phone: input.customer_phone,
            customer_email: input.customer_email,
            priority: input.priority,
            status: TicketStatus::Waiting,
            issued_at: now,
            called_at: None,
            served_at: None,
            completed_at: None,
            cancelled_at: None,
            no_show_at: None,
        };
        let created = QueueEvent::new(ticket.id, EventType::Created, now);

        let snapshot = self.capacity.admit(ticket.clone(), created.clone()).await?;

        tracing::info!(
            ticket_id = %ticket.id,
            branch_id = %ticket.branch_id,
            service_type = %ticket.service_type,
            priority = %ticket.priority,
            occupied = snapshot.occupied,
            "ticket issued"
        );
        self.feed.publish(TicketNotice {
            ticket: ticket.clone(),
            event: created,
        });
        Ok(ticket)
    }

    /// Applies a lifecycle transition to a ticket.
    ///
    /// Validates the edge against the static transition table and applies
    /// it through the store's status compare-and-swap. When an occupying
    /// ticket reaches a terminal status, the capacity release commits in
    /// the same atomic unit as the swap. Lost races re-validate against the
    /// fresh status and surface as [`QueueError::IllegalTransition`] when
    /// the requested edge is no longer legal.
    ///
    /// # Errors
    ///
    /// - [`QueueError::TicketNotFound`] for an unknown ticket
    /// - [`QueueError::IllegalTransition`] for an edge outside the table
    /// - [`QueueError::ConsistencyViolation`] if the capacity release
    ///   underflows
    /// - [`QueueError::Storage`] on backend failure
    pub async fn transition(&self, input: TransitionTicket) -> Result<QueueTicket, QueueError> {
        let TransitionTicket {
            ticket_id,
            target,
            staff_id,
            notes,
        } = input;

        let mut current = self
            .tickets
            .ticket(ticket_id)
            .await?
            .ok_or(QueueError::TicketNotFound(ticket_id))?
            .status;

        for _ in 0..MAX_TRANSITION_RACES {
            if !state_machine::is_legal(current, target) {
                return Err(QueueError::IllegalTransition {
                    ticket_id,
                    from: current,
                    to: target,
                });
            }

            let event = QueueEvent::new(ticket_id, EventType::for_status(target), self.clock.now())
                .with_staff_id(staff_id)
                .with_notes(notes.clone());

            match self
                .capacity
                .apply_transition(ticket_id, current, target, event.clone())
                .await?
            {
                GuardedTransition::Applied(ticket) => {
                    tracing::info!(
                        %ticket_id,
                        branch_id = %ticket.branch_id,
                        from = %current,
                        to = %target,
                        "ticket transitioned"
                    );
                    self.feed.publish(TicketNotice {
                        ticket: ticket.clone(),
                        event,
                    });
                    return Ok(ticket);
                }
                GuardedTransition::Conflict(actual) => {
                    tracing::debug!(
                        %ticket_id,
                        expected = %current,
                        actual = %actual,
                        "transition lost a race, re-validating"
                    );
                    current = actual;
                }
                GuardedTransition::NotFound => {
                    return Err(QueueError::TicketNotFound(ticket_id));
                }
            }
        }

        Err(QueueError::IllegalTransition {
            ticket_id,
            from: current,
            to: target,
        })
    }

    /// The next `WAITING` ticket for a branch, without mutating state.
    ///
    /// Callers claim the candidate with an explicit `CALLED` transition,
    /// which re-validates under the status CAS.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Storage`] on backend failure.
    pub async fn next_ticket(
        &self,
        branch_id: BranchId,
        service_type: Option<&ServiceType>,
    ) -> Result<Option<QueueTicket>, QueueError> {
        Ok(self.selector.next(branch_id, service_type).await?)
    }

    /// Aggregate analytics for a branch over an optional date range.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Storage`] on backend failure.
    pub async fn analytics(
        &self,
        branch_id: BranchId,
        range: &DateRange,
    ) -> Result<TicketAnalytics, QueueError> {
        Ok(self.analytics.report(branch_id, range).await?)
    }

    /// Reads the capacity record for a branch.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::BranchNotFound`] for an unknown branch and
    /// [`QueueError::Storage`] on backend failure.
    pub async fn branch(&self, branch_id: BranchId) -> Result<BranchSnapshot, QueueError> {
        self.branches
            .branch(branch_id)
            .await?
            .ok_or(QueueError::BranchNotFound(branch_id))
    }

    /// Reads a single ticket.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::TicketNotFound`] for an unknown ticket and
    /// [`QueueError::Storage`] on backend failure.
    pub async fn ticket(&self, ticket_id: TicketId) -> Result<QueueTicket, QueueError> {
        self.tickets
            .ticket(ticket_id)
            .await?
            .ok_or(QueueError::TicketNotFound(ticket_id))
    }

    /// The audit trail for a ticket, ordered by event time.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::TicketNotFound`] for an unknown ticket and
    /// [`QueueError::Storage`] on backend failure.
    pub async fn ticket_events(&self, ticket_id: TicketId) -> Result<Vec<QueueEvent>, QueueError> {
        if self.tickets.ticket(ticket_id).await?.is_none() {
            return Err(QueueError::TicketNotFound(ticket_id));
        }
        Ok(self.events.events_for_ticket(ticket_id).await?)
    }

    /// Lists tickets in queue order.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Storage`] on backend failure.
    pub async fn list_tickets(
        &self,
        filter: &TicketFilter,
    ) -> Result<Vec<QueueTicket>, QueueError> {
        Ok(self.tickets.list(filter).await?)
    }

    /// Subscribes to committed lifecycle events (see [`TicketFeed`])
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TicketNotice> {
        self.feed.subscribe()
    }
}

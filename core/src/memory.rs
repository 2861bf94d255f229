//! In-memory storage backend.
//!
//! Implements the storage traits behind one process-wide lock, which makes
//! every documented atomic unit trivially atomic: admission (occupancy
//! increment + ticket insert + `CREATED` event) and transition (status swap
//! + timestamp + event append + conditional occupancy decrement) each run
//! under a single write-lock acquisition, so a failed unit applies nothing.
//!
//! Used by the test suites and as the zero-dependency backend for the
//! server binary; `queueline-postgres` provides the durable equivalent.

use crate::error::StoreError;
use crate::selector::queue_position_cmp;
use crate::store::{AdmitOutcome, BranchDirectory, EventLog, TicketStore, TransitionOutcome};
use crate::types::{
    BranchId, BranchSnapshot, DateRange, QueueEvent, QueueTicket, TicketFilter, TicketId,
    TicketStatus,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Inner {
    branches: HashMap<BranchId, BranchSnapshot>,
    tickets: HashMap<TicketId, QueueTicket>,
    events: HashMap<TicketId, Vec<QueueEvent>>,
}

/// In-memory branch directory, ticket store and event log.
#[derive(Debug, Default)]
pub struct InMemoryQueueStore {
    inner: RwLock<Inner>,
}

impl InMemoryQueueStore {
    /// Creates an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a branch capacity record.
    ///
    /// Branch master data is owned by the external Branch service; this is
    /// the seam through which tests and the demo server provision it.
    pub fn register_branch(&self, snapshot: BranchSnapshot) {
        self.write().branches.insert(snapshot.branch_id, snapshot);
    }

    /// Flips a branch's operational flag. Returns `false` for an unknown branch.
    pub fn set_operational(&self, branch_id: BranchId, is_operational: bool) -> bool {
        match self.write().branches.get_mut(&branch_id) {
            Some(branch) => {
                branch.is_operational = is_operational;
                true
            }
            None => false,
        }
    }

    /// Synchronous snapshot read for assertions in tests
    #[must_use]
    pub fn branch_snapshot(&self, branch_id: BranchId) -> Option<BranchSnapshot> {
        self.read().branches.get(&branch_id).copied()
    }

    /// Injects a ticket and its events directly, bypassing admission.
    ///
    /// Seam for read-path suites that need tickets in arbitrary lifecycle
    /// states without walking each one through the engine. The branch
    /// counter is not touched.
    pub fn seed_ticket(&self, ticket: QueueTicket, events: Vec<QueueEvent>) {
        let mut inner = self.write();
        inner.events.entry(ticket.id).or_default().extend(events);
        inner.tickets.insert(ticket.id, ticket);
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl BranchDirectory for InMemoryQueueStore {
    async fn branch(&self, branch_id: BranchId) -> Result<Option<BranchSnapshot>, StoreError> {
        Ok(self.read().branches.get(&branch_id).copied())
    }
}

#[async_trait]
impl TicketStore for InMemoryQueueStore {
    async fn admit(
        &self,
        ticket: QueueTicket,
        created: QueueEvent,
    ) -> Result<AdmitOutcome, StoreError> {
        let mut inner = self.write();
        if inner.tickets.contains_key(&ticket.id) {
            return Err(StoreError::Corrupted(format!(
                "duplicate ticket id {}",
                ticket.id
            )));
        }
        let Some(branch) = inner.branches.get_mut(&ticket.branch_id) else {
            return Ok(AdmitOutcome::BranchNotFound);
        };
        if !branch.is_operational {
            return Ok(AdmitOutcome::NotOperational);
        }
        if branch.occupied >= branch.max_capacity {
            return Ok(AdmitOutcome::Full);
        }
        branch.occupied += 1;
        let snapshot = *branch;
        inner.events.entry(ticket.id).or_default().push(created);
        inner.tickets.insert(ticket.id, ticket);
        Ok(AdmitOutcome::Admitted(snapshot))
    }

    async fn ticket(&self, ticket_id: TicketId) -> Result<Option<QueueTicket>, StoreError> {
        Ok(self.read().tickets.get(&ticket_id).cloned())
    }

    async fn transition(
        &self,
        ticket_id: TicketId,
        expected: TicketStatus,
        target: TicketStatus,
        event: QueueEvent,
        release_slot: bool,
    ) -> Result<TransitionOutcome, StoreError> {
        let mut inner = self.write();
        let Some(ticket) = inner.tickets.get(&ticket_id) else {
            return Ok(TransitionOutcome::NotFound);
        };
        if ticket.status != expected {
            return Ok(TransitionOutcome::Conflict(ticket.status));
        }
        let branch_id = ticket.branch_id;

        // Check the release before touching anything, so an underflow
        // abandons the whole unit.
        if release_slot
            && inner
                .branches
                .get(&branch_id)
                .is_none_or(|branch| branch.occupied == 0)
        {
            return Ok(TransitionOutcome::Underflow);
        }

        let Some(ticket) = inner.tickets.get_mut(&ticket_id) else {
            return Ok(TransitionOutcome::NotFound);
        };
        ticket.apply_transition(target, event.event_time);
        let updated = ticket.clone();
        inner.events.entry(ticket_id).or_default().push(event);
        if release_slot {
            if let Some(branch) = inner.branches.get_mut(&branch_id) {
                branch.occupied -= 1;
            }
        }
        Ok(TransitionOutcome::Applied(updated))
    }

    async fn list(&self, filter: &TicketFilter) -> Result<Vec<QueueTicket>, StoreError> {
        let inner = self.read();
        let mut tickets: Vec<QueueTicket> = inner
            .tickets
            .values()
            .filter(|ticket| filter.matches(ticket))
            .cloned()
            .collect();
        // HashMap iteration order is arbitrary; sort for the documented
        // deterministic queue order.
        tickets.sort_by(queue_position_cmp);
        Ok(tickets)
    }
}

#[async_trait]
impl EventLog for InMemoryQueueStore {
    async fn events_for_ticket(&self, ticket_id: TicketId) -> Result<Vec<QueueEvent>, StoreError> {
        let inner = self.read();
        let mut events = inner.events.get(&ticket_id).cloned().unwrap_or_default();
        events.sort_by_key(|event| (event.event_time, event.id));
        Ok(events)
    }

    async fn events_for_branch(
        &self,
        branch_id: BranchId,
        range: &DateRange,
    ) -> Result<Vec<QueueEvent>, StoreError> {
        let inner = self.read();
        let mut events: Vec<QueueEvent> = inner
            .tickets
            .values()
            .filter(|ticket| ticket.branch_id == branch_id)
            .filter_map(|ticket| inner.events.get(&ticket.id))
            .flatten()
            .filter(|event| range.contains(event.event_time))
            .cloned()
            .collect();
        events.sort_by_key(|event| (event.event_time, event.id));
        Ok(events)
    }
}

//! Integration tests for the queue engine lifecycle.
//!
//! Exercises the full issue / call / serve / complete flow against the
//! in-memory backend, including the capacity races and transient-failure
//! paths the engine is responsible for.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use queueline_core::engine::{IssueTicket, QueueEngine, TransitionTicket};
use queueline_core::environment::Clock;
use queueline_core::error::{QueueError, StoreError};
use queueline_core::memory::InMemoryQueueStore;
use queueline_core::store::{AdmitOutcome, TicketStore, TransitionOutcome};
use queueline_core::types::{
    BranchId, BranchSnapshot, EventType, Priority, QueueEvent, QueueTicket, StaffId, TicketFilter,
    TicketId, TicketStatus,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

// ============================================================================
// Test Fixtures
// ============================================================================

/// Deterministic clock advancing one minute per `now()` call.
struct SteppingClock {
    base: DateTime<Utc>,
    ticks: AtomicI64,
}

impl SteppingClock {
    fn new() -> Self {
        Self {
            base: Utc.with_ymd_and_hms(2026, 7, 15, 9, 0, 0).unwrap(),
            ticks: AtomicI64::new(0),
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
        self.base + Duration::minutes(tick)
    }
}

struct Fixture {
    engine: QueueEngine,
    store: Arc<InMemoryQueueStore>,
    branch_id: BranchId,
}

fn fixture(max_capacity: u32) -> Fixture {
    let store = Arc::new(InMemoryQueueStore::new());
    let branch_id = BranchId::new();
    store.register_branch(BranchSnapshot {
        branch_id,
        max_capacity,
        occupied: 0,
        is_operational: true,
    });
    let engine = QueueEngine::new(
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(SteppingClock::new()),
    );
    Fixture {
        engine,
        store,
        branch_id,
    }
}

fn occupied(fixture: &Fixture) -> u32 {
    fixture
        .store
        .branch_snapshot(fixture.branch_id)
        .unwrap()
        .occupied
}

// ============================================================================
// Issuance & Capacity
// ============================================================================

#[tokio::test]
async fn test_issue_ticket_occupies_a_slot_and_records_created_event() {
    let f = fixture(5);
    let ticket = f
        .engine
        .issue_ticket(IssueTicket::new(f.branch_id, "teller").unwrap())
        .await
        .unwrap();

    assert_eq!(ticket.status, TicketStatus::Waiting);
    assert_eq!(occupied(&f), 1);

    let events = f.engine.ticket_events(ticket.id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::Created);
    assert_eq!(events[0].event_time, ticket.issued_at);
}

#[tokio::test]
async fn test_last_slot_race_admits_exactly_one() {
    let f = fixture(1);

    let a = f.engine.clone();
    let b = f.engine.clone();
    let branch_id = f.branch_id;
    let (first, second) = tokio::join!(
        tokio::spawn(async move {
            a.issue_ticket(IssueTicket::new(branch_id, "teller").unwrap())
                .await
        }),
        tokio::spawn(async move {
            b.issue_ticket(IssueTicket::new(branch_id, "teller").unwrap())
                .await
        }),
    );

    let results = [first.unwrap(), second.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let capacity_rejections = results
        .iter()
        .filter(|r| matches!(r, Err(QueueError::CapacityExceeded(_))))
        .count();

    assert_eq!(successes, 1);
    assert_eq!(capacity_rejections, 1);
    assert_eq!(occupied(&f), 1);
}

#[tokio::test]
async fn test_issue_against_closed_branch_is_rejected() {
    let f = fixture(5);
    f.store.set_operational(f.branch_id, false);

    let err = f
        .engine
        .issue_ticket(IssueTicket::new(f.branch_id, "teller").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::BranchNotOperational(b) if b == f.branch_id));
    assert_eq!(occupied(&f), 0);
}

#[tokio::test]
async fn test_issue_against_unknown_branch_is_rejected() {
    let f = fixture(5);
    let err = f
        .engine
        .issue_ticket(IssueTicket::new(BranchId::new(), "teller").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::BranchNotFound(_)));
}

#[tokio::test]
async fn test_empty_contact_fields_are_rejected_before_admission() {
    let f = fixture(1);
    let err = IssueTicket::new(f.branch_id, "teller")
        .unwrap()
        .with_customer(Some(String::new()), None, None)
        .unwrap_err();
    assert!(matches!(err, QueueError::InvalidInput(_)));
    // Validation happens on construction, so no slot was touched.
    assert_eq!(occupied(&f), 0);
}

// ============================================================================
// Lifecycle Transitions
// ============================================================================

#[tokio::test]
async fn test_full_lifecycle_releases_capacity_once() {
    let f = fixture(3);
    let staff = StaffId::new();
    let ticket = f
        .engine
        .issue_ticket(IssueTicket::new(f.branch_id, "loans").unwrap())
        .await
        .unwrap();

    for target in [
        TicketStatus::Called,
        TicketStatus::Serving,
        TicketStatus::Completed,
    ] {
        let updated = f
            .engine
            .transition(
                TransitionTicket::new(ticket.id, target).with_staff_id(Some(staff)),
            )
            .await
            .unwrap();
        assert_eq!(updated.status, target);
    }

    // Called, serving and completed stay occupying until the terminal edge.
    assert_eq!(occupied(&f), 0);

    let final_ticket = f.engine.ticket(ticket.id).await.unwrap();
    assert!(final_ticket.called_at.is_some());
    assert!(final_ticket.served_at.is_some());
    assert!(final_ticket.completed_at.is_some());
    assert!(final_ticket.called_at < final_ticket.served_at);
    assert!(final_ticket.served_at < final_ticket.completed_at);

    let events = f.engine.ticket_events(ticket.id).await.unwrap();
    let kinds: Vec<EventType> = events.iter().map(|e| e.event_type).collect();
    assert_eq!(
        kinds,
        vec![
            EventType::Created,
            EventType::Called,
            EventType::Serving,
            EventType::Completed,
        ]
    );
    assert!(events[1..].iter().all(|e| e.staff_id == Some(staff)));
}

#[tokio::test]
async fn test_illegal_transition_leaves_everything_unchanged() {
    let f = fixture(3);
    let ticket = f
        .engine
        .issue_ticket(IssueTicket::new(f.branch_id, "teller").unwrap())
        .await
        .unwrap();

    // Skipping the call step is not a legal edge.
    let err = f
        .engine
        .transition(TransitionTicket::new(ticket.id, TicketStatus::Serving))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        QueueError::IllegalTransition {
            from: TicketStatus::Waiting,
            to: TicketStatus::Serving,
            ..
        }
    ));

    let unchanged = f.engine.ticket(ticket.id).await.unwrap();
    assert_eq!(unchanged.status, TicketStatus::Waiting);
    assert!(unchanged.served_at.is_none());
    assert_eq!(occupied(&f), 1);
    assert_eq!(f.engine.ticket_events(ticket.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_cancel_from_waiting_frees_the_slot() {
    let f = fixture(1);
    let ticket = f
        .engine
        .issue_ticket(IssueTicket::new(f.branch_id, "teller").unwrap())
        .await
        .unwrap();

    f.engine
        .transition(
            TransitionTicket::new(ticket.id, TicketStatus::Cancelled)
                .with_notes(Some("customer left".to_string())),
        )
        .await
        .unwrap();
    assert_eq!(occupied(&f), 0);

    // The freed slot admits the next customer.
    f.engine
        .issue_ticket(IssueTicket::new(f.branch_id, "teller").unwrap())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_no_show_frees_the_slot() {
    let f = fixture(1);
    let ticket = f
        .engine
        .issue_ticket(IssueTicket::new(f.branch_id, "teller").unwrap())
        .await
        .unwrap();

    f.engine
        .transition(TransitionTicket::new(ticket.id, TicketStatus::Called))
        .await
        .unwrap();
    f.engine
        .transition(TransitionTicket::new(ticket.id, TicketStatus::NoShow))
        .await
        .unwrap();

    assert_eq!(occupied(&f), 0);
    let final_ticket = f.engine.ticket(ticket.id).await.unwrap();
    assert_eq!(final_ticket.status, TicketStatus::NoShow);
    assert!(final_ticket.no_show_at.is_some());
}

#[tokio::test]
async fn test_terminal_ticket_rejects_further_transitions() {
    let f = fixture(2);
    let ticket = f
        .engine
        .issue_ticket(IssueTicket::new(f.branch_id, "teller").unwrap())
        .await
        .unwrap();
    f.engine
        .transition(TransitionTicket::new(ticket.id, TicketStatus::Cancelled))
        .await
        .unwrap();

    for target in [
        TicketStatus::Called,
        TicketStatus::Serving,
        TicketStatus::Completed,
    ] {
        let err = f
            .engine
            .transition(TransitionTicket::new(ticket.id, target))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::IllegalTransition { .. }));
    }
    // Repeated illegal attempts never double-release the slot.
    assert_eq!(occupied(&f), 0);
}

#[tokio::test]
async fn test_racing_cancellations_release_exactly_once() {
    let f = fixture(1);
    let ticket = f
        .engine
        .issue_ticket(IssueTicket::new(f.branch_id, "teller").unwrap())
        .await
        .unwrap();

    let a = f.engine.clone();
    let b = f.engine.clone();
    let id = ticket.id;
    let (first, second) = tokio::join!(
        tokio::spawn(
            async move { a.transition(TransitionTicket::new(id, TicketStatus::Cancelled)).await }
        ),
        tokio::spawn(
            async move { b.transition(TransitionTicket::new(id, TicketStatus::Cancelled)).await }
        ),
    );

    let results = [first.unwrap(), second.unwrap()];
    let wins = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1);
    assert_eq!(occupied(&f), 0);
}

#[tokio::test]
async fn test_transition_on_unknown_ticket() {
    let f = fixture(1);
    let missing = queueline_core::types::TicketId::new();
    let err = f
        .engine
        .transition(TransitionTicket::new(missing, TicketStatus::Called))
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::TicketNotFound(id) if id == missing));
}

// ============================================================================
// Transient Storage Failures
// ============================================================================

/// Delegating store that fails a configured number of admit or transition
/// calls with a transient error before the inner store is touched, the way
/// a storage unit that never committed would.
struct UnreliableStore {
    inner: Arc<InMemoryQueueStore>,
    failing_admits: AtomicU32,
    failing_transitions: AtomicU32,
}

impl UnreliableStore {
    fn trip(remaining: &AtomicU32) -> Result<(), StoreError> {
        let left = remaining.load(Ordering::SeqCst);
        if left > 0 {
            remaining.store(left - 1, Ordering::SeqCst);
            return Err(StoreError::Unavailable("injected outage".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TicketStore for UnreliableStore {
    async fn admit(
        &self,
        ticket: QueueTicket,
        created: QueueEvent,
    ) -> Result<AdmitOutcome, StoreError> {
        Self::trip(&self.failing_admits)?;
        self.inner.admit(ticket, created).await
    }

    async fn ticket(&self, ticket_id: TicketId) -> Result<Option<QueueTicket>, StoreError> {
        self.inner.ticket(ticket_id).await
    }

    async fn transition(
        &self,
        ticket_id: TicketId,
        expected: TicketStatus,
        target: TicketStatus,
        event: QueueEvent,
        release_slot: bool,
    ) -> Result<TransitionOutcome, StoreError> {
        Self::trip(&self.failing_transitions)?;
        self.inner
            .transition(ticket_id, expected, target, event, release_slot)
            .await
    }

    async fn list(&self, filter: &TicketFilter) -> Result<Vec<QueueTicket>, StoreError> {
        self.inner.list(filter).await
    }
}

fn unreliable_fixture(
    max_capacity: u32,
    failing_admits: u32,
    failing_transitions: u32,
) -> Fixture {
    let store = Arc::new(InMemoryQueueStore::new());
    let branch_id = BranchId::new();
    store.register_branch(BranchSnapshot {
        branch_id,
        max_capacity,
        occupied: 0,
        is_operational: true,
    });
    let unreliable = Arc::new(UnreliableStore {
        inner: store.clone(),
        failing_admits: AtomicU32::new(failing_admits),
        failing_transitions: AtomicU32::new(failing_transitions),
    });
    let engine = QueueEngine::new(
        unreliable,
        store.clone(),
        store.clone(),
        Arc::new(SteppingClock::new()),
    );
    Fixture {
        engine,
        store,
        branch_id,
    }
}

#[tokio::test]
async fn test_failed_issuance_leaves_no_trace() {
    let f = unreliable_fixture(1, 1, 0);

    let err = f
        .engine
        .issue_ticket(IssueTicket::new(f.branch_id, "teller").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::Storage(StoreError::Unavailable(_))));

    // Nothing committed: no slot held, no ticket row.
    let branch = f.engine.branch(f.branch_id).await.unwrap();
    assert_eq!(branch.occupied, 0);
    assert!(
        f.engine
            .list_tickets(&TicketFilter::for_branch(f.branch_id))
            .await
            .unwrap()
            .is_empty()
    );

    // The retry finds the slot still free.
    let ticket = f
        .engine
        .issue_ticket(IssueTicket::new(f.branch_id, "teller").unwrap())
        .await
        .unwrap();
    assert_eq!(ticket.status, TicketStatus::Waiting);
    assert_eq!(f.engine.branch(f.branch_id).await.unwrap().occupied, 1);
}

#[tokio::test]
async fn test_failed_terminal_transition_keeps_status_and_slot_together() {
    let f = unreliable_fixture(1, 0, 1);
    let ticket = f
        .engine
        .issue_ticket(IssueTicket::new(f.branch_id, "teller").unwrap())
        .await
        .unwrap();

    let err = f
        .engine
        .transition(TransitionTicket::new(ticket.id, TicketStatus::Cancelled))
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::Storage(StoreError::Unavailable(_))));

    // The swap and the release live in one unit, so neither happened: the
    // ticket is still waiting and still accounted for.
    let stored = f.engine.ticket(ticket.id).await.unwrap();
    assert_eq!(stored.status, TicketStatus::Waiting);
    assert!(stored.cancelled_at.is_none());
    assert_eq!(f.engine.branch(f.branch_id).await.unwrap().occupied, 1);

    // The retry applies cleanly and frees the slot exactly once.
    let cancelled = f
        .engine
        .transition(TransitionTicket::new(ticket.id, TicketStatus::Cancelled))
        .await
        .unwrap();
    assert_eq!(cancelled.status, TicketStatus::Cancelled);
    assert_eq!(f.engine.branch(f.branch_id).await.unwrap().occupied, 0);

    f.engine
        .issue_ticket(IssueTicket::new(f.branch_id, "teller").unwrap())
        .await
        .unwrap();
}

// ============================================================================
// Selection, Queries & Feed
// ============================================================================

#[tokio::test]
async fn test_next_ticket_prefers_priority_then_fifo() {
    let f = fixture(10);
    let walk_in = f
        .engine
        .issue_ticket(IssueTicket::new(f.branch_id, "teller").unwrap())
        .await
        .unwrap();
    let vip = f
        .engine
        .issue_ticket(
            IssueTicket::new(f.branch_id, "teller")
                .unwrap()
                .with_priority(Priority::new(9)),
        )
        .await
        .unwrap();

    let next = f.engine.next_ticket(f.branch_id, None).await.unwrap().unwrap();
    assert_eq!(next.id, vip.id);

    // Claiming the VIP ticket moves selection to the walk-in.
    f.engine
        .transition(TransitionTicket::new(vip.id, TicketStatus::Called))
        .await
        .unwrap();
    let next = f.engine.next_ticket(f.branch_id, None).await.unwrap().unwrap();
    assert_eq!(next.id, walk_in.id);
}

#[tokio::test]
async fn test_next_ticket_on_empty_queue_is_none() {
    let f = fixture(3);
    assert!(f.engine.next_ticket(f.branch_id, None).await.unwrap().is_none());
}

#[tokio::test]
async fn test_ticket_events_for_unknown_ticket() {
    let f = fixture(1);
    let missing = queueline_core::types::TicketId::new();
    let err = f.engine.ticket_events(missing).await.unwrap_err();
    assert!(matches!(err, QueueError::TicketNotFound(_)));
}

#[tokio::test]
async fn test_feed_publishes_issue_and_transition_notices() {
    let f = fixture(3);
    let mut feed = f.engine.subscribe();

    let ticket = f
        .engine
        .issue_ticket(IssueTicket::new(f.branch_id, "teller").unwrap())
        .await
        .unwrap();
    f.engine
        .transition(TransitionTicket::new(ticket.id, TicketStatus::Called))
        .await
        .unwrap();

    let created = feed.recv().await.unwrap();
    assert_eq!(created.event.event_type, EventType::Created);
    assert_eq!(created.ticket.id, ticket.id);

    let called = feed.recv().await.unwrap();
    assert_eq!(called.event.event_type, EventType::Called);
    assert_eq!(called.ticket.status, TicketStatus::Called);
}

#[tokio::test]
async fn test_analytics_after_mixed_lifecycle() {
    let f = fixture(10);
    let completed = f
        .engine
        .issue_ticket(IssueTicket::new(f.branch_id, "teller").unwrap())
        .await
        .unwrap();
    for target in [
        TicketStatus::Called,
        TicketStatus::Serving,
        TicketStatus::Completed,
    ] {
        f.engine
            .transition(TransitionTicket::new(completed.id, target))
            .await
            .unwrap();
    }
    f.engine
        .issue_ticket(IssueTicket::new(f.branch_id, "loans").unwrap())
        .await
        .unwrap();

    let report = f
        .engine
        .analytics(f.branch_id, &queueline_core::types::DateRange::unbounded())
        .await
        .unwrap();

    assert_eq!(report.total, 2);
    assert_eq!(report.by_status[&TicketStatus::Completed], 1);
    assert_eq!(report.by_status[&TicketStatus::Waiting], 1);
    assert_eq!(report.by_service_type["teller"], 1);
    assert_eq!(report.by_service_type["loans"], 1);
    // The stepping clock advances one minute per engine action.
    assert!(report.avg_wait_time > 0.0);
    assert!(report.avg_service_time > 0.0);
}

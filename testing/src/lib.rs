//! # Queueline Testing
//!
//! Testing utilities and fixtures for the Queueline engine.
//!
//! This crate provides:
//! - Deterministic clocks ([`mocks::FixedClock`], [`mocks::SteppingClock`])
//! - A fault-injecting storage wrapper ([`mocks::FlakyTicketStore`])
//! - Engine fixtures with a pre-registered branch ([`helpers`])
//!
//! ## Example
//!
//! ```
//! use queueline_testing::helpers::engine_with_branch;
//! use queueline_core::engine::IssueTicket;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let fixture = engine_with_branch(5);
//! let ticket = fixture
//!     .engine
//!     .issue_ticket(IssueTicket::new(fixture.branch_id, "teller").unwrap())
//!     .await
//!     .unwrap();
//! assert_eq!(ticket.branch_id, fixture.branch_id);
//! # }
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used)]

/// Mock implementations of the engine's environment and storage seams.
pub mod mocks {
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};
    use queueline_core::environment::Clock;
    use queueline_core::error::StoreError;
    use queueline_core::store::{AdmitOutcome, TicketStore, TransitionOutcome};
    use queueline_core::types::{QueueEvent, QueueTicket, TicketFilter, TicketId, TicketStatus};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

    /// Fixed clock for deterministic tests.
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use queueline_testing::mocks::FixedClock;
    /// use queueline_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2026-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded timestamp fails to parse, which should never
    /// happen in practice.
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Clock that advances by a fixed step on every `now()` call.
    ///
    /// Gives each engine action a distinct, strictly increasing timestamp,
    /// which makes wait and service durations assertable.
    #[derive(Debug)]
    pub struct SteppingClock {
        base: DateTime<Utc>,
        step: Duration,
        ticks: AtomicI64,
    }

    impl SteppingClock {
        /// Creates a clock starting at `base` and advancing `step` per call
        #[must_use]
        pub const fn new(base: DateTime<Utc>, step: Duration) -> Self {
            Self {
                base,
                step,
                ticks: AtomicI64::new(0),
            }
        }

        /// A stepping clock from the default test epoch, one minute per call
        #[must_use]
        pub fn minutes() -> Self {
            Self::new(test_clock().now(), Duration::minutes(1))
        }
    }

    impl Clock for SteppingClock {
        fn now(&self) -> DateTime<Utc> {
            let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
            self.base + self.step * i32::try_from(tick).unwrap_or(i32::MAX)
        }
    }

    /// Ticket store wrapper that fails the first `n` calls with a transient
    /// [`StoreError::Unavailable`], then delegates.
    ///
    /// A tripped call fails before the inner store is touched, which models
    /// a storage unit that never committed. Used to test retry paths
    /// without a real flaky backend.
    pub struct FlakyTicketStore {
        inner: Arc<dyn TicketStore>,
        remaining_failures: AtomicU32,
    }

    impl FlakyTicketStore {
        /// Wraps `inner`, failing the first `failures` store calls
        pub fn new(inner: Arc<dyn TicketStore>, failures: u32) -> Self {
            Self {
                inner,
                remaining_failures: AtomicU32::new(failures),
            }
        }

        fn trip(&self) -> Result<(), StoreError> {
            let remaining = self.remaining_failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.remaining_failures.store(remaining - 1, Ordering::SeqCst);
                return Err(StoreError::Unavailable(
                    "injected transient failure".to_string(),
                ));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl TicketStore for FlakyTicketStore {
        async fn admit(
            &self,
            ticket: QueueTicket,
            created: QueueEvent,
        ) -> Result<AdmitOutcome, StoreError> {
            self.trip()?;
            self.inner.admit(ticket, created).await
        }

        async fn ticket(&self, ticket_id: TicketId) -> Result<Option<QueueTicket>, StoreError> {
            self.trip()?;
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
            self.trip()?;
            self.inner
                .transition(ticket_id, expected, target, event, release_slot)
                .await
        }

        async fn list(&self, filter: &TicketFilter) -> Result<Vec<QueueTicket>, StoreError> {
            self.trip()?;
            self.inner.list(filter).await
        }
    }
}

/// Engine fixtures used across the integration suites.
pub mod helpers {
    use crate::mocks::SteppingClock;
    use queueline_core::engine::QueueEngine;
    use queueline_core::memory::InMemoryQueueStore;
    use queueline_core::types::{BranchId, BranchSnapshot};
    use std::sync::Arc;

    /// An engine wired over a shared in-memory store, with one operational
    /// branch already registered.
    pub struct EngineFixture {
        /// The engine under test
        pub engine: QueueEngine,
        /// Backing store, for direct snapshot assertions
        pub store: Arc<InMemoryQueueStore>,
        /// The pre-registered branch
        pub branch_id: BranchId,
    }

    /// Builds a fixture whose branch has the given capacity.
    ///
    /// The engine's clock advances one minute per action, so durations in
    /// analytics assertions are deterministic.
    #[must_use]
    pub fn engine_with_branch(max_capacity: u32) -> EngineFixture {
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
            Arc::new(SteppingClock::minutes()),
        );
        EngineFixture {
            engine,
            store,
            branch_id,
        }
    }
}

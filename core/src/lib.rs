//! Queue ticket lifecycle and branch capacity engine.
//!
//! `queueline-core` owns the domain of a branch queue-management platform:
//! issuing tickets against finite branch capacity, driving each ticket
//! through its lifecycle state machine, selecting the next ticket to serve,
//! and aggregating operational analytics.
//!
//! # Architecture
//!
//! - [`engine::QueueEngine`] is the facade every caller goes through
//! - [`capacity::CapacityGuard`] is the sole mutator of branch occupancy
//! - [`state_machine`] holds the static legal-transition table
//! - [`store`] defines the storage seams; [`memory::InMemoryQueueStore`]
//!   implements them in-process and `queueline-postgres` durably
//! - [`feed::TicketFeed`] broadcasts committed lifecycle events
//!
//! # Example
//!
//! ```
//! use queueline_core::engine::{IssueTicket, QueueEngine, TransitionTicket};
//! use queueline_core::environment::SystemClock;
//! use queueline_core::memory::InMemoryQueueStore;
//! use queueline_core::types::{BranchId, BranchSnapshot, TicketStatus};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), queueline_core::error::QueueError> {
//! let store = Arc::new(InMemoryQueueStore::new());
//! let branch_id = BranchId::new();
//! store.register_branch(BranchSnapshot {
//!     branch_id,
//!     max_capacity: 10,
//!     occupied: 0,
//!     is_operational: true,
//! });
//!
//! let engine = QueueEngine::new(
//!     store.clone(),
//!     store.clone(),
//!     store,
//!     Arc::new(SystemClock),
//! );
//!
//! let ticket = engine
//!     .issue_ticket(IssueTicket::new(branch_id, "teller")?)
//!     .await?;
//! assert_eq!(ticket.status, TicketStatus::Waiting);
//!
//! let called = engine
//!     .transition(TransitionTicket::new(ticket.id, TicketStatus::Called))
//!     .await?;
//! assert_eq!(called.status, TicketStatus::Called);
//! # Ok(())
//! # }
//! ```

pub mod analytics;
pub mod capacity;
pub mod engine;
pub mod environment;
pub mod error;
pub mod feed;
pub mod memory;
pub mod selector;
pub mod state_machine;
pub mod store;
pub mod types;

pub use analytics::TicketAnalytics;
pub use engine::{IssueTicket, QueueEngine, TransitionTicket};
pub use error::{QueueError, StoreError};
pub use feed::TicketNotice;
pub use types::{
    BranchId, BranchSnapshot, DateRange, EventId, EventType, Priority, QueueEvent, QueueTicket,
    ServiceType, StaffId, TicketFilter, TicketId, TicketStatus,
};

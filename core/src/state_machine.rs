//! The ticket lifecycle state machine.
//!
//! The transition graph is a single static table consulted through
//! [`is_legal`], so the machine is auditable and exhaustively testable:
//! there are no scattered conditionals encoding edges elsewhere.
//!
//! ```text
//! WAITING ──► CALLED ──► SERVING ──► COMPLETED
//!    │           │           │
//!    ▼           ▼           ▼
//! CANCELLED   NO_SHOW    CANCELLED
//! ```
//!
//! `COMPLETED`, `CANCELLED` and `NO_SHOW` are terminal. `WAITING` has no
//! inbound edges: a ticket never re-enters the queue.

use crate::types::TicketStatus;

/// Legal successor states of `status`. Empty for terminal states.
#[must_use]
pub const fn successors(status: TicketStatus) -> &'static [TicketStatus] {
    match status {
        TicketStatus::Waiting => &[TicketStatus::Called, TicketStatus::Cancelled],
        TicketStatus::Called => &[TicketStatus::Serving, TicketStatus::NoShow],
        TicketStatus::Serving => &[TicketStatus::Completed, TicketStatus::Cancelled],
        TicketStatus::Completed | TicketStatus::Cancelled | TicketStatus::NoShow => &[],
    }
}

/// Whether `from -> to` is an edge of the lifecycle graph.
///
/// Re-entering the current status and leaving a terminal status are both
/// illegal, which this lookup covers without special cases.
#[must_use]
pub fn is_legal(from: TicketStatus, to: TicketStatus) -> bool {
    successors(from).contains(&to)
}

/// Whether `status` has no outgoing edges.
#[must_use]
pub const fn is_terminal(status: TicketStatus) -> bool {
    successors(status).is_empty()
}

/// Whether a ticket in `status` counts against branch capacity.
#[must_use]
pub const fn is_occupying(status: TicketStatus) -> bool {
    matches!(
        status,
        TicketStatus::Waiting | TicketStatus::Called | TicketStatus::Serving
    )
}

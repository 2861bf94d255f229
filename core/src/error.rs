//! Error taxonomy for the queue engine.
//!
//! Expected conditions (queue full, illegal transition) are values, not
//! panics: callers are forced to handle the conflict case. Each error maps to
//! exactly one [`ErrorKind`], which drives both HTTP status mapping and the
//! retryable-vs-fatal classification surfaced to the boundary.

use crate::types::{BranchId, TicketId, TicketStatus};
use thiserror::Error;

/// Errors surfaced by storage backends.
#[derive(Clone, Debug, Error)]
pub enum StoreError {
    /// Transient failure (lock contention, connection loss, timeout).
    /// Safe to retry at the call site a bounded number of times.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// The backend returned data that violates a storage invariant
    /// (duplicate identifiers, undecodable rows). Never retried.
    #[error("storage corrupted: {0}")]
    Corrupted(String),
}

impl StoreError {
    /// Whether retrying the same call can succeed
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Coarse classification of a [`QueueError`], per the error-handling design.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input, rejected before touching storage
    Validation,
    /// The referenced branch/ticket does not exist or cannot accept work
    Precondition,
    /// Expected, caller-recoverable contention (queue full, lost race)
    Conflict,
    /// A broken invariant; fatal, never silently corrected
    Consistency,
    /// Transient storage failure; retryable at the boundary
    Transient,
}

/// Errors returned by the queue engine's public operations.
#[derive(Clone, Debug, Error)]
pub enum QueueError {
    /// Missing or malformed required fields
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The branch is unknown to the branch directory
    #[error("branch {0} not found")]
    BranchNotFound(BranchId),

    /// The branch exists but is not accepting tickets
    #[error("branch {0} is not operational")]
    BranchNotOperational(BranchId),

    /// The branch is at its occupancy ceiling
    #[error("branch {0} is at capacity")]
    CapacityExceeded(BranchId),

    /// The ticket does not exist
    #[error("ticket {0} not found")]
    TicketNotFound(TicketId),

    /// The requested status is not a legal successor of the current one
    #[error("ticket {ticket_id}: illegal transition {from} -> {to}")]
    IllegalTransition {
        /// Ticket being transitioned
        ticket_id: TicketId,
        /// Status the ticket was observed in
        from: TicketStatus,
        /// Requested target status
        to: TicketStatus,
    },

    /// The occupancy counter would leave its `0..=max_capacity` envelope
    /// outside the guarded paths. Indicates a broken invariant.
    #[error("capacity accounting violated: {0}")]
    ConsistencyViolation(String),

    /// Underlying storage failed
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl QueueError {
    /// The taxonomy bucket this error belongs to
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::Validation,
            Self::BranchNotFound(_) | Self::BranchNotOperational(_) | Self::TicketNotFound(_) => {
                ErrorKind::Precondition
            }
            Self::CapacityExceeded(_) | Self::IllegalTransition { .. } => ErrorKind::Conflict,
            Self::ConsistencyViolation(_) | Self::Storage(StoreError::Corrupted(_)) => {
                ErrorKind::Consistency
            }
            Self::Storage(StoreError::Unavailable(_)) => ErrorKind::Transient,
        }
    }

    /// Whether the boundary may retry the operation unchanged
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transient)
    }
}

//! Domain types for the queue engine.
//!
//! This module contains the value objects and entities shared by every
//! component: identifiers, the ticket and event records, branch capacity
//! snapshots, and the query filter types.

use crate::error::QueueError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a branch
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BranchId(Uuid);

impl BranchId {
    /// Creates a new random `BranchId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `BranchId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BranchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a queue ticket
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TicketId(Uuid);

impl TicketId {
    /// Creates a new random `TicketId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `TicketId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TicketId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a lifecycle event
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random `EventId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `EventId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a staff member acting on a ticket
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StaffId(Uuid);

impl StaffId {
    /// Creates a new random `StaffId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `StaffId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for StaffId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StaffId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Value Objects
// ============================================================================

/// Service type identifying a queue partition within a branch.
///
/// Always non-empty; construction validates the raw string so that malformed
/// input is rejected before it reaches the engine or storage.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceType(String);

impl ServiceType {
    /// Creates a `ServiceType`, rejecting empty or whitespace-only input.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidInput`] when the string has no visible
    /// characters.
    pub fn new(raw: impl Into<String>) -> Result<Self, QueueError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(QueueError::InvalidInput(
                "service_type must not be empty".to_string(),
            ));
        }
        Ok(Self(raw))
    }

    /// The raw service type string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ServiceType {
    type Error = QueueError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl From<ServiceType> for String {
    fn from(service_type: ServiceType) -> Self {
        service_type.0
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ticket priority. Higher values are served first; `Priority::LOWEST` (0)
/// is the default for walk-in customers.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Priority(u8);

impl Priority {
    /// The default, lowest priority band
    pub const LOWEST: Self = Self(0);

    /// Creates a priority from a raw level
    #[must_use]
    pub const fn new(level: u8) -> Self {
        Self(level)
    }

    /// The raw priority level
    #[must_use]
    pub const fn level(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Ticket Status & Event Type
// ============================================================================

/// Lifecycle status of a queue ticket.
///
/// The legal transition graph lives in [`crate::state_machine`]; this type
/// only names the states and their wire representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    /// In the queue, waiting to be called
    Waiting,
    /// Called to a counter, customer en route
    Called,
    /// Currently being served
    Serving,
    /// Service finished normally (terminal)
    Completed,
    /// Withdrawn by the customer or staff (terminal)
    Cancelled,
    /// Called but never showed up (terminal)
    NoShow,
}

impl TicketStatus {
    /// Wire representation, matching the serde encoding
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "WAITING",
            Self::Called => "CALLED",
            Self::Serving => "SERVING",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
            Self::NoShow => "NO_SHOW",
        }
    }

    /// All statuses, in lifecycle order
    pub const ALL: [Self; 6] = [
        Self::Waiting,
        Self::Called,
        Self::Serving,
        Self::Completed,
        Self::Cancelled,
        Self::NoShow,
    ];
}

impl FromStr for TicketStatus {
    type Err = QueueError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "WAITING" => Ok(Self::Waiting),
            "CALLED" => Ok(Self::Called),
            "SERVING" => Ok(Self::Serving),
            "COMPLETED" => Ok(Self::Completed),
            "CANCELLED" => Ok(Self::Cancelled),
            "NO_SHOW" => Ok(Self::NoShow),
            other => Err(QueueError::InvalidInput(format!(
                "unknown ticket status '{other}'"
            ))),
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Type of a lifecycle event: `Created` plus one per target status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// Ticket issued into the queue
    Created,
    /// Ticket called to a counter
    Called,
    /// Service started
    Serving,
    /// Service finished
    Completed,
    /// Ticket cancelled
    Cancelled,
    /// Customer never showed up
    NoShow,
}

impl EventType {
    /// The event type recorded when a ticket enters `status`.
    ///
    /// `Waiting` maps to `Created`: the only way into the queue is issuance.
    #[must_use]
    pub const fn for_status(status: TicketStatus) -> Self {
        match status {
            TicketStatus::Waiting => Self::Created,
            TicketStatus::Called => Self::Called,
            TicketStatus::Serving => Self::Serving,
            TicketStatus::Completed => Self::Completed,
            TicketStatus::Cancelled => Self::Cancelled,
            TicketStatus::NoShow => Self::NoShow,
        }
    }

    /// Wire representation, matching the serde encoding
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Called => "CALLED",
            Self::Serving => "SERVING",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
            Self::NoShow => "NO_SHOW",
        }
    }
}

impl FromStr for EventType {
    type Err = QueueError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "CREATED" => Ok(Self::Created),
            "CALLED" => Ok(Self::Called),
            "SERVING" => Ok(Self::Serving),
            "COMPLETED" => Ok(Self::Completed),
            "CANCELLED" => Ok(Self::Cancelled),
            "NO_SHOW" => Ok(Self::NoShow),
            other => Err(QueueError::InvalidInput(format!(
                "unknown event type '{other}'"
            ))),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Entities
// ============================================================================

/// A queue ticket.
///
/// Identity, queue partition, contact details and `issued_at` are immutable
/// after creation. `status` is mutated only through the state machine, and
/// each `*_at` timestamp is written exactly once, the first time the ticket
/// enters the corresponding state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueTicket {
    /// Ticket identifier
    pub id: TicketId,
    /// Branch whose capacity this ticket counts against
    pub branch_id: BranchId,
    /// Queue partition within the branch
    pub service_type: ServiceType,
    /// Optional customer name
    pub customer_name: Option<String>,
    /// Optional customer phone
    pub customer_phone: Option<String>,
    /// Optional customer email
    pub customer_email: Option<String>,
    /// Priority band; higher serves first
    pub priority: Priority,
    /// Current lifecycle status
    pub status: TicketStatus,
    /// When the ticket was issued
    pub issued_at: DateTime<Utc>,
    /// First time the ticket was called
    pub called_at: Option<DateTime<Utc>>,
    /// First time service started
    pub served_at: Option<DateTime<Utc>>,
    /// When service completed
    pub completed_at: Option<DateTime<Utc>>,
    /// When the ticket was cancelled
    pub cancelled_at: Option<DateTime<Utc>>,
    /// When the ticket was marked a no-show
    pub no_show_at: Option<DateTime<Utc>>,
}

impl QueueTicket {
    /// Applies a status change, stamping the matching `*_at` timestamp.
    ///
    /// Timestamps are first-write-only: an already-set timestamp is never
    /// overwritten. Legality of the transition is the state machine's
    /// concern, not this method's; storage backends call this after the
    /// compare-and-swap on the expected status has succeeded.
    pub fn apply_transition(&mut self, target: TicketStatus, at: DateTime<Utc>) {
        self.status = target;
        let slot = match target {
            TicketStatus::Waiting => return,
            TicketStatus::Called => &mut self.called_at,
            TicketStatus::Serving => &mut self.served_at,
            TicketStatus::Completed => &mut self.completed_at,
            TicketStatus::Cancelled => &mut self.cancelled_at,
            TicketStatus::NoShow => &mut self.no_show_at,
        };
        slot.get_or_insert(at);
    }
}

/// An append-only lifecycle event.
///
/// One ticket has many events, ordered by `event_time`. The event stream is
/// the audit source of truth and is never mutated or deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEvent {
    /// Event identifier
    pub id: EventId,
    /// Ticket this event belongs to
    pub ticket_id: TicketId,
    /// What happened
    pub event_type: EventType,
    /// When it happened
    pub event_time: DateTime<Utc>,
    /// Staff member who acted, when applicable
    pub staff_id: Option<StaffId>,
    /// Free-form operator notes
    pub notes: Option<String>,
}

impl QueueEvent {
    /// Creates an event with a fresh identifier and no staff/notes
    #[must_use]
    pub fn new(ticket_id: TicketId, event_type: EventType, event_time: DateTime<Utc>) -> Self {
        Self {
            id: EventId::new(),
            ticket_id,
            event_type,
            event_time,
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

/// Point-in-time view of a branch capacity record.
///
/// Owned by the Branch collaborator; the engine reads it through
/// [`crate::store::BranchDirectory`] and mutates `occupied` only through
/// [`crate::capacity::CapacityGuard`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchSnapshot {
    /// Branch identifier
    pub branch_id: BranchId,
    /// Operator-configured occupancy ceiling (always positive)
    pub max_capacity: u32,
    /// Tickets currently in an occupying state
    pub occupied: u32,
    /// Whether the branch is accepting tickets
    pub is_operational: bool,
}

impl BranchSnapshot {
    /// Remaining capacity at this snapshot
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.max_capacity.saturating_sub(self.occupied)
    }
}

// ============================================================================
// Query Types
// ============================================================================

/// Optional closed-open time window, applied to ticket `issued_at`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Inclusive lower bound
    pub start: Option<DateTime<Utc>>,
    /// Exclusive upper bound
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    /// The unbounded range
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    /// A range between two optional bounds
    #[must_use]
    pub const fn between(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    /// Whether `at` falls inside the range
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        if let Some(start) = self.start {
            if at < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if at >= end {
                return false;
            }
        }
        true
    }
}

/// Filter for ticket list queries.
#[derive(Clone, Debug, Default)]
pub struct TicketFilter {
    /// Branch to query (required)
    pub branch_id: Option<BranchId>,
    /// Restrict to a single status
    pub status: Option<TicketStatus>,
    /// Restrict to a queue partition
    pub service_type: Option<ServiceType>,
    /// Restrict by `issued_at`
    pub range: DateRange,
}

impl TicketFilter {
    /// Filter scoped to one branch
    #[must_use]
    pub fn for_branch(branch_id: BranchId) -> Self {
        Self {
            branch_id: Some(branch_id),
            ..Self::default()
        }
    }

    /// Restricts the filter to a status
    #[must_use]
    pub const fn with_status(mut self, status: TicketStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Restricts the filter to a service type
    #[must_use]
    pub fn with_service_type(mut self, service_type: ServiceType) -> Self {
        self.service_type = Some(service_type);
        self
    }

    /// Restricts the filter by issue time
    #[must_use]
    pub const fn with_range(mut self, range: DateRange) -> Self {
        self.range = range;
        self
    }

    /// Whether `ticket` passes every clause of the filter
    #[must_use]
    pub fn matches(&self, ticket: &QueueTicket) -> bool {
        if let Some(branch_id) = self.branch_id {
            if ticket.branch_id != branch_id {
                return false;
            }
        }
        if let Some(status) = self.status {
            if ticket.status != status {
                return false;
            }
        }
        if let Some(service_type) = &self.service_type {
            if &ticket.service_type != service_type {
                return false;
            }
        }
        self.range.contains(ticket.issued_at)
    }
}

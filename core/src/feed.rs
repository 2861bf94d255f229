//! Outbound lifecycle event stream.
//!
//! Every committed transition is published as a [`TicketNotice`] on a
//! broadcast channel so the notification and crowd-analytics services can
//! subscribe. The engine never blocks on subscribers and does not depend on
//! their availability: publishing to zero receivers is a no-op, and a slow
//! receiver observes a `Lagged` gap rather than exerting backpressure.

use crate::types::{QueueEvent, QueueTicket};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// A committed lifecycle event, paired with the ticket snapshot it produced.
///
/// Carrying the full ticket spares subscribers (notification dispatch needs
/// the contact fields) a read back into the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketNotice {
    /// Ticket state after the event was applied
    pub ticket: QueueTicket,
    /// The event that was committed
    pub event: QueueEvent,
}

/// Broadcast fan-out of committed lifecycle events.
#[derive(Clone, Debug)]
pub struct TicketFeed {
    sender: broadcast::Sender<TicketNotice>,
}

impl TicketFeed {
    /// Default per-subscriber buffer before a lagging receiver loses events
    pub const DEFAULT_CAPACITY: usize = 256;

    /// Creates a feed with the given per-subscriber buffer capacity
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribes to all notices published after this call
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TicketNotice> {
        self.sender.subscribe()
    }

    /// Publishes a notice. Never blocks; absent subscribers are fine.
    pub fn publish(&self, notice: TicketNotice) {
        // Err here only means there are currently no receivers.
        let _ = self.sender.send(notice);
    }
}

impl Default for TicketFeed {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

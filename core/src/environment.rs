//! Injected dependencies for the engine.
//!
//! Time is the only ambient dependency the core needs; it is injected through
//! the [`Clock`] trait so that tests can run against deterministic clocks
//! (see `queueline-testing`).

use chrono::{DateTime, Utc};

/// Clock abstraction for testable time
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock reading the system time
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

//! Shared application state for the HTTP layer.

use crate::retry::RetryPolicy;
use queueline_core::engine::QueueEngine;

/// State handed to every handler via Axum's `State` extractor.
///
/// Cheap to clone: the engine holds `Arc`s to the storage seams and the
/// retry policy is a small value type.
#[derive(Clone)]
pub struct AppState {
    /// The queue engine every request goes through
    pub engine: QueueEngine,
    /// Backoff policy applied to transient storage failures
    pub retry: RetryPolicy,
}

impl AppState {
    /// Creates state with the default retry policy
    #[must_use]
    pub fn new(engine: QueueEngine) -> Self {
        Self {
            engine,
            retry: RetryPolicy::default(),
        }
    }

    /// Overrides the retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

//! Axum HTTP surface for the Queueline engine.
//!
//! Thin imperative shell over `queueline-core`: handlers parse and validate
//! the wire shapes, dispatch through [`QueueEngine`], and map domain errors
//! to HTTP statuses via [`AppError`]. No queue semantics live here.
//!
//! # Request Flow
//!
//! 1. **HTTP request** arrives at an Axum handler
//! 2. **Parse** path, query and JSON body into validated domain inputs
//! 3. **Dispatch** through the engine (with transient-failure retry)
//! 4. **Map** the result to a response DTO, or the error to a status code
//!
//! # Example
//!
//! ```
//! use queueline_core::engine::QueueEngine;
//! use queueline_core::environment::SystemClock;
//! use queueline_core::memory::InMemoryQueueStore;
//! use queueline_web::{build_router, AppState};
//! use std::sync::Arc;
//!
//! let store = Arc::new(InMemoryQueueStore::new());
//! let engine = QueueEngine::new(
//!     store.clone(),
//!     store.clone(),
//!     store,
//!     Arc::new(SystemClock),
//! );
//! let app = build_router(AppState::new(engine));
//! # let _ = app;
//! ```

pub mod api;
pub mod error;
pub mod metrics;
pub mod retry;
pub mod state;

pub use error::AppError;
pub use state::AppState;

use axum::{
    Router,
    routing::{get, patch, post},
};
use tower_http::trace::TraceLayer;

/// Builds the service router with all ticket routes and request tracing.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::health::health_check))
        .route("/tickets", post(api::tickets::issue_ticket))
        .route("/tickets/:id", get(api::tickets::get_ticket))
        .route("/tickets/:id/events", get(api::tickets::get_ticket_events))
        .route(
            "/tickets/:id/status",
            patch(api::tickets::update_ticket_status),
        )
        .route(
            "/tickets/branch/:branch_id",
            get(api::tickets::list_branch_tickets),
        )
        .route("/tickets/next/:branch_id", get(api::tickets::next_ticket))
        .route(
            "/tickets/analytics/:branch_id",
            get(api::tickets::branch_analytics),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

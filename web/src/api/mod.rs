//! HTTP API handlers.

pub mod health;
pub mod tickets;

//! HTTP layer for Concierge.
//!
//! Axum-based fulfillment endpoint the bot calls for booking requests, plus
//! a health probe.

pub mod error;
pub mod handlers;
pub mod router;

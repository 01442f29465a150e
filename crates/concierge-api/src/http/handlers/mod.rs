//! Route handlers.

pub mod fulfillment;

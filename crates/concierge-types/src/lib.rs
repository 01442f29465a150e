//! Shared domain types for Concierge.
//!
//! This crate contains the types shared across the Concierge workspace:
//! Units and Resources, dialog definitions (Locale, Intent, Version, Alias),
//! fulfillment wire types, deployment configuration, events, and errors.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod dialog;
pub mod error;
pub mod event;
pub mod fulfillment;
pub mod resource;
pub mod unit;

//! Planning, orchestration, and unit builders for Concierge.
//!
//! This crate defines the `ProvisioningBackend` port that the infrastructure
//! layer implements. It depends on `concierge-types` and the span names in
//! `concierge-observe` -- never on `concierge-infra` or any cloud SDK.

pub mod bot;
pub mod event;
pub mod fulfillment;
pub mod knowledge;
pub mod policy;
pub mod provision;
pub mod topology;

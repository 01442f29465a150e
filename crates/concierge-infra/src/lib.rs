//! Infrastructure layer for Concierge.
//!
//! Contains the adapters behind the ports defined in `concierge-core`: the
//! deterministic in-memory provisioning backend, the template synthesizer,
//! and the deployment configuration loader.

pub mod backend;
pub mod config;
pub mod synth;

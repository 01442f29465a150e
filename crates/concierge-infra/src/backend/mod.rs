//! Provisioning backend adapters.

pub mod memory;

pub use memory::{BuildRecord, InMemoryBackend};

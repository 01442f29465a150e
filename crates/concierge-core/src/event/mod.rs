//! Event bus for deployment progress.
//!
//! Provides an `EventBus` that distributes `DeploymentEvent` messages to all
//! subscribers via a `tokio::sync::broadcast` channel.

pub mod bus;

pub use bus::EventBus;

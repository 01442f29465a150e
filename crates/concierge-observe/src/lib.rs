//! Observability for Concierge: subscriber setup with optional
//! OpenTelemetry export, and the span field names shared by every crate.

pub mod attrs;
pub mod tracing_setup;

//! Structured field names used in deployment spans and events.
//!
//! All constants are string slices usable as field names in `tracing` spans
//! and as attribute keys once spans are bridged to OpenTelemetry.
//!
//! Span naming: `deploy` wraps one orchestrator run, `build_unit` wraps one
//! Unit inside it.

/// Span opened once per orchestrator run.
pub const SPAN_DEPLOY: &str = "deploy";

/// Span opened once per Unit build.
pub const SPAN_BUILD_UNIT: &str = "build_unit";

// --- Identity fields ---

/// UUID v7 of the deployment run.
pub const DEPLOYMENT_ID: &str = "deployment_id";

/// Unit identifier (e.g., "HotelBedrockKBStack").
pub const UNIT_ID: &str = "unit_id";

/// Logical id of a Resource within its Unit.
pub const RESOURCE_ID: &str = "resource_id";

/// Template type of a Resource (e.g., "AWS::Bedrock::KnowledgeBase").
pub const RESOURCE_KIND: &str = "resource_kind";

// --- Measurements ---

/// Name of the provisioning backend in use.
pub const BACKEND: &str = "backend";

pub const DURATION_MS: &str = "duration_ms";

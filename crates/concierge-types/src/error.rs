use thiserror::Error;

use crate::unit::UnitId;

fn format_cycle(cycle: &[UnitId]) -> String {
    cycle
        .iter()
        .map(UnitId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Errors raised by the provisioning backend (the external collaborator).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    #[error("external resource '{name}' does not exist")]
    MissingExternalResource { name: String },

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Errors related to planning and building Units.
///
/// Graph-shape variants (`CyclicDependency`, `MissingRequiredInput`,
/// `UnresolvedReferenceOrdering`, `IntraUnitOrdering`, `Duplicate*`,
/// `UnknownDependency`) are raised before any Resource is built.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProvisionError {
    #[error("cyclic dependency between units: {}", format_cycle(.cycle))]
    CyclicDependency { cycle: Vec<UnitId> },

    #[error("unit '{unit}' is missing required input '{input}'")]
    MissingRequiredInput { unit: UnitId, input: String },

    #[error("unit '{consumer}' references '{producer}:{output}' but no such edge can exist")]
    UnresolvedReferenceOrdering {
        consumer: UnitId,
        producer: UnitId,
        output: String,
    },

    #[error("resource '{resource}' in unit '{unit}' reads '{target}' before it is built")]
    IntraUnitOrdering {
        unit: UnitId,
        resource: String,
        target: String,
    },

    #[error("unit '{0}' is declared more than once")]
    DuplicateUnit(UnitId),

    #[error("unit '{unit}' declares resource '{resource}' more than once")]
    DuplicateResource { unit: UnitId, resource: String },

    #[error("unit '{unit}' depends on unknown unit '{dependency}'")]
    UnknownDependency { unit: UnitId, dependency: UnitId },

    #[error("resource '{resource}' in unit '{unit}' failed to build: {cause}")]
    ResourceBuildFailure {
        unit: UnitId,
        resource: String,
        #[source]
        cause: BackendError,
    },

    #[error("resource '{resource}' in unit '{unit}' imports '{name}', which does not exist")]
    MissingExternalResource {
        unit: UnitId,
        resource: String,
        name: String,
    },

    #[error("unit '{unit}' was skipped because dependency '{dependency}' did not build")]
    DependencyFailed { unit: UnitId, dependency: UnitId },

    #[error("outputs of unit '{0}' were already published")]
    OutputsAlreadyPublished(UnitId),

    #[error("deployment cancelled before unit '{0}' started")]
    Cancelled(UnitId),

    #[error("invalid property in resource '{resource}' of unit '{unit}': {message}")]
    InvalidProperty {
        unit: UnitId,
        resource: String,
        message: String,
    },

    #[error("invalid dialog definition in unit '{unit}': {cause}")]
    InvalidDialog {
        unit: UnitId,
        #[source]
        cause: DialogError,
    },
}

/// Errors related to dialog definitions, versions, and aliases.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DialogError {
    #[error("intent '{intent}' already exists in locale '{locale}'")]
    DuplicateIntent { locale: String, intent: String },

    #[error("confidence threshold {0} is outside [0, 1]")]
    InvalidConfidenceThreshold(f64),

    #[error("version {0} does not exist")]
    UnknownVersion(u32),

    #[error("locale '{0}' has no intents")]
    EmptyLocale(String),
}

/// Errors from loading deployment configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(String),
}

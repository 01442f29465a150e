//! ProvisioningBackend trait definition.
//!
//! The backend is the external collaborator that actually creates cloud
//! resources. The orchestrator hands it one fully resolved Resource at a time
//! and awaits the reported attributes before moving on.

use concierge_types::error::BackendError;
use concierge_types::resource::{Attributes, ResourceKind};
use concierge_types::unit::UnitId;

/// One resolved build call.
///
/// `properties` contains no unresolved references: every input and
/// intra-unit attribute has already been substituted.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildRequest {
    pub unit: UnitId,
    pub logical_id: String,
    pub kind: ResourceKind,
    pub properties: serde_json::Value,
}

/// Trait for provisioning backends.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition). Implementations
/// must converge: building the same request twice yields the same attributes.
/// Imports of unknown external resources fail with
/// [`BackendError::MissingExternalResource`].
///
/// Implementations live in concierge-infra (e.g., `InMemoryBackend`).
pub trait ProvisioningBackend: Send + Sync {
    /// Human-readable backend name for logs.
    fn name(&self) -> &str;

    /// Create or converge one resource and report its attributes.
    fn build_resource(
        &self,
        request: &BuildRequest,
    ) -> impl std::future::Future<Output = Result<Attributes, BackendError>> + Send;
}

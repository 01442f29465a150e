//! Event types for the deployment event bus.
//!
//! `DeploymentEvent` is broadcast while the orchestrator runs. All variants are
//! Clone + Send + Sync for use with tokio broadcast channels.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::resource::ResourceKind;
use crate::unit::{UnitId, UnitState};

/// Events emitted during a deployment run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeploymentEvent {
    /// A unit left `Declared` and started resolving its inputs.
    UnitStarted { deployment_id: Uuid, unit: UnitId },

    /// One resource finished building.
    ResourceBuilt {
        deployment_id: Uuid,
        unit: UnitId,
        resource: String,
        kind: ResourceKind,
        duration_ms: u64,
    },

    /// Every resource built and the unit's outputs are published.
    UnitBuilt {
        deployment_id: Uuid,
        unit: UnitId,
        outputs: Vec<String>,
    },

    UnitFailed {
        deployment_id: Uuid,
        unit: UnitId,
        resource: Option<String>,
        error: String,
    },

    /// The unit never started (failed dependency or cancellation).
    UnitSkipped {
        deployment_id: Uuid,
        unit: UnitId,
        reason: String,
    },

    DeploymentFinished {
        deployment_id: Uuid,
        states: Vec<(UnitId, UnitState)>,
    },
}

impl DeploymentEvent {
    pub fn deployment_id(&self) -> Uuid {
        match self {
            DeploymentEvent::UnitStarted { deployment_id, .. }
            | DeploymentEvent::ResourceBuilt { deployment_id, .. }
            | DeploymentEvent::UnitBuilt { deployment_id, .. }
            | DeploymentEvent::UnitFailed { deployment_id, .. }
            | DeploymentEvent::UnitSkipped { deployment_id, .. }
            | DeploymentEvent::DeploymentFinished { deployment_id, .. } => *deployment_id,
        }
    }
}

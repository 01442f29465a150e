//! Deployment report returned by the orchestrator.

use chrono::{DateTime, Utc};
use concierge_types::error::ProvisionError;
use concierge_types::resource::BuiltResource;
use concierge_types::unit::{OutputMap, UnitId, UnitState};
use serde::{Serialize, Serializer};
use uuid::Uuid;

fn serialize_error<S: Serializer>(error: &Option<ProvisionError>, s: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => s.serialize_some(&e.to_string()),
        None => s.serialize_none(),
    }
}

/// Final state of one Unit after a run.
#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub unit: UnitId,
    pub state: UnitState,
    /// Published outputs; empty unless `state` is `Built`.
    pub outputs: OutputMap,
    /// Resources that finished building, in build order.
    pub resources: Vec<BuiltResource>,
    #[serde(serialize_with = "serialize_error", skip_serializing_if = "Option::is_none")]
    pub error: Option<ProvisionError>,
}

impl UnitReport {
    pub fn resource(&self, logical_id: &str) -> Option<&BuiltResource> {
        self.resources.iter().find(|r| r.logical_id == logical_id)
    }
}

/// Outcome of one orchestrator run, with Units in build order.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentReport {
    pub deployment_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub order: Vec<UnitId>,
    pub units: Vec<UnitReport>,
}

impl DeploymentReport {
    pub fn unit(&self, id: &str) -> Option<&UnitReport> {
        self.units.iter().find(|u| u.unit.as_str() == id)
    }

    pub fn is_success(&self) -> bool {
        self.units.iter().all(|u| u.state == UnitState::Built)
    }

    /// Total number of Resources built across all Units.
    pub fn resources_built(&self) -> usize {
        self.units.iter().map(|u| u.resources.len()).sum()
    }

    /// The first fatal error in build order.
    ///
    /// A `Failed` Unit's cause wins over the skip reasons it produced
    /// downstream.
    pub fn first_failure(&self) -> Option<&ProvisionError> {
        self.units
            .iter()
            .filter(|u| u.state == UnitState::Failed)
            .chain(self.units.iter().filter(|u| u.state == UnitState::Skipped))
            .find_map(|u| u.error.as_ref())
    }

    pub fn into_result(self) -> Result<Self, ProvisionError> {
        match self.first_failure() {
            Some(err) => Err(err.clone()),
            None => Ok(self),
        }
    }
}

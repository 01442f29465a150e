//! Provisioning: Unit graph planning, property resolution, and the
//! orchestrator that builds Units against a [`backend::ProvisioningBackend`].

pub mod backend;
pub mod graph;
pub mod ledger;
pub mod orchestrator;
pub mod report;
pub mod resolve;

pub use backend::{BuildRequest, ProvisioningBackend};
pub use graph::{BuildPlan, EdgeOrigin, PlanEdge, UnitGraph};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use report::{DeploymentReport, UnitReport};

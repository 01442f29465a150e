//! Deployment orchestrator: builds a [`UnitGraph`] against a backend.
//!
//! The orchestrator plans first, so every graph-shape error surfaces before
//! any Resource is built. It then walks the plan wave by wave. Each Unit:
//!
//! 1. Is skipped if the run was cancelled or any direct dependency did not
//!    reach `Built`.
//! 2. Resolves its inputs from producer outputs in the ledger.
//! 3. Builds its Resources in declaration order, feeding reported attributes
//!    to later Resources.
//! 4. Resolves and publishes its exports (write-once).
//!
//! By default waves run one Unit at a time in plan order. With
//! `concurrent_waves` enabled, Units within a wave run as `JoinSet` tasks.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use concierge_observe::attrs;
use concierge_types::error::{BackendError, ProvisionError};
use concierge_types::event::DeploymentEvent;
use concierge_types::resource::{Attributes, BuiltResource};
use concierge_types::unit::{OutputMap, Unit, UnitId, UnitState};
use serde_json::Value;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::event::bus::EventBus;

use super::backend::{BuildRequest, ProvisioningBackend};
use super::graph::UnitGraph;
use super::ledger::UnitLedger;
use super::report::{DeploymentReport, UnitReport};
use super::resolve::ResolutionScope;

/// Runtime knobs for the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    /// Build independent Units of the same wave concurrently.
    pub concurrent_waves: bool,
}

/// Drives one or more deployments against a single backend.
pub struct Orchestrator<B> {
    backend: Arc<B>,
    events: EventBus,
    config: OrchestratorConfig,
}

impl<B: ProvisioningBackend + 'static> Orchestrator<B> {
    pub fn new(backend: Arc<B>, events: EventBus) -> Self {
        Self {
            backend,
            events,
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Plan and build every Unit in `graph`.
    ///
    /// Returns `Err` only for errors detected during planning; build-time
    /// failures are recorded per Unit in the report (see
    /// [`DeploymentReport::into_result`]).
    pub async fn deploy(
        &self,
        graph: &UnitGraph,
        cancel: &CancellationToken,
    ) -> Result<DeploymentReport, ProvisionError> {
        let plan = graph.plan()?;
        let deployment_id = Uuid::now_v7();
        let started_at = Utc::now();

        let span = tracing::info_span!(
            attrs::SPAN_DEPLOY,
            deployment_id = %deployment_id,
            backend = self.backend.name(),
            units = plan.order.len(),
        );

        async move {
            tracing::info!(waves = plan.waves.len(), "deployment started");

            let ledger = Arc::new(UnitLedger::new());
            for id in &plan.order {
                ledger.declare(id);
            }

            let mut reports: HashMap<UnitId, UnitReport> = HashMap::new();

            for (wave_idx, wave) in plan.waves.iter().enumerate() {
                tracing::debug!(wave = wave_idx, units = wave.len(), "processing wave");

                if self.config.concurrent_waves && wave.len() > 1 {
                    let mut join_set = JoinSet::new();
                    for id in wave {
                        let Some(unit) = graph.unit(id) else { continue };
                        let dependencies = plan.dependencies_of(id).into_iter().cloned().collect();
                        let task = self.unit_task(unit, dependencies, &ledger, deployment_id, cancel);
                        join_set.spawn(task.in_current_span());
                    }
                    while let Some(joined) = join_set.join_next().await {
                        match joined {
                            Ok(report) => {
                                reports.insert(report.unit.clone(), report);
                            }
                            Err(e) => tracing::error!(error = %e, "unit task aborted"),
                        }
                    }
                } else {
                    for id in wave {
                        let Some(unit) = graph.unit(id) else { continue };
                        let dependencies = plan.dependencies_of(id).into_iter().cloned().collect();
                        let report = self
                            .unit_task(unit, dependencies, &ledger, deployment_id, cancel)
                            .await;
                        reports.insert(report.unit.clone(), report);
                    }
                }
            }

            let units: Vec<UnitReport> = plan
                .order
                .iter()
                .map(|id| {
                    reports.remove(id).unwrap_or_else(|| {
                        // Only reachable when a spawned task panicked.
                        ledger.transition(id, UnitState::Failed);
                        UnitReport {
                            unit: id.clone(),
                            state: UnitState::Failed,
                            outputs: OutputMap::new(),
                            resources: vec![],
                            error: Some(ProvisionError::ResourceBuildFailure {
                                unit: id.clone(),
                                resource: id.to_string(),
                                cause: BackendError::Unavailable("build task aborted".to_string()),
                            }),
                        }
                    })
                })
                .collect();

            self.events.publish(DeploymentEvent::DeploymentFinished {
                deployment_id,
                states: ledger.states(),
            });

            let report = DeploymentReport {
                deployment_id,
                started_at,
                finished_at: Utc::now(),
                order: plan.order.clone(),
                units,
            };

            tracing::info!(
                success = report.is_success(),
                resources = report.resources_built(),
                "deployment finished"
            );

            Ok(report)
        }
        .instrument(span)
        .await
    }

    fn unit_task(
        &self,
        unit: &Unit,
        dependencies: Vec<UnitId>,
        ledger: &Arc<UnitLedger>,
        deployment_id: Uuid,
        cancel: &CancellationToken,
    ) -> impl Future<Output = UnitReport> + Send + use<B> {
        let builder = UnitBuilder {
            backend: Arc::clone(&self.backend),
            ledger: Arc::clone(ledger),
            events: self.events.clone(),
            deployment_id,
        };
        let unit = unit.clone();
        let cancel = cancel.clone();
        async move { builder.run(unit, dependencies, cancel).await }
    }
}

/// Everything one Unit task needs, owned so it can be spawned.
struct UnitBuilder<B> {
    backend: Arc<B>,
    ledger: Arc<UnitLedger>,
    events: EventBus,
    deployment_id: Uuid,
}

impl<B: ProvisioningBackend> UnitBuilder<B> {
    async fn run(self, unit: Unit, dependencies: Vec<UnitId>, cancel: CancellationToken) -> UnitReport {
        // Cancellation takes effect at Unit boundaries.
        if cancel.is_cancelled() {
            let error = ProvisionError::Cancelled(unit.id.clone());
            return self.skip(&unit, error);
        }

        if let Some(dependency) = dependencies
            .iter()
            .find(|d| self.ledger.state(d) != Some(UnitState::Built))
        {
            let error = ProvisionError::DependencyFailed {
                unit: unit.id.clone(),
                dependency: dependency.clone(),
            };
            return self.skip(&unit, error);
        }

        let span = tracing::info_span!(
            attrs::SPAN_BUILD_UNIT,
            unit_id = %unit.id,
            resources = unit.resources.len(),
        );
        self.build(&unit).instrument(span).await
    }

    async fn build(&self, unit: &Unit) -> UnitReport {
        self.ledger.transition(&unit.id, UnitState::Resolving);
        self.events.publish(DeploymentEvent::UnitStarted {
            deployment_id: self.deployment_id,
            unit: unit.id.clone(),
        });

        let inputs = match self.resolve_inputs(unit) {
            Ok(inputs) => inputs,
            Err(e) => return self.fail(unit, None, e, vec![]),
        };

        self.ledger.transition(&unit.id, UnitState::Building);

        let mut attributes: HashMap<String, Attributes> = HashMap::new();
        let mut built: Vec<BuiltResource> = Vec::with_capacity(unit.resources.len());

        for resource in &unit.resources {
            let scope = ResolutionScope {
                unit: &unit.id,
                inputs: &inputs,
                attributes: &attributes,
            };
            let properties = match scope.resolve_map(&resource.properties, &resource.logical_id) {
                Ok(properties) => properties,
                Err(e) => return self.fail(unit, Some(&resource.logical_id), e, built),
            };

            let request = BuildRequest {
                unit: unit.id.clone(),
                logical_id: resource.logical_id.clone(),
                kind: resource.kind,
                properties,
            };

            let started = Instant::now();
            match self.backend.build_resource(&request).await {
                Ok(reported) => {
                    let duration_ms = started.elapsed().as_millis() as u64;
                    tracing::debug!(
                        resource_id = %resource.logical_id,
                        resource_kind = resource.kind.type_name(),
                        duration_ms,
                        "resource built"
                    );
                    self.events.publish(DeploymentEvent::ResourceBuilt {
                        deployment_id: self.deployment_id,
                        unit: unit.id.clone(),
                        resource: resource.logical_id.clone(),
                        kind: resource.kind,
                        duration_ms,
                    });
                    attributes.insert(resource.logical_id.clone(), reported.clone());
                    built.push(BuiltResource {
                        logical_id: request.logical_id,
                        kind: request.kind,
                        properties: request.properties,
                        attributes: reported,
                    });
                }
                Err(cause) => {
                    let error = match cause {
                        BackendError::MissingExternalResource { name } => {
                            ProvisionError::MissingExternalResource {
                                unit: unit.id.clone(),
                                resource: resource.logical_id.clone(),
                                name,
                            }
                        }
                        other => ProvisionError::ResourceBuildFailure {
                            unit: unit.id.clone(),
                            resource: resource.logical_id.clone(),
                            cause: other,
                        },
                    };
                    return self.fail(unit, Some(&resource.logical_id), error, built);
                }
            }
        }

        let scope = ResolutionScope {
            unit: &unit.id,
            inputs: &inputs,
            attributes: &attributes,
        };
        let mut outputs = OutputMap::new();
        for (name, value) in &unit.exports {
            match scope.resolve(value, &format!("export:{name}")) {
                Ok(resolved) => {
                    outputs.insert(name.clone(), resolved);
                }
                Err(e) => return self.fail(unit, None, e, built),
            }
        }

        match self.ledger.publish(&unit.id, outputs) {
            Ok(frozen) => {
                tracing::info!(outputs = frozen.len(), "unit built");
                self.events.publish(DeploymentEvent::UnitBuilt {
                    deployment_id: self.deployment_id,
                    unit: unit.id.clone(),
                    outputs: frozen.keys().cloned().collect(),
                });
                UnitReport {
                    unit: unit.id.clone(),
                    state: UnitState::Built,
                    outputs: (*frozen).clone(),
                    resources: built,
                    error: None,
                }
            }
            Err(e) => self.fail(unit, None, e, built),
        }
    }

    /// Read every bound input from the producer's published outputs.
    fn resolve_inputs(&self, unit: &Unit) -> Result<BTreeMap<String, Value>, ProvisionError> {
        let mut resolved = BTreeMap::new();
        for (name, input) in &unit.inputs {
            let Some(reference) = &input.reference else {
                continue;
            };
            let unresolved = || ProvisionError::UnresolvedReferenceOrdering {
                consumer: unit.id.clone(),
                producer: reference.producing_unit.clone(),
                output: reference.output_name.clone(),
            };
            let outputs = self
                .ledger
                .outputs(&reference.producing_unit)
                .ok_or_else(unresolved)?;
            let value = outputs
                .get(&reference.output_name)
                .cloned()
                .ok_or_else(unresolved)?;
            resolved.insert(name.clone(), value);
        }
        Ok(resolved)
    }

    fn fail(
        &self,
        unit: &Unit,
        resource: Option<&str>,
        error: ProvisionError,
        built: Vec<BuiltResource>,
    ) -> UnitReport {
        self.ledger.transition(&unit.id, UnitState::Failed);
        tracing::error!(resource_id = ?resource, error = %error, "unit failed");
        self.events.publish(DeploymentEvent::UnitFailed {
            deployment_id: self.deployment_id,
            unit: unit.id.clone(),
            resource: resource.map(str::to_string),
            error: error.to_string(),
        });
        UnitReport {
            unit: unit.id.clone(),
            state: UnitState::Failed,
            outputs: OutputMap::new(),
            resources: built,
            error: Some(error),
        }
    }

    fn skip(&self, unit: &Unit, reason: ProvisionError) -> UnitReport {
        self.ledger.transition(&unit.id, UnitState::Skipped);
        tracing::warn!(unit_id = %unit.id, reason = %reason, "unit skipped");
        self.events.publish(DeploymentEvent::UnitSkipped {
            deployment_id: self.deployment_id,
            unit: unit.id.clone(),
            reason: reason.to_string(),
        });
        UnitReport {
            unit: unit.id.clone(),
            state: UnitState::Skipped,
            outputs: OutputMap::new(),
            resources: vec![],
            error: Some(reason),
        }
    }
}

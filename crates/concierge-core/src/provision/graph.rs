//! Unit registry, dependency graph, and build planning.
//!
//! Uses `petgraph` to model Unit dependencies as a directed graph. An edge
//! `A -> B` exists when `B` explicitly declares a dependency on `A`, or when
//! one of `B`'s inputs is bound to an output of `A` (an inferred edge).
//! Topological sort detects cycles; depth-based grouping produces waves of
//! Units with no path between them.
//!
//! Every graph-shape check runs here, so a plan that comes back `Ok` can be
//! executed without any configuration error surfacing mid-build.

use std::collections::{HashMap, HashSet, VecDeque};

use concierge_types::error::ProvisionError;
use concierge_types::unit::{Unit, UnitId};
use petgraph::Direction;
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Explicit registry of all declared Units for one deployment.
///
/// Passed by reference into the orchestrator; there is no global registry.
#[derive(Debug, Clone, Default)]
pub struct UnitGraph {
    units: Vec<Unit>,
}

impl UnitGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a Unit. Unit ids and resource logical ids must be unique.
    pub fn register(&mut self, unit: Unit) -> Result<(), ProvisionError> {
        if self.unit(&unit.id).is_some() {
            return Err(ProvisionError::DuplicateUnit(unit.id));
        }

        let mut seen = HashSet::new();
        for resource in &unit.resources {
            if !seen.insert(resource.logical_id.as_str()) {
                return Err(ProvisionError::DuplicateResource {
                    unit: unit.id.clone(),
                    resource: resource.logical_id.clone(),
                });
            }
        }

        self.units.push(unit);
        Ok(())
    }

    /// Builder-style [`UnitGraph::register`].
    pub fn with_unit(mut self, unit: Unit) -> Result<Self, ProvisionError> {
        self.register(unit)?;
        Ok(self)
    }

    pub fn unit(&self, id: &UnitId) -> Option<&Unit> {
        self.units.iter().find(|u| &u.id == id)
    }

    /// Units in registration order.
    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Validate the registry and compute a build plan.
    pub fn plan(&self) -> Result<BuildPlan, ProvisionError> {
        build_plan(self)
    }
}

// ---------------------------------------------------------------------------
// Build plan
// ---------------------------------------------------------------------------

/// Why an edge exists between two Units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeOrigin {
    /// Declared in the consumer's `depends_on`.
    Explicit,
    /// Implied by an input bound to the producer's output.
    Inferred,
    Both,
}

impl EdgeOrigin {
    fn merge(self, other: EdgeOrigin) -> EdgeOrigin {
        if self == other { self } else { EdgeOrigin::Both }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEdge {
    pub from: UnitId,
    pub to: UnitId,
    pub origin: EdgeOrigin,
}

/// A validated, acyclic build order.
#[derive(Debug, Clone, Serialize)]
pub struct BuildPlan {
    /// Topological order; producers always precede consumers.
    pub order: Vec<UnitId>,
    /// Units grouped by depth. Units in one wave have no path between them.
    pub waves: Vec<Vec<UnitId>>,
    pub edges: Vec<PlanEdge>,
}

impl BuildPlan {
    /// Direct producers of `unit`.
    pub fn dependencies_of(&self, unit: &UnitId) -> Vec<&UnitId> {
        self.edges
            .iter()
            .filter(|e| &e.to == unit)
            .map(|e| &e.from)
            .collect()
    }

    /// Position of `unit` in the build order.
    pub fn position(&self, unit: &UnitId) -> Option<usize> {
        self.order.iter().position(|u| u == unit)
    }
}

fn build_plan(registry: &UnitGraph) -> Result<BuildPlan, ProvisionError> {
    if registry.is_empty() {
        return Ok(BuildPlan {
            order: vec![],
            waves: vec![],
            edges: vec![],
        });
    }

    for unit in registry.units() {
        validate_unit_shape(unit)?;
    }

    let mut graph = DiGraph::<UnitId, EdgeOrigin>::new();
    let node_of: HashMap<&UnitId, NodeIndex> = registry
        .units()
        .iter()
        .map(|u| (&u.id, graph.add_node(u.id.clone())))
        .collect();

    for unit in registry.units() {
        let to = node_of[&unit.id];

        for dep in &unit.depends_on {
            let from = node_of.get(dep).ok_or_else(|| ProvisionError::UnknownDependency {
                unit: unit.id.clone(),
                dependency: dep.clone(),
            })?;
            add_edge(&mut graph, *from, to, EdgeOrigin::Explicit);
        }

        for (input_name, input) in &unit.inputs {
            let Some(reference) = &input.reference else {
                continue;
            };
            let unresolved = || ProvisionError::UnresolvedReferenceOrdering {
                consumer: unit.id.clone(),
                producer: reference.producing_unit.clone(),
                output: reference.output_name.clone(),
            };
            let producer = registry.unit(&reference.producing_unit).ok_or_else(unresolved)?;
            if !producer.exports.contains_key(&reference.output_name) {
                tracing::debug!(
                    unit = %unit.id,
                    input = %input_name,
                    producer = %producer.id,
                    "input bound to an output the producer does not export"
                );
                return Err(unresolved());
            }
            let from = node_of[&producer.id];
            add_edge(&mut graph, from, to, EdgeOrigin::Inferred);
        }
    }

    // Topological sort -- detects cycles before anything is built
    let sorted = toposort(&graph, None)
        .map_err(|cycle| ProvisionError::CyclicDependency {
            cycle: trace_cycle(&graph, cycle.node_id()),
        })?;

    let edges: Vec<PlanEdge> = graph
        .edge_indices()
        .filter_map(|e| {
            let (from, to) = graph.edge_endpoints(e)?;
            Some(PlanEdge {
                from: graph[from].clone(),
                to: graph[to].clone(),
                origin: graph[e],
            })
        })
        .collect();

    for edge in edges.iter().filter(|e| e.origin == EdgeOrigin::Inferred) {
        tracing::warn!(
            from = %edge.from,
            to = %edge.to,
            "unit '{}' reads outputs of '{}' without declaring the dependency",
            edge.to,
            edge.from
        );
    }

    // Depth for each node: root nodes have depth 0
    let mut depths: HashMap<NodeIndex, usize> = HashMap::new();
    for &node in &sorted {
        let depth = graph
            .neighbors_directed(node, Direction::Incoming)
            .map(|pred| depths.get(&pred).copied().unwrap_or(0) + 1)
            .max()
            .unwrap_or(0);
        depths.insert(node, depth);
    }

    // Group by depth into waves, keeping registration order inside a wave
    let max_depth = depths.values().copied().max().unwrap_or(0);
    let mut waves: Vec<Vec<UnitId>> = vec![vec![]; max_depth + 1];
    for unit in registry.units() {
        let depth = depths[&node_of[&unit.id]];
        waves[depth].push(unit.id.clone());
    }
    let order = waves.iter().flatten().cloned().collect();

    Ok(BuildPlan {
        order,
        waves,
        edges,
    })
}

fn add_edge(
    graph: &mut DiGraph<UnitId, EdgeOrigin>,
    from: NodeIndex,
    to: NodeIndex,
    origin: EdgeOrigin,
) {
    match graph.find_edge(from, to) {
        Some(existing) => {
            let merged = graph[existing].merge(origin);
            graph[existing] = merged;
        }
        None => {
            graph.add_edge(from, to, origin);
        }
    }
}

// ---------------------------------------------------------------------------
// Per-unit validation
// ---------------------------------------------------------------------------

/// Checks that need only the Unit itself: consumed inputs are bound, and
/// attribute pointers only reach backwards in the resource sequence.
fn validate_unit_shape(unit: &Unit) -> Result<(), ProvisionError> {
    for (name, input) in &unit.inputs {
        if input.required && input.reference.is_none() {
            return Err(ProvisionError::MissingRequiredInput {
                unit: unit.id.clone(),
                input: name.clone(),
            });
        }
    }

    let consumed = unit
        .resources
        .iter()
        .flat_map(|r| r.properties.values())
        .chain(unit.exports.values())
        .flat_map(|v| v.inputs());
    for name in consumed {
        let bound = unit
            .inputs
            .get(name)
            .is_some_and(|input| input.reference.is_some());
        if !bound {
            return Err(ProvisionError::MissingRequiredInput {
                unit: unit.id.clone(),
                input: name.to_string(),
            });
        }
    }

    for (idx, resource) in unit.resources.iter().enumerate() {
        let earlier = &unit.resources[..idx];
        for value in resource.properties.values() {
            for attr_ref in value.attribute_refs() {
                let valid = earlier.iter().any(|r| {
                    r.logical_id == attr_ref.resource
                        && r.kind.attribute_names().contains(&attr_ref.attribute.as_str())
                });
                if !valid {
                    return Err(ProvisionError::IntraUnitOrdering {
                        unit: unit.id.clone(),
                        resource: resource.logical_id.clone(),
                        target: format!("{}.{}", attr_ref.resource, attr_ref.attribute),
                    });
                }
            }
        }
    }

    for (name, value) in &unit.exports {
        for attr_ref in value.attribute_refs() {
            let valid = unit.resources.iter().any(|r| {
                r.logical_id == attr_ref.resource
                    && r.kind.attribute_names().contains(&attr_ref.attribute.as_str())
            });
            if !valid {
                return Err(ProvisionError::IntraUnitOrdering {
                    unit: unit.id.clone(),
                    resource: format!("export:{name}"),
                    target: format!("{}.{}", attr_ref.resource, attr_ref.attribute),
                });
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Cycle reporting
// ---------------------------------------------------------------------------

/// Recover one concrete cycle (first node repeated at the end) through the
/// strongly connected component that `start` belongs to.
fn trace_cycle(graph: &DiGraph<UnitId, EdgeOrigin>, start: NodeIndex) -> Vec<UnitId> {
    let cyclic: Vec<Vec<NodeIndex>> = tarjan_scc(graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || graph.find_edge(scc[0], scc[0]).is_some())
        .collect();
    let Some(component) = cyclic
        .iter()
        .find(|scc| scc.contains(&start))
        .or_else(|| cyclic.first())
    else {
        return vec![graph[start].clone()];
    };
    let start = if component.contains(&start) { start } else { component[0] };
    let members: HashSet<NodeIndex> = component.iter().copied().collect();

    // BFS from start back to start, restricted to the component
    let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
    let mut queue = VecDeque::from([start]);
    while let Some(node) = queue.pop_front() {
        for next in graph.neighbors_directed(node, Direction::Outgoing) {
            if !members.contains(&next) {
                continue;
            }
            if next == start {
                let mut path = vec![node];
                let mut current = node;
                while current != start {
                    match parent.get(&current) {
                        Some(&p) => {
                            path.push(p);
                            current = p;
                        }
                        None => break,
                    }
                }
                path.reverse();
                path.push(start);
                return path.into_iter().map(|n| graph[n].clone()).collect();
            }
            if let std::collections::hash_map::Entry::Vacant(slot) = parent.entry(next) {
                slot.insert(node);
                queue.push_back(next);
            }
        }
    }

    component.iter().map(|n| graph[*n].clone()).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

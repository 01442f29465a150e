//! Unit ("stack") types: identity, lifecycle state, inputs, and exported outputs.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::resource::{PropertyValue, Resource};

/// Identifier of a Unit, unique within a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UnitId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Published output values of a built Unit, keyed by export name.
pub type OutputMap = BTreeMap<String, serde_json::Value>;

/// Unit lifecycle states.
///
/// `Declared -> Resolving -> Building -> Built | Failed`. `Skipped` marks a
/// Unit that never started because a dependency did not build or the run
/// was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitState {
    Declared,
    Resolving,
    Building,
    Built,
    Failed,
    Skipped,
}

impl UnitState {
    /// Whether no further transitions are possible from this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, UnitState::Built | UnitState::Failed | UnitState::Skipped)
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitState::Declared => write!(f, "declared"),
            UnitState::Resolving => write!(f, "resolving"),
            UnitState::Building => write!(f, "building"),
            UnitState::Built => write!(f, "built"),
            UnitState::Failed => write!(f, "failed"),
            UnitState::Skipped => write!(f, "skipped"),
        }
    }
}

/// A forward pointer to another Unit's exported output.
///
/// Resolves to a concrete value only after `producing_unit` reaches `Built`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub producing_unit: UnitId,
    pub output_name: String,
}

impl Reference {
    pub fn new(producing_unit: impl Into<UnitId>, output_name: impl Into<String>) -> Self {
        Self {
            producing_unit: producing_unit.into(),
            output_name: output_name.into(),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.producing_unit, self.output_name)
    }
}

/// A named cross-unit input slot.
///
/// Resource properties consume inputs through [`PropertyValue::Input`]; the
/// binding decides which producer output fills the slot. `reference: None`
/// on a required input is a configuration error caught before any build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitInput {
    pub reference: Option<Reference>,
    pub required: bool,
}

impl UnitInput {
    pub fn required(reference: Option<Reference>) -> Self {
        Self {
            reference,
            required: true,
        }
    }

    pub fn optional(reference: Option<Reference>) -> Self {
        Self {
            reference,
            required: false,
        }
    }
}

/// A named collection of Resources with declared dependencies and exports.
///
/// Resources build strictly in declaration order. `exports` are evaluated
/// after every Resource has built and become the Unit's write-once outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    #[serde(default)]
    pub depends_on: BTreeSet<UnitId>,
    #[serde(default)]
    pub inputs: BTreeMap<String, UnitInput>,
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub exports: BTreeMap<String, PropertyValue>,
}

impl Unit {
    pub fn new(id: impl Into<UnitId>) -> Self {
        Self {
            id: id.into(),
            depends_on: BTreeSet::new(),
            inputs: BTreeMap::new(),
            resources: Vec::new(),
            exports: BTreeMap::new(),
        }
    }

    /// Declare an explicit dependency on another Unit.
    pub fn depends_on(mut self, unit: impl Into<UnitId>) -> Self {
        self.depends_on.insert(unit.into());
        self
    }

    pub fn with_input(mut self, name: impl Into<String>, input: UnitInput) -> Self {
        self.inputs.insert(name.into(), input);
        self
    }

    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn with_export(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        self.exports.insert(name.into(), value);
        self
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.logical_id == logical_id)
    }
}

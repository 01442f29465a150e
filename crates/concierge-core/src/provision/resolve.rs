//! Property resolution: turns [`PropertyValue`] expressions into plain JSON.
//!
//! Inputs resolve against the values read from producer outputs; attributes
//! resolve against Resources already built earlier in the same Unit. A
//! pointer that cannot be resolved is an ordering violation and never falls
//! back to a default.

use std::collections::{BTreeMap, HashMap};

use concierge_types::error::ProvisionError;
use concierge_types::resource::{Attributes, PropertyValue};
use concierge_types::unit::UnitId;
use serde_json::{Map, Value};

/// Everything a property expression may read while one Unit builds.
#[derive(Debug, Clone, Copy)]
pub struct ResolutionScope<'a> {
    pub unit: &'a UnitId,
    /// Resolved Unit inputs, keyed by input name.
    pub inputs: &'a BTreeMap<String, Value>,
    /// Attributes of Resources already built in this Unit.
    pub attributes: &'a HashMap<String, Attributes>,
}

impl<'a> ResolutionScope<'a> {
    /// Resolve one expression on behalf of `owner` (a logical id, or an
    /// `export:<name>` label).
    pub fn resolve(&self, value: &PropertyValue, owner: &str) -> Result<Value, ProvisionError> {
        match value {
            PropertyValue::Literal(v) => Ok(v.clone()),
            PropertyValue::Input(name) => self.inputs.get(name).cloned().ok_or_else(|| {
                ProvisionError::MissingRequiredInput {
                    unit: self.unit.clone(),
                    input: name.clone(),
                }
            }),
            PropertyValue::Attribute(attr_ref) => self
                .attributes
                .get(&attr_ref.resource)
                .and_then(|attrs| attrs.get(&attr_ref.attribute))
                .cloned()
                .ok_or_else(|| ProvisionError::IntraUnitOrdering {
                    unit: self.unit.clone(),
                    resource: owner.to_string(),
                    target: format!("{}.{}", attr_ref.resource, attr_ref.attribute),
                }),
            PropertyValue::Concat(parts) => {
                let mut joined = String::new();
                for part in parts {
                    match self.resolve(part, owner)? {
                        Value::String(s) => joined.push_str(&s),
                        Value::Number(n) => joined.push_str(&n.to_string()),
                        other => {
                            return Err(ProvisionError::InvalidProperty {
                                unit: self.unit.clone(),
                                resource: owner.to_string(),
                                message: format!("cannot concatenate non-scalar value {other}"),
                            });
                        }
                    }
                }
                Ok(Value::String(joined))
            }
            PropertyValue::List(items) => items
                .iter()
                .map(|item| self.resolve(item, owner))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            PropertyValue::Map(entries) => self.resolve_map(entries, owner),
        }
    }

    /// Resolve a full property map into a JSON object.
    pub fn resolve_map(
        &self,
        entries: &BTreeMap<String, PropertyValue>,
        owner: &str,
    ) -> Result<Value, ProvisionError> {
        let mut object = Map::new();
        for (key, value) in entries {
            object.insert(key.clone(), self.resolve(value, owner)?);
        }
        Ok(Value::Object(object))
    }
}

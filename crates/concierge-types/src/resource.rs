//! Resource types: capability tags, property expressions, and built attributes.
//!
//! A [`Resource`] is declarative: its properties are [`PropertyValue`]
//! expressions that may point at an earlier Resource's attributes in the same
//! Unit, or at a named Unit input. The orchestrator resolves them into plain
//! JSON right before handing the Resource to the provisioning backend.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Attributes reported by the backend once a Resource has built.
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// Well-known attribute names reported by the provisioning backend.
pub mod attr {
    pub const ARN: &str = "Arn";
    pub const BUCKET_NAME: &str = "BucketName";
    pub const ROLE_NAME: &str = "RoleName";
    pub const POLICY_ID: &str = "PolicyId";
    pub const KNOWLEDGE_BASE_ID: &str = "KnowledgeBaseId";
    pub const KNOWLEDGE_BASE_ARN: &str = "KnowledgeBaseArn";
    pub const DATA_SOURCE_ID: &str = "DataSourceId";
    pub const BOT_ID: &str = "Id";
    pub const BOT_VERSION: &str = "BotVersion";
    pub const BOT_ALIAS_ID: &str = "BotAliasId";
}

/// Capability tag carried by every Resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Externally managed document store, imported by name.
    ImportedDocumentStore,
    /// Externally managed callable function, imported by address.
    ImportedFunction,
    Role,
    RolePolicy,
    KnowledgeBase,
    DataSource,
    Bot,
    BotVersion,
    BotAlias,
}

impl ResourceKind {
    /// Template type name used when the Unit is synthesized.
    pub fn type_name(&self) -> &'static str {
        match self {
            ResourceKind::ImportedDocumentStore => "AWS::S3::Bucket",
            ResourceKind::ImportedFunction => "AWS::Lambda::Function",
            ResourceKind::Role => "AWS::IAM::Role",
            ResourceKind::RolePolicy => "AWS::IAM::Policy",
            ResourceKind::KnowledgeBase => "AWS::Bedrock::KnowledgeBase",
            ResourceKind::DataSource => "AWS::Bedrock::DataSource",
            ResourceKind::Bot => "AWS::Lex::Bot",
            ResourceKind::BotVersion => "AWS::Lex::BotVersion",
            ResourceKind::BotAlias => "AWS::Lex::BotAlias",
        }
    }

    /// Imports reference something that already exists outside this system.
    pub fn is_import(&self) -> bool {
        matches!(
            self,
            ResourceKind::ImportedDocumentStore | ResourceKind::ImportedFunction
        )
    }

    /// Property holding the external name an import points at.
    pub fn import_key(&self) -> Option<&'static str> {
        match self {
            ResourceKind::ImportedDocumentStore => Some("BucketName"),
            ResourceKind::ImportedFunction => Some("FunctionArn"),
            _ => None,
        }
    }

    /// Attribute names the backend reports for this kind after a build.
    pub fn attribute_names(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::ImportedDocumentStore => &[attr::ARN, attr::BUCKET_NAME],
            ResourceKind::ImportedFunction => &[attr::ARN],
            ResourceKind::Role => &[attr::ARN, attr::ROLE_NAME],
            ResourceKind::RolePolicy => &[attr::POLICY_ID],
            ResourceKind::KnowledgeBase => &[attr::KNOWLEDGE_BASE_ID, attr::KNOWLEDGE_BASE_ARN],
            ResourceKind::DataSource => &[attr::DATA_SOURCE_ID],
            ResourceKind::Bot => &[attr::BOT_ID, attr::ARN],
            ResourceKind::BotVersion => &[attr::BOT_VERSION],
            ResourceKind::BotAlias => &[attr::BOT_ALIAS_ID, attr::ARN],
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Pointer to an attribute of an earlier Resource in the same Unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeRef {
    pub resource: String,
    pub attribute: String,
}

/// A property expression, resolved to JSON right before the build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    Literal(serde_json::Value),
    /// A named Unit input, bound to another Unit's output.
    Input(String),
    Attribute(AttributeRef),
    /// String concatenation of the resolved parts.
    Concat(Vec<PropertyValue>),
    List(Vec<PropertyValue>),
    Map(BTreeMap<String, PropertyValue>),
}

impl PropertyValue {
    pub fn literal(value: impl Into<serde_json::Value>) -> Self {
        PropertyValue::Literal(value.into())
    }

    pub fn input(name: impl Into<String>) -> Self {
        PropertyValue::Input(name.into())
    }

    pub fn attribute(resource: impl Into<String>, attribute: impl Into<String>) -> Self {
        PropertyValue::Attribute(AttributeRef {
            resource: resource.into(),
            attribute: attribute.into(),
        })
    }

    pub fn concat(parts: impl IntoIterator<Item = PropertyValue>) -> Self {
        PropertyValue::Concat(parts.into_iter().collect())
    }

    pub fn list(items: impl IntoIterator<Item = PropertyValue>) -> Self {
        PropertyValue::List(items.into_iter().collect())
    }

    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, PropertyValue)>) -> Self {
        PropertyValue::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Visit this value and every nested value, depth first.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a PropertyValue)) {
        visit(self);
        match self {
            PropertyValue::Concat(items) | PropertyValue::List(items) => {
                for item in items {
                    item.walk(visit);
                }
            }
            PropertyValue::Map(entries) => {
                for value in entries.values() {
                    value.walk(visit);
                }
            }
            PropertyValue::Literal(_) | PropertyValue::Input(_) | PropertyValue::Attribute(_) => {}
        }
    }

    /// Names of all Unit inputs this expression consumes.
    pub fn inputs(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.walk(&mut |value| {
            if let PropertyValue::Input(name) = value {
                names.push(name.as_str());
            }
        });
        names
    }

    /// All intra-unit attribute pointers in this expression.
    pub fn attribute_refs(&self) -> Vec<&AttributeRef> {
        let mut refs = Vec::new();
        self.walk(&mut |value| {
            if let PropertyValue::Attribute(r) = value {
                refs.push(r);
            }
        });
        refs
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Literal(serde_json::Value::String(s.to_string()))
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::Literal(serde_json::Value::String(s))
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Literal(serde_json::Value::Bool(b))
    }
}

impl From<u64> for PropertyValue {
    fn from(n: u64) -> Self {
        PropertyValue::Literal(n.into())
    }
}

impl From<f64> for PropertyValue {
    fn from(n: f64) -> Self {
        PropertyValue::Literal(n.into())
    }
}

/// A single managed capability inside a Unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Identifier unique within the owning Unit.
    pub logical_id: String,
    pub kind: ResourceKind,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
}

impl Resource {
    pub fn new(logical_id: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            logical_id: logical_id.into(),
            kind,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }
}

/// A Resource together with the attributes the backend reported for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuiltResource {
    pub logical_id: String,
    pub kind: ResourceKind,
    /// Properties exactly as sent to the backend.
    pub properties: serde_json::Value,
    pub attributes: Attributes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walk_collects_nested_inputs_and_attributes() {
        let value = PropertyValue::map([
            ("Role", PropertyValue::attribute("KbRole", attr::ARN)),
            (
                "Statement",
                PropertyValue::list([PropertyValue::map([(
                    "Resource",
                    PropertyValue::list([
                        PropertyValue::input("knowledgeBaseArn"),
                        PropertyValue::concat([
                            PropertyValue::attribute("Docs", attr::ARN),
                            "/*".into(),
                        ]),
                    ]),
                )])]),
            ),
        ]);

        assert_eq!(value.inputs(), vec!["knowledgeBaseArn"]);
        let attrs: Vec<&str> = value
            .attribute_refs()
            .iter()
            .map(|r| r.resource.as_str())
            .collect();
        assert_eq!(attrs.len(), 2);
        assert!(attrs.contains(&"KbRole"));
        assert!(attrs.contains(&"Docs"));
    }

    #[test]
    fn test_import_kinds() {
        assert!(ResourceKind::ImportedDocumentStore.is_import());
        assert!(ResourceKind::ImportedFunction.is_import());
        assert!(!ResourceKind::Role.is_import());
    }

    #[test]
    fn test_property_value_serde_shape() {
        let value = PropertyValue::input("knowledgeBaseId");
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json["kind"], "input");
        assert_eq!(json["value"], "knowledgeBaseId");
        let back: PropertyValue = serde_json::from_value(json).unwrap();
        assert_eq!(back, value);
    }
}

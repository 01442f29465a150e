//! Template synthesis: renders Units as declarative template documents.
//!
//! Intra-unit attribute pointers become `Fn::GetAtt`, bound cross-unit inputs
//! become `Fn::ImportValue` of the producer's export, and every export is
//! published under `<unit>:<output>`.

use std::path::{Path, PathBuf};

use concierge_core::provision::UnitGraph;
use concierge_types::error::ProvisionError;
use concierge_types::resource::PropertyValue;
use concierge_types::unit::Unit;
use serde_json::{json, Map, Value};

/// Errors from writing synthesized templates.
#[derive(Debug, thiserror::Error)]
pub enum SynthError {
    #[error("graph cannot be planned: {0}")]
    Plan(#[from] ProvisionError),

    #[error("failed to write template: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize template: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub const MANIFEST_FILE: &str = "manifest.json";

/// Export name under which a unit output is published.
pub fn export_name(unit: &str, output: &str) -> String {
    format!("{unit}:{output}")
}

/// Render one Unit as a template document.
pub fn synthesize(unit: &Unit) -> Value {
    let mut resources = Map::new();
    for resource in &unit.resources {
        let properties: Map<String, Value> = resource
            .properties
            .iter()
            .map(|(k, v)| (k.clone(), render(unit, v)))
            .collect();
        resources.insert(
            resource.logical_id.clone(),
            json!({
                "Type": resource.kind.type_name(),
                "Properties": properties,
            }),
        );
    }

    let mut outputs = Map::new();
    for (name, value) in &unit.exports {
        outputs.insert(
            name.clone(),
            json!({
                "Value": render(unit, value),
                "Export": { "Name": export_name(unit.id.as_str(), name) },
            }),
        );
    }

    let mut template = json!({
        "Metadata": {
            "DependsOn": unit.depends_on.iter().map(|d| d.as_str()).collect::<Vec<_>>(),
        },
        "Resources": resources,
        "Outputs": outputs,
    });

    let parameters: Map<String, Value> = unit
        .inputs
        .iter()
        .filter(|(_, input)| input.reference.is_none())
        .map(|(name, _)| (name.clone(), json!({ "Type": "String" })))
        .collect();
    if !parameters.is_empty() {
        template["Parameters"] = Value::Object(parameters);
    }
    template
}

fn render(unit: &Unit, value: &PropertyValue) -> Value {
    match value {
        PropertyValue::Literal(v) => v.clone(),
        PropertyValue::Input(name) => match unit.inputs.get(name).and_then(|i| i.reference.as_ref()) {
            Some(reference) => json!({
                "Fn::ImportValue": export_name(reference.producing_unit.as_str(), &reference.output_name)
            }),
            None => json!({ "Ref": name }),
        },
        PropertyValue::Attribute(attr_ref) => json!({
            "Fn::GetAtt": [attr_ref.resource, attr_ref.attribute]
        }),
        PropertyValue::Concat(parts) => {
            let parts: Vec<Value> = parts.iter().map(|p| render(unit, p)).collect();
            json!({ "Fn::Join": ["", parts] })
        }
        PropertyValue::List(items) => Value::Array(items.iter().map(|i| render(unit, i)).collect()),
        PropertyValue::Map(entries) => Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), render(unit, v)))
                .collect(),
        ),
    }
}

/// Plan `graph`, then write `<unit>.template.json` for every Unit plus a
/// manifest holding the build order. Returns the written paths.
pub async fn synthesize_to_dir(graph: &UnitGraph, dir: &Path) -> Result<Vec<PathBuf>, SynthError> {
    let plan = graph.plan()?;
    tokio::fs::create_dir_all(dir).await?;

    let mut written = Vec::with_capacity(plan.order.len() + 1);
    for id in &plan.order {
        let Some(unit) = graph.unit(id) else { continue };
        let path = dir.join(format!("{id}.template.json"));
        let body = serde_json::to_string_pretty(&synthesize(unit))?;
        tokio::fs::write(&path, body).await?;
        tracing::debug!(unit_id = %id, path = %path.display(), "template written");
        written.push(path);
    }

    let manifest = json!({
        "order": plan.order,
        "waves": plan.waves,
    });
    let path = dir.join(MANIFEST_FILE);
    tokio::fs::write(&path, serde_json::to_string_pretty(&manifest)?).await?;
    written.push(path);

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_core::topology::{concierge_units, BOT_UNIT, KNOWLEDGE_UNIT};
    use concierge_types::config::DeploymentConfig;
    use concierge_types::unit::UnitId;
    use tempfile::TempDir;

    fn graph() -> UnitGraph {
        concierge_units(&DeploymentConfig::default()).unwrap()
    }

    #[test]
    fn test_knowledge_template_shape() {
        let graph = graph();
        let template = synthesize(graph.unit(&UnitId::from(KNOWLEDGE_UNIT)).unwrap());

        assert_eq!(
            template["Resources"]["HotelKnowledgeBase"]["Type"],
            "AWS::Bedrock::KnowledgeBase"
        );
        assert_eq!(
            template["Resources"]["HotelKnowledgeBase"]["Properties"]["RoleArn"],
            json!({ "Fn::GetAtt": ["BedrockKBRole", "Arn"] })
        );
        assert_eq!(
            template["Outputs"]["knowledgeBaseId"]["Export"]["Name"],
            "HotelBedrockKBStack:knowledgeBaseId"
        );
        assert!(template.get("Parameters").is_none());
    }

    #[test]
    fn test_cross_unit_inputs_become_imports() {
        let graph = graph();
        let template = synthesize(graph.unit(&UnitId::from(BOT_UNIT)).unwrap());

        let statement = &template["Resources"]["LexBotRoleDefaultPolicy"]["Properties"]["PolicyDocument"]
            ["Statement"][0];
        assert_eq!(
            statement["Resource"][0],
            json!({ "Fn::ImportValue": "HotelBedrockKBStack:knowledgeBaseArn" })
        );
        assert_eq!(template["Metadata"]["DependsOn"], json!(["HotelBedrockKBStack"]));
    }

    #[test]
    fn test_concat_renders_join() {
        let graph = graph();
        let template = synthesize(graph.unit(&UnitId::from(KNOWLEDGE_UNIT)).unwrap());
        let statement = &template["Resources"]["BedrockKBRoleDefaultPolicy"]["Properties"]["PolicyDocument"]
            ["Statement"][0];
        assert_eq!(
            statement["Resource"][1],
            json!({ "Fn::Join": ["", [{ "Fn::GetAtt": ["ImportedDocsBucket", "Arn"] }, "/*"]] })
        );
    }

    #[tokio::test]
    async fn test_synthesize_to_dir_writes_templates_and_manifest() {
        let tmp = TempDir::new().unwrap();
        let written = synthesize_to_dir(&graph(), tmp.path()).await.unwrap();
        assert_eq!(written.len(), 3);

        let manifest: Value =
            serde_json::from_str(&tokio::fs::read_to_string(tmp.path().join(MANIFEST_FILE)).await.unwrap())
                .unwrap();
        assert_eq!(manifest["order"], json!([KNOWLEDGE_UNIT, BOT_UNIT]));
        assert!(tmp.path().join("HotelLexStack.template.json").exists());
    }

    #[tokio::test]
    async fn test_unplannable_graph_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let cyclic = UnitGraph::new()
            .with_unit(Unit::new("a").depends_on("b"))
            .unwrap()
            .with_unit(Unit::new("b").depends_on("a"))
            .unwrap();
        let out = tmp.path().join("out");
        let err = synthesize_to_dir(&cyclic, &out).await.unwrap_err();
        assert!(matches!(err, SynthError::Plan(ProvisionError::CyclicDependency { .. })));
        assert!(!out.exists());
    }
}

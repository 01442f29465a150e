//! Knowledge backend unit: document store import, access role, vector
//! knowledge base, and the data source that feeds it.
//!
//! Resources are declared in build order. The role policy comes before the
//! knowledge base, so every grant is attached by the time the knowledge base
//! reads the role's ARN.

use concierge_types::config::DeploymentConfig;
use concierge_types::resource::{attr, PropertyValue, Resource, ResourceKind};
use concierge_types::unit::{Unit, UnitId};
use serde_json::json;

use crate::policy::{allow, assume_role_document, policy_document};

/// Output carrying the knowledge base identifier.
pub const KNOWLEDGE_BASE_ID: &str = "knowledgeBaseId";
/// Output carrying the knowledge base address.
pub const KNOWLEDGE_BASE_ARN: &str = "knowledgeBaseArn";

pub const DOCS_BUCKET: &str = "ImportedDocsBucket";
pub const KB_ROLE: &str = "BedrockKBRole";
pub const KB_ROLE_POLICY: &str = "BedrockKBRoleDefaultPolicy";
pub const KNOWLEDGE_BASE: &str = "HotelKnowledgeBase";
pub const DATA_SOURCE: &str = "HotelKBDataSource";

const SERVICE_PRINCIPAL: &str = "bedrock.amazonaws.com";

/// Inputs for the knowledge backend unit.
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeBackendSpec {
    pub unit_id: UnitId,
    pub document_store_name: String,
    pub vector_collection_arn: String,
    pub vector_index_name: String,
    pub embedding_model_arn: String,
    pub knowledge_base_name: String,
    pub data_source_name: String,
}

impl KnowledgeBackendSpec {
    pub fn from_config(unit_id: impl Into<UnitId>, config: &DeploymentConfig) -> Self {
        Self {
            unit_id: unit_id.into(),
            document_store_name: config.document_store_name.clone(),
            vector_collection_arn: config.vector_collection_arn.clone(),
            vector_index_name: config.vector_index_name.clone(),
            embedding_model_arn: config.embedding_model_arn.clone(),
            knowledge_base_name: "hotel-ai-knowledge-base".to_string(),
            data_source_name: "hotel-docs-datasource".to_string(),
        }
    }

    /// Declare the unit. Nothing is validated against the outside world here;
    /// a bad document store name surfaces when the import is built.
    pub fn into_unit(self) -> Unit {
        let bucket_arn = || PropertyValue::attribute(DOCS_BUCKET, attr::ARN);

        let bucket = Resource::new(DOCS_BUCKET, ResourceKind::ImportedDocumentStore)
            .with_property("BucketName", self.document_store_name);

        let role = Resource::new(KB_ROLE, ResourceKind::Role)
            .with_property("AssumeRolePolicyDocument", assume_role_document(SERVICE_PRINCIPAL))
            .with_property("Description", "Role used by the knowledge base to read documents and the vector index");

        let grants = policy_document([
            allow(
                &["s3:GetObject*", "s3:GetBucket*", "s3:List*"],
                [
                    bucket_arn(),
                    PropertyValue::concat([bucket_arn(), "/*".into()]),
                ],
            ),
            allow(&["bedrock:InvokeModel"], [PropertyValue::from(self.embedding_model_arn.clone())]),
            allow(&["aoss:APIAccessAll"], [PropertyValue::from(self.vector_collection_arn.clone())]),
        ]);
        let policy = Resource::new(KB_ROLE_POLICY, ResourceKind::RolePolicy)
            .with_property("PolicyName", KB_ROLE_POLICY)
            .with_property(
                "Roles",
                PropertyValue::list([PropertyValue::attribute(KB_ROLE, attr::ROLE_NAME)]),
            )
            .with_property("PolicyDocument", grants);

        let knowledge_base = Resource::new(KNOWLEDGE_BASE, ResourceKind::KnowledgeBase)
            .with_property("Name", self.knowledge_base_name)
            .with_property("RoleArn", PropertyValue::attribute(KB_ROLE, attr::ARN))
            .with_property(
                "KnowledgeBaseConfiguration",
                PropertyValue::literal(json!({
                    "Type": "VECTOR",
                    "VectorKnowledgeBaseConfiguration": {
                        "EmbeddingModelArn": self.embedding_model_arn
                    }
                })),
            )
            .with_property(
                "StorageConfiguration",
                PropertyValue::literal(json!({
                    "Type": "OPENSEARCH_SERVERLESS",
                    "OpensearchServerlessConfiguration": {
                        "CollectionArn": self.vector_collection_arn,
                        "VectorIndexName": self.vector_index_name,
                        "FieldMapping": {
                            "VectorField": "embedding",
                            "TextField": "text",
                            "MetadataField": "metadata"
                        }
                    }
                })),
            );

        let data_source = Resource::new(DATA_SOURCE, ResourceKind::DataSource)
            .with_property(
                "KnowledgeBaseId",
                PropertyValue::attribute(KNOWLEDGE_BASE, attr::KNOWLEDGE_BASE_ID),
            )
            .with_property("Name", self.data_source_name)
            .with_property(
                "DataSourceConfiguration",
                PropertyValue::map([
                    ("Type", PropertyValue::from("S3")),
                    (
                        "S3Configuration",
                        PropertyValue::map([("BucketArn", bucket_arn())]),
                    ),
                ]),
            );

        Unit::new(self.unit_id)
            .with_resource(bucket)
            .with_resource(role)
            .with_resource(policy)
            .with_resource(knowledge_base)
            .with_resource(data_source)
            .with_export(
                KNOWLEDGE_BASE_ID,
                PropertyValue::attribute(KNOWLEDGE_BASE, attr::KNOWLEDGE_BASE_ID),
            )
            .with_export(
                KNOWLEDGE_BASE_ARN,
                PropertyValue::attribute(KNOWLEDGE_BASE, attr::KNOWLEDGE_BASE_ARN),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> Unit {
        KnowledgeBackendSpec::from_config("HotelBedrockKBStack", &DeploymentConfig::default())
            .into_unit()
    }

    #[test]
    fn test_resources_in_build_order() {
        let ids: Vec<_> = unit().resources.iter().map(|r| r.logical_id.clone()).collect();
        assert_eq!(
            ids,
            vec![DOCS_BUCKET, KB_ROLE, KB_ROLE_POLICY, KNOWLEDGE_BASE, DATA_SOURCE]
        );
    }

    #[test]
    fn test_exports_knowledge_base_identity() {
        let unit = unit();
        assert_eq!(
            unit.exports.keys().map(String::as_str).collect::<Vec<_>>(),
            vec![KNOWLEDGE_BASE_ARN, KNOWLEDGE_BASE_ID]
        );
        assert!(unit.inputs.is_empty());
        assert!(unit.depends_on.is_empty());
    }

    #[test]
    fn test_policy_grants_minimum_capabilities() {
        let unit = unit();
        let document = unit.resource(KB_ROLE_POLICY).unwrap().property("PolicyDocument").unwrap();
        let json = serde_json::to_string(document).unwrap();
        for action in ["s3:GetObject*", "bedrock:InvokeModel", "aoss:APIAccessAll"] {
            assert!(json.contains(action), "missing {action}");
        }
        let refs = document.attribute_refs();
        assert!(refs.iter().all(|r| r.resource == DOCS_BUCKET));
    }

    #[test]
    fn test_knowledge_base_reads_role_after_policy() {
        let unit = unit();
        let kb = unit.resource(KNOWLEDGE_BASE).unwrap();
        let refs = kb.property("RoleArn").unwrap().attribute_refs();
        assert_eq!(refs[0].resource, KB_ROLE);

        let position = |id: &str| unit.resources.iter().position(|r| r.logical_id == id);
        assert!(position(KB_ROLE_POLICY) < position(KNOWLEDGE_BASE));
    }
}

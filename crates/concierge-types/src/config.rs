//! Deployment configuration types for Concierge.
//!
//! `DeploymentConfig` carries the externally provisioned inputs the two Units
//! need: the document store, the vector collection and index, the embedding
//! model, and the optional booking function. Every field has a default so a
//! bare `concierge.toml` (or none at all) still produces a deployable topology.

use serde::{Deserialize, Serialize};

/// Externally supplied deployment inputs.
///
/// Loaded from `concierge.toml`, then overlaid with environment variables.
/// `external_function_arn` is a real `Option`: when absent, the bot unit is
/// built without a function import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    #[serde(default = "default_document_store_name")]
    pub document_store_name: String,

    #[serde(default = "default_vector_collection_arn")]
    pub vector_collection_arn: String,

    #[serde(default = "default_vector_index_name")]
    pub vector_index_name: String,

    #[serde(default = "default_embedding_model_arn")]
    pub embedding_model_arn: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_function_arn: Option<String>,

    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
}

fn default_document_store_name() -> String {
    "hotel-ai-docs-bucket-prod".to_string()
}

fn default_vector_collection_arn() -> String {
    "arn:aws:aoss:us-east-1:123456789012:collection/id".to_string()
}

fn default_vector_index_name() -> String {
    "hotel-docs-index".to_string()
}

fn default_embedding_model_arn() -> String {
    "arn:aws:bedrock:us-east-1::foundation-model/amazon.titan-embed-text-v1".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            document_store_name: default_document_store_name(),
            vector_collection_arn: default_vector_collection_arn(),
            vector_index_name: default_vector_index_name(),
            embedding_model_arn: default_embedding_model_arn(),
            external_function_arn: None,
            region: default_region(),
            account: None,
        }
    }
}

//! Deployment configuration loader for Concierge.
//!
//! Reads `concierge.toml` and deserializes it into [`DeploymentConfig`], then
//! layers environment overrides on top. The lenient loader falls back to
//! defaults when the file is missing or malformed; the strict reader surfaces
//! a [`ConfigError`] instead.

use std::path::Path;

use concierge_types::config::DeploymentConfig;
use concierge_types::error::ConfigError;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "concierge.toml";

pub const ENV_DOCUMENT_STORE: &str = "TF_OUT_S3_BUCKET";
pub const ENV_VECTOR_COLLECTION: &str = "TF_OUT_OSS_ARN";
pub const ENV_VECTOR_INDEX: &str = "TF_OUT_OSS_INDEX";
pub const ENV_EMBEDDING_MODEL: &str = "TF_OUT_EMBEDDING_MODEL_ARN";
pub const ENV_EXTERNAL_FUNCTION: &str = "TF_OUT_LAMBDA_ARN";
pub const ENV_REGION: &str = "CDK_DEFAULT_REGION";
pub const ENV_ACCOUNT: &str = "CDK_DEFAULT_ACCOUNT";

pub fn parse_deployment_config(content: &str) -> Result<DeploymentConfig, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
}

/// Read and parse `path`, failing on any I/O or parse error.
pub async fn read_deployment_config(path: &Path) -> Result<DeploymentConfig, ConfigError> {
    let content = tokio::fs::read_to_string(path).await?;
    parse_deployment_config(&content)
}

/// Load deployment configuration from `path`.
///
/// - If the file does not exist, returns [`DeploymentConfig::default()`].
/// - If the file exists but fails to read or parse, logs a warning and returns the default.
/// - If the file exists and parses successfully, returns the parsed config.
pub async fn load_deployment_config(path: &Path) -> DeploymentConfig {
    match read_deployment_config(path).await {
        Ok(config) => config,
        Err(ConfigError::Read(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config found at {}, using defaults", path.display());
            DeploymentConfig::default()
        }
        Err(err) => {
            tracing::warn!("Failed to load {}: {err}, using defaults", path.display());
            DeploymentConfig::default()
        }
    }
}

/// Overlay values from `lookup` onto `config`. Empty values count as unset.
pub fn apply_overrides(
    mut config: DeploymentConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> DeploymentConfig {
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get(ENV_DOCUMENT_STORE) {
        config.document_store_name = v;
    }
    if let Some(v) = get(ENV_VECTOR_COLLECTION) {
        config.vector_collection_arn = v;
    }
    if let Some(v) = get(ENV_VECTOR_INDEX) {
        config.vector_index_name = v;
    }
    if let Some(v) = get(ENV_EMBEDDING_MODEL) {
        config.embedding_model_arn = v;
    }
    if let Some(v) = get(ENV_EXTERNAL_FUNCTION) {
        config.external_function_arn = Some(v);
    }
    if let Some(v) = get(ENV_REGION) {
        config.region = v;
    }
    if let Some(v) = get(ENV_ACCOUNT) {
        config.account = Some(v);
    }
    // A blank value written in the file is no address either.
    config.external_function_arn = config.external_function_arn.filter(|v| !v.trim().is_empty());
    config
}

/// Overlay process environment variables onto `config`.
pub fn apply_env_overrides(config: DeploymentConfig) -> DeploymentConfig {
    apply_overrides(config, |key| std::env::var(key).ok())
}

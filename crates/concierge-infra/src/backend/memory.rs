//! Deterministic in-memory provisioning backend.
//!
//! Physical ids are derived from a SHA-256 digest of the resource's identity
//! (unit and logical id), so they survive property changes and agree across
//! instances. A digest of the whole request decides convergence: an identical
//! request reports the attributes it got before. A version request also
//! digests the current draft of its bot, so changing the bot cuts a new
//! version. Imports succeed only for names registered as existing externals.
//! Every call is appended to an ordered build ledger.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use concierge_core::provision::{BuildRequest, ProvisioningBackend};
use concierge_types::error::BackendError;
use concierge_types::resource::{attr, Attributes, ResourceKind};
use concierge_types::unit::UnitId;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

/// Account id used when the configuration names none.
pub const DEFAULT_ACCOUNT: &str = "123456789012";

/// One call received by the backend.
#[derive(Debug, Clone, Serialize)]
pub struct BuildRecord {
    pub unit: UnitId,
    pub logical_id: String,
    pub kind: ResourceKind,
    pub properties: Value,
    /// `None` when the build was refused.
    pub attributes: Option<Attributes>,
    /// True when an identical request had already been built.
    pub converged: bool,
    pub built_at: DateTime<Utc>,
}

/// Simulated backend for planning, tests, and dry runs.
#[derive(Debug)]
pub struct InMemoryBackend {
    region: String,
    account: String,
    externals: HashSet<String>,
    overrides: HashMap<String, Attributes>,
    failures: HashMap<String, String>,
    /// Request digest -> attributes already reported for it.
    converged: DashMap<String, Attributes>,
    /// Bot id -> request digest of its current draft.
    drafts: DashMap<String, String>,
    /// Bot id -> number of versions cut so far.
    version_counters: DashMap<String, u32>,
    ledger: Mutex<Vec<BuildRecord>>,
}

impl InMemoryBackend {
    pub fn new(region: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            account: account.into(),
            externals: HashSet::new(),
            overrides: HashMap::new(),
            failures: HashMap::new(),
            converged: DashMap::new(),
            drafts: DashMap::new(),
            version_counters: DashMap::new(),
            ledger: Mutex::new(Vec::new()),
        }
    }

    /// Register an externally managed resource (bucket name or function ARN).
    pub fn with_external(mut self, name: impl Into<String>) -> Self {
        self.externals.insert(name.into());
        self
    }

    /// Pin attributes for `logical_id`, overriding the derived values.
    pub fn with_attribute_override(mut self, logical_id: impl Into<String>, attributes: Attributes) -> Self {
        self.overrides.insert(logical_id.into(), attributes);
        self
    }

    /// Make every build of `logical_id` fail with `reason`.
    pub fn fail_on(mut self, logical_id: impl Into<String>, reason: impl Into<String>) -> Self {
        self.failures.insert(logical_id.into(), reason.into());
        self
    }

    /// Snapshot of the build ledger in call order.
    pub async fn records(&self) -> Vec<BuildRecord> {
        self.ledger.lock().await.clone()
    }

    fn identity(request: &BuildRequest) -> String {
        let mut hasher = Sha256::new();
        hasher.update(request.unit.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(request.logical_id.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn digest(&self, request: &BuildRequest) -> String {
        let mut hasher = Sha256::new();
        hasher.update(request.unit.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(request.logical_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(request.kind.type_name().as_bytes());
        hasher.update([0u8]);
        // serde_json maps are sorted, so this rendering is canonical.
        hasher.update(request.properties.to_string().as_bytes());
        if request.kind == ResourceKind::BotVersion {
            let draft = request
                .properties
                .get("BotId")
                .and_then(Value::as_str)
                .and_then(|bot_id| self.drafts.get(bot_id).map(|d| d.clone()));
            if let Some(draft) = draft {
                hasher.update([0u8]);
                hasher.update(draft.as_bytes());
            }
        }
        format!("{:x}", hasher.finalize())
    }

    fn check(&self, request: &BuildRequest) -> Result<(), BackendError> {
        if let Some(reason) = self.failures.get(&request.logical_id) {
            return Err(BackendError::Rejected(reason.clone()));
        }
        if let Some(key) = request.kind.import_key() {
            let name = property_str(request, key)?;
            if !self.externals.contains(name) {
                return Err(BackendError::MissingExternalResource {
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }

    fn derive(&self, request: &BuildRequest) -> Result<Attributes, BackendError> {
        let pinned = self.overrides.get(&request.logical_id);
        let pick = |name: &str, derived: String| -> Value {
            pinned
                .and_then(|p| p.get(name))
                .cloned()
                .unwrap_or(Value::String(derived))
        };
        let identity = Self::identity(request);
        let short_id = identity[..10].to_uppercase();
        let (region, account) = (&self.region, &self.account);

        let mut attributes = Attributes::new();
        match request.kind {
            ResourceKind::ImportedDocumentStore => {
                let name = property_str(request, "BucketName")?;
                attributes.insert(attr::BUCKET_NAME.into(), json!(name));
                attributes.insert(attr::ARN.into(), pick(attr::ARN, format!("arn:aws:s3:::{name}")));
            }
            ResourceKind::ImportedFunction => {
                let arn = property_str(request, "FunctionArn")?;
                attributes.insert(attr::ARN.into(), json!(arn));
            }
            ResourceKind::Role => {
                let role_name = pick(attr::ROLE_NAME, format!("{}-{}", request.logical_id, &identity[..8]));
                let arn = format!("arn:aws:iam::{account}:role/{}", as_text(&role_name));
                attributes.insert(attr::ARN.into(), pick(attr::ARN, arn));
                attributes.insert(attr::ROLE_NAME.into(), role_name);
            }
            ResourceKind::RolePolicy => {
                attributes.insert(attr::POLICY_ID.into(), pick(attr::POLICY_ID, format!("ANPA{short_id}")));
            }
            ResourceKind::KnowledgeBase => {
                let id = pick(attr::KNOWLEDGE_BASE_ID, short_id);
                let arn = format!("arn:aws:bedrock:{region}:{account}:knowledge-base/{}", as_text(&id));
                attributes.insert(attr::KNOWLEDGE_BASE_ARN.into(), pick(attr::KNOWLEDGE_BASE_ARN, arn));
                attributes.insert(attr::KNOWLEDGE_BASE_ID.into(), id);
            }
            ResourceKind::DataSource => {
                attributes.insert(attr::DATA_SOURCE_ID.into(), pick(attr::DATA_SOURCE_ID, short_id));
            }
            ResourceKind::Bot => {
                let id = pick(attr::BOT_ID, short_id);
                let arn = format!("arn:aws:lex:{region}:{account}:bot/{}", as_text(&id));
                attributes.insert(attr::ARN.into(), pick(attr::ARN, arn));
                attributes.insert(attr::BOT_ID.into(), id);
            }
            ResourceKind::BotVersion => {
                let bot_id = property_str(request, "BotId")?.to_string();
                let mut counter = self.version_counters.entry(bot_id).or_insert(0);
                *counter += 1;
                let version = counter.to_string();
                attributes.insert(attr::BOT_VERSION.into(), pick(attr::BOT_VERSION, version));
            }
            ResourceKind::BotAlias => {
                let bot_id = property_str(request, "BotId")?;
                let id = pick(attr::BOT_ALIAS_ID, short_id);
                let arn = format!("arn:aws:lex:{region}:{account}:bot-alias/{bot_id}/{}", as_text(&id));
                attributes.insert(attr::ARN.into(), pick(attr::ARN, arn));
                attributes.insert(attr::BOT_ALIAS_ID.into(), id);
            }
        }
        Ok(attributes)
    }

    async fn record(&self, request: &BuildRequest, attributes: Option<Attributes>, converged: bool) {
        self.ledger.lock().await.push(BuildRecord {
            unit: request.unit.clone(),
            logical_id: request.logical_id.clone(),
            kind: request.kind,
            properties: request.properties.clone(),
            attributes,
            converged,
            built_at: Utc::now(),
        });
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new("us-east-1", DEFAULT_ACCOUNT)
    }
}

impl ProvisioningBackend for InMemoryBackend {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn build_resource(&self, request: &BuildRequest) -> Result<Attributes, BackendError> {
        if let Err(e) = self.check(request) {
            tracing::debug!(resource_id = %request.logical_id, error = %e, "build refused");
            self.record(request, None, false).await;
            return Err(e);
        }

        let digest = self.digest(request);
        let (attributes, converged) = match self.converged.get(&digest).map(|a| a.clone()) {
            Some(existing) => {
                tracing::debug!(resource_id = %request.logical_id, "request converged");
                (existing, true)
            }
            None => {
                let attributes = self.derive(request)?;
                self.converged.insert(digest.clone(), attributes.clone());
                (attributes, false)
            }
        };

        if request.kind == ResourceKind::Bot {
            if let Some(bot_id) = attributes.get(attr::BOT_ID).and_then(Value::as_str) {
                self.drafts.insert(bot_id.to_string(), digest);
            }
        }
        self.record(request, Some(attributes.clone()), converged).await;
        Ok(attributes)
    }
}

fn property_str<'a>(request: &'a BuildRequest, key: &str) -> Result<&'a str, BackendError> {
    request
        .properties
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| BackendError::Rejected(format!("{} is missing string property {key}", request.logical_id)))
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
